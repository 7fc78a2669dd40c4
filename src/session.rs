//! Device session: the composition root for one UI session
//!
//! A `Session` owns the permission coordinator, the event emitter, the
//! handlers and their in-flight tasks. Nothing is global: two sessions
//! never share pending permission state. Dropping a session tears it down.

use crate::config::DeviceConfig;
use crate::dispatcher::ActionDispatcher;
use crate::emitter::EventEmitter;
use crate::gateway::OsGateway;
use crate::handler::{ChatHandler, DialerHandler, MessagingHandler, PickerHandler};
use crate::permission::PermissionCoordinator;
use crate::resolver::ContactResolver;
use crate::types::{ActionRequest, BridgeOutcome};
use std::sync::Arc;

/// Device action session bound to one OS gateway
pub struct Session {
    gateway: Arc<dyn OsGateway>,
    config: DeviceConfig,
    permissions: Arc<PermissionCoordinator>,
    emitter: Arc<EventEmitter>,
    dispatcher: ActionDispatcher,
}

impl Session {
    /// Create a session over `gateway`
    pub fn new(gateway: Arc<dyn OsGateway>, config: DeviceConfig) -> Self {
        let permissions = Arc::new(PermissionCoordinator::new(
            gateway.clone(),
            config.blocking_prompt.clone(),
        ));
        let emitter = Arc::new(EventEmitter::new());

        let dispatcher = ActionDispatcher::new(
            Arc::new(DialerHandler::new(gateway.clone(), permissions.clone())),
            Arc::new(MessagingHandler::new(gateway.clone())),
            Arc::new(ChatHandler::new(gateway.clone(), config.chat_app.clone())),
            Arc::new(PickerHandler::new(
                gateway.clone(),
                permissions.clone(),
                emitter.clone(),
                ContactResolver::new(config.device_fields.clone(), &config.chat_app),
                config.notices.clone(),
            )),
            permissions.clone(),
            config.startup_permissions.clone(),
        );

        tracing::info!(gateway = gateway.name(), "Device session created");

        Self {
            gateway,
            config,
            permissions,
            emitter,
            dispatcher,
        }
    }

    /// Get the gateway name
    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Event emitter for `ContactSelected` and future event kinds
    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    pub fn permissions(&self) -> &Arc<PermissionCoordinator> {
        &self.permissions
    }

    /// Dispatch a typed request; see [`ActionDispatcher::dispatch`]
    pub fn dispatch(&self, request: &ActionRequest) -> BridgeOutcome {
        self.dispatcher.dispatch(request)
    }

    /// JSON bridge entry point
    ///
    /// Takes a method name such as `"Device.OpenDialer"` and a flat params
    /// object, and returns the bridge response object.
    pub fn call(&self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let outcome = match ActionRequest::from_call(method, params) {
            Ok(request) => self.dispatch(&request),
            Err(e) => {
                tracing::warn!(method = %method, error = %e, "Bridge call rejected");
                BridgeOutcome::from(e)
            }
        };
        outcome.to_response()
    }

    /// Number of accepted requests whose handler work is still running
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Wait for all accepted handler work to finish
    pub async fn settle(&self) {
        self.dispatcher.settle().await;
    }

    /// Discard suspended continuations and abort in-flight handler work
    ///
    /// Idempotent. Later dispatches are rejected with `SessionClosed`.
    pub fn teardown(&self) {
        if self.permissions.is_disposed() {
            return;
        }
        self.permissions.teardown();
        self.dispatcher.abort_all();
        tracing::info!(gateway = self.gateway.name(), "Device session torn down");
    }

    pub fn is_closed(&self) -> bool {
        self.permissions.is_disposed()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;
    use serde_json::json;

    fn session() -> (Arc<MemoryGateway>, Session) {
        let gateway = Arc::new(MemoryGateway::new());
        let session = Session::new(gateway.clone(), DeviceConfig::default());
        (gateway, session)
    }

    #[tokio::test]
    async fn test_call_unknown_method() {
        let (_, session) = session();
        assert_eq!(
            session.call("Device.Teleport", json!({})),
            json!({ "error": "Unknown method: Device.Teleport" })
        );
    }

    #[tokio::test]
    async fn test_call_success_response() {
        let (gateway, session) = session();
        assert_eq!(
            session.call("Device.OpenSms", json!({ "phone": "555", "message": "" })),
            json!({ "success": true })
        );
        session.settle().await;
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_rejects_later_dispatch() {
        let (gateway, session) = session();
        session.teardown();
        session.teardown();
        assert!(session.is_closed());

        let response = session.call("Device.OpenDialer", json!({ "phone": "555" }));
        assert_eq!(response, json!({ "error": "Session closed" }));
        session.settle().await;
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_name() {
        let (_, session) = session();
        assert_eq!(session.gateway_name(), "memory");
    }
}
