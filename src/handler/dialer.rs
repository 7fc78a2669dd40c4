//! Dialer handler

use crate::gateway::OsGateway;
use crate::permission::PermissionCoordinator;
use crate::types::{DialParams, PermissionKind};
use std::sync::Arc;

/// Which call UI the dialer ended up opening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialOutcome {
    /// Call placed without confirmation
    Immediate,
    /// Call UI opened with the number, user must confirm
    PromptOnly,
    /// Even the prompt-only UI could not be opened
    Failed,
    /// Session torn down while waiting for the call permission
    Discarded,
}

pub struct DialerHandler {
    gateway: Arc<dyn OsGateway>,
    permissions: Arc<PermissionCoordinator>,
}

impl DialerHandler {
    pub fn new(gateway: Arc<dyn OsGateway>, permissions: Arc<PermissionCoordinator>) -> Self {
        Self {
            gateway,
            permissions,
        }
    }

    pub async fn handle(&self, params: DialParams) -> DialOutcome {
        tracing::info!(
            phone = %params.normalized,
            auto_call = params.auto_call,
            "Opening dialer"
        );

        if !params.auto_call {
            return self.prompt_only(&params.phone).await;
        }

        let label = format!("dial {}", params.normalized);
        self.permissions
            .check_and_run(
                PermissionKind::CallCapability,
                &label,
                || self.immediate(&params.phone),
                || self.prompt_only(&params.phone),
            )
            .await
            .unwrap_or(DialOutcome::Discarded)
    }

    async fn immediate(&self, phone: &str) -> DialOutcome {
        match self.gateway.open_call_ui(phone, true).await {
            Ok(()) => DialOutcome::Immediate,
            Err(e) => {
                tracing::warn!(error = %e, "Immediate call failed, opening prompt-only call");
                self.prompt_only(phone).await
            }
        }
    }

    async fn prompt_only(&self, phone: &str) -> DialOutcome {
        match self.gateway.open_call_ui(phone, false).await {
            Ok(()) => DialOutcome::PromptOnly,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open call UI");
                DialOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockingPrompt;
    use crate::gateway::memory::MemoryGateway;
    use crate::types::{ActionKind, ActionRequest};

    fn handler(gateway: &Arc<MemoryGateway>) -> DialerHandler {
        let permissions = Arc::new(PermissionCoordinator::new(
            gateway.clone(),
            BlockingPrompt::default(),
        ));
        DialerHandler::new(gateway.clone(), permissions)
    }

    fn params(phone: &str, auto_call: bool) -> DialParams {
        let request = ActionRequest::new(ActionKind::OpenDialer, Default::default())
            .with_param("phone", phone)
            .with_param("autoCall", auto_call);
        DialParams::from_request(&request).unwrap()
    }

    #[tokio::test]
    async fn test_prompt_only_skips_permission() {
        let gateway = Arc::new(MemoryGateway::new());
        let outcome = handler(&gateway).handle(params("+1 (555) 123-4567", false)).await;

        assert_eq!(outcome, DialOutcome::PromptOnly);
        assert_eq!(gateway.prompt_count(), 0);
        assert_eq!(
            gateway.call_ui_opens(),
            vec![("+1 (555) 123-4567".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_auto_call_granted_places_call() {
        let gateway = Arc::new(MemoryGateway::new().with_granted(PermissionKind::CallCapability));
        let outcome = handler(&gateway).handle(params("5551234567", true)).await;

        assert_eq!(outcome, DialOutcome::Immediate);
        assert_eq!(gateway.prompt_count(), 0);
        assert_eq!(gateway.call_ui_opens(), vec![("5551234567".to_string(), true)]);
    }

    #[tokio::test]
    async fn test_auto_call_denied_falls_back_once() {
        let gateway = Arc::new(MemoryGateway::new().with_default_answer(false));
        let outcome = handler(&gateway).handle(params("5551234567", true)).await;

        assert_eq!(outcome, DialOutcome::PromptOnly);
        assert_eq!(gateway.prompt_count(), 1);
        assert_eq!(gateway.call_ui_opens(), vec![("5551234567".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_immediate_failure_degrades_to_prompt_only() {
        let gateway = Arc::new(
            MemoryGateway::new()
                .with_granted(PermissionKind::CallCapability)
                .without_call_capability(),
        );
        let outcome = handler(&gateway).handle(params("5551234567", true)).await;

        assert_eq!(outcome, DialOutcome::PromptOnly);
        assert_eq!(
            gateway.call_ui_opens(),
            vec![
                ("5551234567".to_string(), true),
                ("5551234567".to_string(), false)
            ]
        );
    }

    #[tokio::test]
    async fn test_permission_error_falls_back() {
        let gateway = Arc::new(MemoryGateway::new().with_failing_permissions());
        let outcome = handler(&gateway).handle(params("5551234567", true)).await;
        assert_eq!(outcome, DialOutcome::PromptOnly);
    }
}
