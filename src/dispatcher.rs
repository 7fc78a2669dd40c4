//! Action dispatcher
//!
//! Validates a request synchronously, hands the work to a handler task, and
//! acknowledges right away. The acknowledgement only says whether the
//! request was accepted; what the user then did surfaces as events.

use crate::handler::{ChatHandler, DialerHandler, MessagingHandler, PickerHandler};
use crate::error::{DeviceError, Result};
use crate::permission::PermissionCoordinator;
use crate::types::{
    ActionKind, ActionRequest, BridgeOutcome, ChatParams, DialParams, PermissionKind, PickParams,
    SmsParams,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{AbortHandle, JoinSet};

/// Acknowledgement message for `Device.PickContact`
pub const PICKER_OPENED: &str = "Contact picker opened";
/// Acknowledgement message when a permission batch was started
pub const PERMISSION_REQUEST_STARTED: &str = "Permission request started";
/// Acknowledgement message when a permission batch is already running
pub const PERMISSION_REQUEST_IN_PROGRESS: &str = "Permission request already in progress";
/// Acknowledgement message when every startup kind is already granted
pub const PERMISSIONS_ALREADY_GRANTED: &str = "All permissions already granted";

/// Handler work accepted by `dispatch`, plus the acknowledgement for it
struct Accepted {
    work: Option<BoxFuture<'static, ()>>,
    ack: BridgeOutcome,
}

impl Accepted {
    fn spawn(work: BoxFuture<'static, ()>) -> Self {
        Self {
            work: Some(work),
            ack: BridgeOutcome::accepted(),
        }
    }

    fn with_message(mut self, message: &str) -> Self {
        self.ack = BridgeOutcome::accepted_with_message(message);
        self
    }
}

/// Routes requests to handlers and tracks the tasks they run on
pub struct ActionDispatcher {
    dialer: Arc<DialerHandler>,
    messaging: Arc<MessagingHandler>,
    chat: Arc<ChatHandler>,
    picker: Arc<PickerHandler>,
    permissions: Arc<PermissionCoordinator>,
    startup_permissions: Vec<PermissionKind>,
    tasks: Mutex<JoinSet<()>>,
    /// Abort handles of every spawned task, kept while `settle` drains the set
    aborts: Mutex<Vec<AbortHandle>>,
}

impl ActionDispatcher {
    pub fn new(
        dialer: Arc<DialerHandler>,
        messaging: Arc<MessagingHandler>,
        chat: Arc<ChatHandler>,
        picker: Arc<PickerHandler>,
        permissions: Arc<PermissionCoordinator>,
        startup_permissions: Vec<PermissionKind>,
    ) -> Self {
        Self {
            dialer,
            messaging,
            chat,
            picker,
            permissions,
            startup_permissions,
            tasks: Mutex::new(JoinSet::new()),
            aborts: Mutex::new(Vec::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn aborts(&self) -> MutexGuard<'_, Vec<AbortHandle>> {
        self.aborts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate `request` and start its handler
    ///
    /// Must be called from within a tokio runtime. Returns an `Error`
    /// outcome only for malformed parameters or a torn-down session.
    pub fn dispatch(&self, request: &ActionRequest) -> BridgeOutcome {
        if self.permissions.is_disposed() {
            tracing::debug!(method = request.kind.method(), "Dispatch after teardown");
            return DeviceError::SessionClosed.into();
        }

        match self.accept(request) {
            Ok(accepted) => {
                if let Some(work) = accepted.work {
                    let abort = {
                        let mut tasks = self.tasks();
                        // Reap finished handlers so the set does not grow unbounded
                        while tasks.try_join_next().is_some() {}
                        tasks.spawn(work)
                    };
                    let mut aborts = self.aborts();
                    aborts.retain(|handle| !handle.is_finished());
                    aborts.push(abort);
                }
                tracing::debug!(method = request.kind.method(), "Request accepted");
                accepted.ack
            }
            Err(e) => {
                tracing::warn!(method = request.kind.method(), error = %e, "Request rejected");
                e.into()
            }
        }
    }

    fn accept(&self, request: &ActionRequest) -> Result<Accepted> {
        let accepted = match request.kind {
            ActionKind::OpenDialer => {
                let params = DialParams::from_request(request)?;
                let dialer = self.dialer.clone();
                Accepted::spawn(
                    async move {
                        let outcome = dialer.handle(params).await;
                        tracing::debug!(outcome = ?outcome, "Dialer finished");
                    }
                    .boxed(),
                )
            }
            ActionKind::OpenSms => {
                let params = SmsParams::from_request(request)?;
                let messaging = self.messaging.clone();
                Accepted::spawn(
                    async move {
                        let outcome = messaging.handle(params).await;
                        tracing::debug!(outcome = ?outcome, "SMS finished");
                    }
                    .boxed(),
                )
            }
            ActionKind::OpenChat => {
                let params = ChatParams::from_request(request)?;
                let chat = self.chat.clone();
                Accepted::spawn(
                    async move {
                        let outcome = chat.handle(params).await;
                        tracing::debug!(outcome = ?outcome, "WhatsApp finished");
                    }
                    .boxed(),
                )
            }
            ActionKind::PickContact => {
                let params = PickParams::from_request(request)?;
                let picker = self.picker.clone();
                Accepted::spawn(
                    async move {
                        let outcome = picker.handle(params).await;
                        tracing::debug!(outcome = ?outcome, "Pick finished");
                    }
                    .boxed(),
                )
                .with_message(PICKER_OPENED)
            }
            ActionKind::RequestPermissions => {
                if self.permissions.all_granted(&self.startup_permissions) {
                    return Ok(Accepted {
                        work: None,
                        ack: BridgeOutcome::accepted_with_message(PERMISSIONS_ALREADY_GRANTED),
                    });
                }
                if self.permissions.batch_in_flight() {
                    return Ok(Accepted {
                        work: None,
                        ack: BridgeOutcome::accepted_with_message(PERMISSION_REQUEST_IN_PROGRESS),
                    });
                }
                let permissions = self.permissions.clone();
                let kinds = self.startup_permissions.clone();
                Accepted::spawn(
                    async move {
                        let outcome = permissions.request_all(&kinds).await;
                        tracing::debug!(outcome = ?outcome, "Permission batch finished");
                    }
                    .boxed(),
                )
                .with_message(PERMISSION_REQUEST_STARTED)
            }
        };
        Ok(accepted)
    }

    /// Number of handler tasks not yet finished
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait until every accepted request has finished its handler work
    ///
    /// Requests dispatched while settling are waited for as well. Tasks
    /// being waited on here remain abortable through `abort_all`.
    pub async fn settle(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks());
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Handler task panicked");
                    }
                }
            }
        }
    }

    /// Abort every handler task still running, including ones `settle` is awaiting
    pub fn abort_all(&self) {
        self.tasks().abort_all();
        let mut aborts = self.aborts();
        let aborted = aborts.iter().filter(|handle| !handle.is_finished()).count();
        for handle in aborts.drain(..) {
            handle.abort();
        }
        if aborted > 0 {
            tracing::debug!(aborted, "Handler tasks aborted");
        }
    }
}
