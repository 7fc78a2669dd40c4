//! SMS handler

use crate::gateway::OsGateway;
use crate::types::SmsParams;
use std::sync::Arc;

/// Which SMS path was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingOutcome {
    /// Native compose UI opened
    Composer,
    /// Compose UI unavailable; the `sms:` URI was handed to the OS
    SmsUri(String),
    /// Neither path could be opened (logged only)
    Failed,
}

pub struct MessagingHandler {
    gateway: Arc<dyn OsGateway>,
}

impl MessagingHandler {
    pub fn new(gateway: Arc<dyn OsGateway>) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, params: SmsParams) -> MessagingOutcome {
        tracing::info!(phone = %params.normalized, "Opening SMS composer");

        match self
            .gateway
            .open_message_compose_ui(&params.phone, &params.message)
            .await
        {
            Ok(()) => return MessagingOutcome::Composer,
            Err(e) => tracing::debug!(error = %e, "Compose UI unavailable, using sms: URI"),
        }

        let uri = sms_uri(&params.normalized, &params.message);
        match self.gateway.open_url(&uri).await {
            Ok(()) => MessagingOutcome::SmsUri(uri),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open SMS fallback");
                MessagingOutcome::Failed
            }
        }
    }
}

/// `sms:<number>?body=<percent-encoded>`; no query for an empty body
pub fn sms_uri(number: &str, body: &str) -> String {
    if body.is_empty() {
        format!("sms:{}", number)
    } else {
        format!("sms:{}?body={}", number, urlencoding::encode(body))
    }
}
