//! WhatsApp handler
//!
//! Deep links: `<scheme>://send?phone=<n>[&text=<t>]` opens a chat,
//! `<scheme>://call?phone=<n>` is the unofficial call link, and
//! `<web_base>/<digits>[?text=<t>]` is the universal fallback when the app
//! is absent.

use crate::config::ChatAppConfig;
use crate::gateway::OsGateway;
use crate::phone;
use crate::types::{ChatMode, ChatParams};
use std::sync::Arc;

/// Which link the chat handler opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    CallLink(String),
    ChatLink(String),
    /// App absent (or refused the link); the web link was used
    WebFallback(String),
}

pub struct ChatHandler {
    gateway: Arc<dyn OsGateway>,
    config: ChatAppConfig,
}

impl ChatHandler {
    pub fn new(gateway: Arc<dyn OsGateway>, config: ChatAppConfig) -> Self {
        Self { gateway, config }
    }

    pub async fn handle(&self, params: ChatParams) -> ChatOutcome {
        tracing::info!(phone = %params.phone, mode = ?params.mode, "Opening WhatsApp");

        let text = match params.mode {
            ChatMode::Message => params.message.as_str(),
            ChatMode::Call => "",
        };
        let chat_link = self.chat_link(&params.phone, text);

        if !self.gateway.can_open_url(&chat_link).await {
            tracing::debug!("WhatsApp not resolvable, using web link");
            return self.web_fallback(&params.phone, text).await;
        }

        if params.mode == ChatMode::Call {
            let call_link = self.call_link(&params.phone);
            if self.gateway.can_open_url(&call_link).await {
                if self.open(&call_link).await {
                    return ChatOutcome::CallLink(call_link);
                }
            } else {
                tracing::debug!("Call link not resolvable, opening chat instead");
            }
        }

        if self.open(&chat_link).await {
            ChatOutcome::ChatLink(chat_link)
        } else {
            self.web_fallback(&params.phone, text).await
        }
    }

    async fn open(&self, uri: &str) -> bool {
        match self.gateway.open_url(uri).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "Failed to open WhatsApp link");
                false
            }
        }
    }

    async fn web_fallback(&self, phone: &str, text: &str) -> ChatOutcome {
        let url = self.web_link(phone, text);
        // Nothing left to fall back to; the request still counts as handled
        if let Err(e) = self.gateway.open_url(&url).await {
            tracing::warn!(url = %url, error = %e, "Failed to open WhatsApp web link");
        }
        ChatOutcome::WebFallback(url)
    }

    /// Chat-open deep link; `text` is omitted entirely when empty
    pub fn chat_link(&self, phone: &str, text: &str) -> String {
        let mut link = format!(
            "{}://{}?phone={}",
            self.config.scheme,
            self.config.send_host,
            urlencoding::encode(phone)
        );
        if !text.is_empty() {
            link.push_str("&text=");
            link.push_str(&urlencoding::encode(text));
        }
        link
    }

    pub fn call_link(&self, phone: &str) -> String {
        format!(
            "{}://{}?phone={}",
            self.config.scheme,
            self.config.call_host,
            urlencoding::encode(phone)
        )
    }

    /// Universal web link, built from bare digits
    pub fn web_link(&self, phone: &str, text: &str) -> String {
        let mut link = format!(
            "{}/{}",
            self.config.web_base.trim_end_matches('/'),
            phone::digits_only(phone)
        );
        if !text.is_empty() {
            link.push_str("?text=");
            link.push_str(&urlencoding::encode(text));
        }
        link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;

    fn handler(gateway: &Arc<MemoryGateway>) -> ChatHandler {
        ChatHandler::new(gateway.clone(), ChatAppConfig::default())
    }

    fn params(phone: &str, message: &str, mode: ChatMode) -> ChatParams {
        ChatParams {
            phone: phone.to_string(),
            message: message.to_string(),
            mode,
        }
    }

    #[test]
    fn test_links() {
        let h = handler(&Arc::new(MemoryGateway::new()));
        assert_eq!(
            h.chat_link("+15551234567", "hi there"),
            "whatsapp://send?phone=%2B15551234567&text=hi%20there"
        );
        assert_eq!(h.chat_link("5551234567", ""), "whatsapp://send?phone=5551234567");
        assert_eq!(h.call_link("+15551234567"), "whatsapp://call?phone=%2B15551234567");
        assert_eq!(h.web_link("+15551234567", ""), "https://wa.me/15551234567");
        assert_eq!(
            h.web_link("+15551234567", "¿qué?"),
            "https://wa.me/15551234567?text=%C2%BFqu%C3%A9%3F"
        );
    }

    #[tokio::test]
    async fn test_app_missing_uses_web_for_every_combination() {
        for mode in [ChatMode::Message, ChatMode::Call] {
            for message in ["", "hello"] {
                let gateway = Arc::new(MemoryGateway::new());
                let outcome = handler(&gateway).handle(params("+15551234567", message, mode)).await;
                let expected = if mode == ChatMode::Message && !message.is_empty() {
                    "https://wa.me/15551234567?text=hello"
                } else {
                    "https://wa.me/15551234567"
                };
                assert_eq!(outcome, ChatOutcome::WebFallback(expected.to_string()));
                assert_eq!(gateway.opened_urls(), vec![expected.to_string()]);
            }
        }
    }

    #[tokio::test]
    async fn test_web_fallback_never_fails() {
        let gateway = Arc::new(MemoryGateway::new().with_failing_url("https://"));
        let outcome = handler(&gateway).handle(params("5551234567", "x", ChatMode::Message)).await;
        assert_eq!(
            outcome,
            ChatOutcome::WebFallback("https://wa.me/5551234567?text=x".to_string())
        );
    }

    #[tokio::test]
    async fn test_message_mode_opens_chat() {
        let gateway = Arc::new(MemoryGateway::new().with_chat_app("whatsapp"));
        let outcome = handler(&gateway).handle(params("+15551234567", "hi", ChatMode::Message)).await;
        assert_eq!(
            outcome,
            ChatOutcome::ChatLink("whatsapp://send?phone=%2B15551234567&text=hi".to_string())
        );
    }

    #[tokio::test]
    async fn test_call_mode_opens_call_link() {
        let gateway = Arc::new(MemoryGateway::new().with_chat_app("whatsapp"));
        let outcome = handler(&gateway).handle(params("+15551234567", "ignored", ChatMode::Call)).await;
        assert_eq!(
            outcome,
            ChatOutcome::CallLink("whatsapp://call?phone=%2B15551234567".to_string())
        );
    }

    #[tokio::test]
    async fn test_call_link_unresolvable_opens_chat() {
        let gateway = Arc::new(MemoryGateway::new().with_resolvable("whatsapp://send"));
        let outcome = handler(&gateway).handle(params("+15551234567", "", ChatMode::Call)).await;
        assert_eq!(
            outcome,
            ChatOutcome::ChatLink("whatsapp://send?phone=%2B15551234567".to_string())
        );
        assert_eq!(gateway.opened_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_app_link_failure_degrades_to_web() {
        let gateway = Arc::new(
            MemoryGateway::new()
                .with_chat_app("whatsapp")
                .with_failing_url("whatsapp://"),
        );
        let outcome = handler(&gateway).handle(params("+15551234567", "", ChatMode::Call)).await;
        assert_eq!(outcome, ChatOutcome::WebFallback("https://wa.me/15551234567".to_string()));
        assert_eq!(
            gateway.opened_urls(),
            vec![
                "whatsapp://call?phone=%2B15551234567".to_string(),
                "whatsapp://send?phone=%2B15551234567".to_string(),
                "https://wa.me/15551234567".to_string(),
            ]
        );
    }
}
