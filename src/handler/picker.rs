//! Contact-picker handler
//!
//! Per invocation: `Idle → PermissionPending → PickerOpen → {Resolved |
//! Cancelled | NoData}`, with `Denied` when contacts access is refused.
//! A chat-app request on a device without the chat app is retargeted to the
//! device picker, and the resulting contact is labelled with the picker that
//! actually ran.

use crate::config::NoticeConfig;
use crate::emitter::EventEmitter;
use crate::gateway::OsGateway;
use crate::permission::PermissionCoordinator;
use crate::resolver::{ContactResolver, Resolution};
use crate::types::{BridgeEvent, ContactResult, ContactSource, PermissionKind, PickParams};
use std::sync::Arc;

/// Terminal state of one pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// A `ContactSelected` event was emitted
    Resolved(ContactResult),
    Cancelled,
    NoData,
    /// Contacts access refused; no picker opened
    Denied,
    /// Session torn down while waiting for permission or for the picker
    Discarded,
}

pub struct PickerHandler {
    gateway: Arc<dyn OsGateway>,
    permissions: Arc<PermissionCoordinator>,
    emitter: Arc<EventEmitter>,
    resolver: ContactResolver,
    notices: NoticeConfig,
}

impl PickerHandler {
    pub fn new(
        gateway: Arc<dyn OsGateway>,
        permissions: Arc<PermissionCoordinator>,
        emitter: Arc<EventEmitter>,
        resolver: ContactResolver,
        notices: NoticeConfig,
    ) -> Self {
        Self {
            gateway,
            permissions,
            emitter,
            resolver,
            notices,
        }
    }

    pub async fn handle(&self, params: PickParams) -> PickOutcome {
        let mut source = params.source;
        if source == ContactSource::ChatApp
            && !self.gateway.is_picker_available(ContactSource::ChatApp).await
        {
            tracing::info!("WhatsApp picker unavailable, using device picker");
            self.gateway.show_notice(&self.notices.chat_app_missing).await;
            source = ContactSource::Device;
        }

        tracing::debug!(requested = %params.source, source = %source, "Pick: permission pending");
        let label = format!("open {} picker", source);
        self.permissions
            .check_and_run(
                PermissionKind::ContactsReadCapability,
                &label,
                || self.pick(source),
                || self.denied(),
            )
            .await
            .unwrap_or(PickOutcome::Discarded)
    }

    async fn denied(&self) -> PickOutcome {
        tracing::info!("Contacts access denied, picker not opened");
        self.gateway.show_notice(&self.notices.contacts_required).await;
        PickOutcome::Denied
    }

    /// Open pickers until one resolves, falling back from chat app to device
    async fn pick(&self, mut source: ContactSource) -> PickOutcome {
        loop {
            tracing::debug!(source = %source, "Pick: picker open");
            let opened = self.gateway.open_contact_picker(source).await;
            if self.permissions.is_disposed() {
                tracing::debug!(source = %source, "Session closed while picker was open");
                return PickOutcome::Discarded;
            }
            let result = match opened {
                Ok(result) => result,
                Err(e) if source == ContactSource::ChatApp => {
                    tracing::warn!(error = %e, "WhatsApp picker failed, using device picker");
                    source = ContactSource::Device;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Device picker failed");
                    return PickOutcome::NoData;
                }
            };

            match self.resolver.resolve(source, &result) {
                Resolution::Resolved(contact) => {
                    tracing::info!(source = %contact.source, "Contact selected");
                    self.emitter.emit(BridgeEvent::contact_selected(&contact));
                    return PickOutcome::Resolved(contact);
                }
                Resolution::Cancelled => {
                    tracing::debug!(source = %source, "Picker cancelled");
                    return PickOutcome::Cancelled;
                }
                Resolution::FallbackToDevice if source == ContactSource::ChatApp => {
                    tracing::info!("WhatsApp contact had no usable phone, using device picker");
                    source = ContactSource::Device;
                }
                Resolution::FallbackToDevice | Resolution::NoData => {
                    tracing::debug!(source = %source, "Picked contact has no phone number");
                    return PickOutcome::NoData;
                }
            }
        }
    }
}
