//! OS action gateway: the seam between the coordinator and the native platform
//!
//! Every platform (Android activity glue, iOS view controllers, a desktop
//! simulator, the in-memory test double) implements `OsGateway`. The core
//! never touches OS SDK details; it only calls these primitives.

use crate::config::BlockingPrompt;
use crate::error::Result;
use crate::types::{ContactSource, PermissionKind, PermissionState};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod memory;

/// Native primitives the coordinator and handlers depend on
///
/// All `open_*` primitives are fire-and-forget from the caller's point of
/// view: `Ok(())` means the OS accepted the request, not that the user
/// completed anything.
#[async_trait]
pub trait OsGateway: Send + Sync {
    /// Open the call UI. `immediate` places the call without confirmation.
    async fn open_call_ui(&self, number: &str, immediate: bool) -> Result<()>;

    /// Open the native SMS compose UI pre-filled with recipient and body
    async fn open_message_compose_ui(&self, number: &str, body: &str) -> Result<()>;

    /// Whether some installed app can handle `uri`
    async fn can_open_url(&self, uri: &str) -> bool;

    /// Hand `uri` to the OS
    async fn open_url(&self, uri: &str) -> Result<()>;

    /// Whether the picker for `source` exists on this device
    async fn is_picker_available(&self, source: ContactSource) -> bool;

    /// Present a contact picker and wait for the user
    async fn open_contact_picker(&self, source: ContactSource) -> Result<PickerResult>;

    /// Current authorization reported by the OS, without showing any UI
    ///
    /// Default implementation reports `Undetermined`, which makes the
    /// coordinator fall through to a prompt.
    async fn permission_status(&self, _kind: PermissionKind) -> Result<PermissionState> {
        Ok(PermissionState::Undetermined)
    }

    /// Show one permission prompt and wait for the answer
    async fn request_permission(&self, kind: PermissionKind) -> Result<bool>;

    /// Show a batched permission prompt and wait for every answer
    ///
    /// Default implementation prompts sequentially via `request_permission()`.
    async fn request_permissions(
        &self,
        kinds: &[PermissionKind],
    ) -> Result<HashMap<PermissionKind, bool>> {
        let mut answers = HashMap::with_capacity(kinds.len());
        for kind in kinds {
            answers.insert(*kind, self.request_permission(*kind).await?);
        }
        Ok(answers)
    }

    /// Present the blocking "grant again / exit" dialog
    ///
    /// Returns `None` when the platform reports a dismissal through a side
    /// channel (back gesture, tap outside); the coordinator re-presents.
    async fn present_blocking_choice(&self, prompt: &BlockingPrompt) -> Result<Option<BlockingChoice>>;

    /// Show a transient, non-blocking notice (toast / banner)
    async fn show_notice(&self, message: &str);

    /// Terminate the host process
    async fn exit_process(&self);

    /// Gateway name (e.g., "android", "ios", "memory")
    fn name(&self) -> &str;
}

/// The two ways out of the blocking permission dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingChoice {
    /// Re-issue the permission prompt
    Retry,
    /// Terminate the host process
    Exit,
}

/// One row of a picker result, as `(field name, value)` pairs in native order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactRow {
    fields: Vec<(String, String)>,
}

impl ContactRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(field, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Exact (case-sensitive) field lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterate `(field, value)` pairs in native order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// What a contact picker handed back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerResult {
    /// The user backed out of the picker
    Cancelled,
    /// The picker returned zero or more rows for the selected contact
    Selected(Vec<ContactRow>),
}

impl PickerResult {
    /// A selection with a single row
    pub fn row(row: ContactRow) -> Self {
        PickerResult::Selected(vec![row])
    }

    /// First row of the selection, if any
    pub fn first_row(&self) -> Option<&ContactRow> {
        match self {
            PickerResult::Cancelled => None,
            PickerResult::Selected(rows) => rows.first(),
        }
    }
}
