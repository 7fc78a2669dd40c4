//! In-memory gateway for testing and host-less embedding
//!
//! Scripted answers are consumed in order; every primitive call is recorded
//! so tests can assert on exactly what the coordinator asked the OS to do.

use super::{BlockingChoice, OsGateway, PickerResult};
use crate::config::BlockingPrompt;
use crate::error::{DeviceError, Result};
use crate::types::{ContactSource, PermissionKind, PermissionState};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

/// A primitive invocation recorded by [`MemoryGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    OpenCallUi { number: String, immediate: bool },
    OpenComposer { number: String, body: String },
    OpenUrl(String),
    OpenPicker(ContactSource),
    RequestPermission(PermissionKind),
    RequestPermissions(Vec<PermissionKind>),
    BlockingChoice,
    Notice(String),
    Exit,
}

struct MemoryState {
    calls: Vec<GatewayCall>,
    call_capable: bool,
    composer_available: bool,
    resolvable_prefixes: Vec<String>,
    failing_prefixes: Vec<String>,
    pickers: HashSet<ContactSource>,
    picker_results: HashMap<ContactSource, VecDeque<PickerResult>>,
    os_status: HashMap<PermissionKind, PermissionState>,
    answers: HashMap<PermissionKind, VecDeque<bool>>,
    default_answer: bool,
    permissions_fail: bool,
    dialog_fails: bool,
    choices: VecDeque<Option<BlockingChoice>>,
}

/// Scriptable [`OsGateway`] that keeps everything in memory
///
/// Defaults model a phone without the chat app: calls and SMS compose work,
/// only the device picker exists, and every permission prompt is granted.
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    /// `true` lets permission prompts answer; `false` holds them pending
    released: watch::Sender<bool>,
    /// Same latch for contact pickers
    pickers_released: watch::Sender<bool>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (released, _) = watch::channel(true);
        let (pickers_released, _) = watch::channel(true);
        Self {
            state: Mutex::new(MemoryState {
                calls: Vec::new(),
                call_capable: true,
                composer_available: true,
                resolvable_prefixes: Vec::new(),
                failing_prefixes: Vec::new(),
                pickers: HashSet::from([ContactSource::Device]),
                picker_results: HashMap::new(),
                os_status: HashMap::new(),
                answers: HashMap::new(),
                default_answer: true,
                permissions_fail: false,
                dialog_fails: false,
                choices: VecDeque::new(),
            }),
            released,
            pickers_released,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: GatewayCall) {
        self.state().calls.push(call);
    }

    // ─── Scripting ────────────────────────────────────────────────

    /// Install the chat app: its URI scheme resolves and its picker exists
    pub fn with_chat_app(self, scheme: &str) -> Self {
        {
            let mut state = self.state();
            state.resolvable_prefixes.push(format!("{}://", scheme));
            state.pickers.insert(ContactSource::ChatApp);
        }
        self
    }

    /// Make URIs starting with `prefix` resolvable
    pub fn with_resolvable(self, prefix: impl Into<String>) -> Self {
        self.state().resolvable_prefixes.push(prefix.into());
        self
    }

    /// Make `open_url` fail for URIs starting with `prefix`
    pub fn with_failing_url(self, prefix: impl Into<String>) -> Self {
        self.state().failing_prefixes.push(prefix.into());
        self
    }

    /// Device cannot place calls; immediate calls fail
    pub fn without_call_capability(self) -> Self {
        self.state().call_capable = false;
        self
    }

    /// Native SMS compose UI is absent
    pub fn without_composer(self) -> Self {
        self.state().composer_available = false;
        self
    }

    /// Remove the device contact picker
    pub fn without_device_picker(self) -> Self {
        self.state().pickers.remove(&ContactSource::Device);
        self
    }

    /// OS already reports `kind` as granted (no prompt needed)
    pub fn with_granted(self, kind: PermissionKind) -> Self {
        self.state().os_status.insert(kind, PermissionState::Granted);
        self
    }

    /// Answer given when no scripted answer is queued
    pub fn with_default_answer(self, granted: bool) -> Self {
        self.state().default_answer = granted;
        self
    }

    /// Every permission call errors, as if the subsystem were broken
    pub fn with_failing_permissions(self) -> Self {
        self.state().permissions_fail = true;
        self
    }

    /// The blocking dialog cannot be shown; every attempt errors
    pub fn with_failing_dialog(self) -> Self {
        self.state().dialog_fails = true;
        self
    }

    /// Queue the answer to the next prompt for `kind`
    pub fn push_answer(&self, kind: PermissionKind, granted: bool) {
        self.state().answers.entry(kind).or_default().push_back(granted);
    }

    /// Queue the result of the next picker opened for `source`
    pub fn push_picker_result(&self, source: ContactSource, result: PickerResult) {
        self.state()
            .picker_results
            .entry(source)
            .or_default()
            .push_back(result);
    }

    /// Queue the next blocking-dialog choice (`None` = dismissed)
    ///
    /// With nothing queued the dialog answers `Exit`.
    pub fn push_choice(&self, choice: Option<BlockingChoice>) {
        self.state().choices.push_back(choice);
    }

    /// Hold every permission prompt pending until `release_prompts()`
    pub fn hold_prompts(&self) {
        self.released.send_replace(false);
    }

    /// Let held permission prompts answer
    pub fn release_prompts(&self) {
        self.released.send_replace(true);
    }

    /// Keep opened contact pickers up until `release_pickers()`
    pub fn hold_pickers(&self) {
        self.pickers_released.send_replace(false);
    }

    pub fn release_pickers(&self) {
        self.pickers_released.send_replace(true);
    }

    // ─── Inspection ───────────────────────────────────────────────

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    /// Number of native permission prompts shown (single and batched)
    pub fn prompt_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    GatewayCall::RequestPermission(_) | GatewayCall::RequestPermissions(_)
                )
            })
            .count()
    }

    /// Call UI invocations as `(number, immediate)`
    pub fn call_ui_opens(&self) -> Vec<(String, bool)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::OpenCallUi { number, immediate } => Some((number.clone(), *immediate)),
                _ => None,
            })
            .collect()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::OpenUrl(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Notice(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn opened_pickers(&self) -> Vec<ContactSource> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::OpenPicker(source) => Some(*source),
                _ => None,
            })
            .collect()
    }

    pub fn exited(&self) -> bool {
        self.state().calls.contains(&GatewayCall::Exit)
    }

    async fn wait_released(latch: &watch::Sender<bool>) {
        let mut released = latch.subscribe();
        // Sender lives in self, so the channel cannot close here
        let _ = released.wait_for(|open| *open).await;
    }

    fn next_answer(&self, kind: PermissionKind) -> Result<bool> {
        let mut state = self.state();
        if state.permissions_fail {
            return Err(DeviceError::Gateway("permission service unavailable".to_string()));
        }
        let default = state.default_answer;
        let granted = state
            .answers
            .get_mut(&kind)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(default);
        // A real OS remembers grants across prompts
        if granted {
            state.os_status.insert(kind, PermissionState::Granted);
        }
        Ok(granted)
    }
}

#[async_trait]
impl OsGateway for MemoryGateway {
    async fn open_call_ui(&self, number: &str, immediate: bool) -> Result<()> {
        self.record(GatewayCall::OpenCallUi {
            number: number.to_string(),
            immediate,
        });
        if immediate && !self.state().call_capable {
            return Err(DeviceError::NativeActionUnavailable(
                "device cannot place calls".to_string(),
            ));
        }
        Ok(())
    }

    async fn open_message_compose_ui(&self, number: &str, body: &str) -> Result<()> {
        self.record(GatewayCall::OpenComposer {
            number: number.to_string(),
            body: body.to_string(),
        });
        if self.state().composer_available {
            Ok(())
        } else {
            Err(DeviceError::NativeActionUnavailable(
                "SMS composer unavailable".to_string(),
            ))
        }
    }

    async fn can_open_url(&self, uri: &str) -> bool {
        let state = self.state();
        state
            .resolvable_prefixes
            .iter()
            .any(|prefix| uri.starts_with(prefix.as_str()))
    }

    async fn open_url(&self, uri: &str) -> Result<()> {
        self.record(GatewayCall::OpenUrl(uri.to_string()));
        let state = self.state();
        if state
            .failing_prefixes
            .iter()
            .any(|prefix| uri.starts_with(prefix.as_str()))
        {
            return Err(DeviceError::NativeActionUnavailable(format!(
                "no handler for {}",
                uri
            )));
        }
        Ok(())
    }

    async fn is_picker_available(&self, source: ContactSource) -> bool {
        self.state().pickers.contains(&source)
    }

    async fn open_contact_picker(&self, source: ContactSource) -> Result<PickerResult> {
        self.record(GatewayCall::OpenPicker(source));
        if !self.state().pickers.contains(&source) {
            return Err(DeviceError::NativeActionUnavailable(format!(
                "{} picker unavailable",
                source
            )));
        }
        Self::wait_released(&self.pickers_released).await;
        Ok(self
            .state()
            .picker_results
            .get_mut(&source)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(PickerResult::Cancelled))
    }

    async fn permission_status(&self, kind: PermissionKind) -> Result<PermissionState> {
        let state = self.state();
        if state.permissions_fail {
            return Err(DeviceError::Gateway("permission service unavailable".to_string()));
        }
        Ok(state.os_status.get(&kind).copied().unwrap_or_default())
    }

    async fn request_permission(&self, kind: PermissionKind) -> Result<bool> {
        self.record(GatewayCall::RequestPermission(kind));
        Self::wait_released(&self.released).await;
        self.next_answer(kind)
    }

    async fn request_permissions(
        &self,
        kinds: &[PermissionKind],
    ) -> Result<HashMap<PermissionKind, bool>> {
        self.record(GatewayCall::RequestPermissions(kinds.to_vec()));
        Self::wait_released(&self.released).await;
        kinds
            .iter()
            .map(|kind| self.next_answer(*kind).map(|granted| (*kind, granted)))
            .collect()
    }

    async fn present_blocking_choice(
        &self,
        _prompt: &BlockingPrompt,
    ) -> Result<Option<BlockingChoice>> {
        self.record(GatewayCall::BlockingChoice);
        if self.state().dialog_fails {
            return Err(DeviceError::Gateway("dialog service unavailable".to_string()));
        }
        Ok(self
            .state()
            .choices
            .pop_front()
            .unwrap_or(Some(BlockingChoice::Exit)))
    }

    async fn show_notice(&self, message: &str) {
        self.record(GatewayCall::Notice(message.to_string()));
    }

    async fn exit_process(&self) {
        self.record(GatewayCall::Exit);
    }

    fn name(&self) -> &str {
        "memory"
    }
}
