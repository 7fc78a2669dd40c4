//! Permission coordinator
//!
//! Tracks per-kind authorization and the continuations suspended on it.
//! Provides:
//! - `authorize` / `check_and_run` for single-kind gates used by handlers
//! - `request_all` for the startup batch with its blocking retry/exit dialog;
//!   one batch runs at a time and later callers join it
//! - `teardown` to discard every suspended continuation with the session
//!
//! At most one native prompt is outstanding per kind. A request arriving
//! while a prompt for the same kind is in flight is queued behind it and
//! resolved with the same OS answer.

use crate::config::BlockingPrompt;
use crate::gateway::{BlockingChoice, OsGateway};
use crate::types::{PermissionKind, PermissionState};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::oneshot;

/// How a single-kind authorization ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied,
    /// The session was torn down while suspended
    Discarded,
}

impl Authorization {
    fn from_granted(granted: bool) -> Self {
        if granted {
            Authorization::Granted
        } else {
            Authorization::Denied
        }
    }
}

/// Phases of the startup batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPhase {
    #[default]
    Idle,
    Prompting,
    AllGranted,
    AnyDenied,
    Blocking,
    Terminal,
}

/// How `request_all` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    AllGranted,
    /// The user chose "exit"; the host process has been asked to terminate
    Exited,
    /// Something was denied and the blocking dialog could not be shown
    Unavailable,
    /// The session was torn down mid-batch
    Discarded,
}

/// A suspended operation waiting on one permission kind
struct PendingContinuation {
    label: String,
    created_at: Instant,
    /// Requests queued behind the prompt in flight
    followers: Vec<oneshot::Sender<bool>>,
}

#[derive(Default)]
struct CoordinatorState {
    states: HashMap<PermissionKind, PermissionState>,
    pending: HashMap<PermissionKind, PendingContinuation>,
    batch_phase: BatchPhase,
    /// `Some` while a batch runs; holds callers waiting on its outcome
    batch: Option<Vec<oneshot::Sender<BatchOutcome>>>,
    disposed: bool,
}

/// What a caller must do after registering interest in a kind
enum Registration {
    Ready(Authorization),
    /// This caller owns the prompt
    Leader,
    /// Another caller owns the prompt; wait for its answer
    Follower(oneshot::Receiver<bool>),
}

/// Releases a leader's pending entries if its future is dropped mid-prompt
///
/// Queued followers then see a closed channel, as after teardown.
struct PromptGuard<'a> {
    coordinator: &'a PermissionCoordinator,
    kinds: Vec<PermissionKind>,
}

impl PromptGuard<'_> {
    fn disarm(mut self) {
        self.kinds.clear();
    }
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        if self.kinds.is_empty() {
            return;
        }
        let mut state = self.coordinator.lock();
        for kind in &self.kinds {
            state.pending.remove(kind);
        }
        tracing::debug!(kinds = ?self.kinds, "Permission prompt abandoned");
    }
}

/// Ends the running batch and hands its outcome to joined callers
///
/// Dropped without an outcome (the batch future was cancelled), joined
/// callers see `Discarded`.
struct BatchGuard<'a> {
    coordinator: &'a PermissionCoordinator,
    outcome: Option<BatchOutcome>,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let joiners = self.coordinator.lock().batch.take().unwrap_or_default();
        if let Some(outcome) = self.outcome {
            for joiner in joiners {
                let _ = joiner.send(outcome);
            }
        }
    }
}

enum BatchEntry {
    Run,
    Join(oneshot::Receiver<BatchOutcome>),
    Closed,
}

enum Blocking {
    Chosen(BlockingChoice),
    /// The dialog itself failed; nobody can answer it
    Unavailable,
    Discarded,
}

enum BatchPrompt {
    /// `true` if every kind was granted
    Answered(bool),
    Busy,
    Discarded,
}

/// Per-session permission state machine
///
/// One instance per UI session, shared by every handler through `Arc`.
pub struct PermissionCoordinator {
    gateway: Arc<dyn OsGateway>,
    blocking_prompt: BlockingPrompt,
    state: Mutex<CoordinatorState>,
}

impl PermissionCoordinator {
    pub fn new(gateway: Arc<dyn OsGateway>, blocking_prompt: BlockingPrompt) -> Self {
        Self {
            gateway,
            blocking_prompt,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Recorded state of `kind`
    pub fn state(&self, kind: PermissionKind) -> PermissionState {
        self.lock().states.get(&kind).copied().unwrap_or_default()
    }

    /// Whether every kind in `kinds` is recorded as granted
    pub fn all_granted(&self, kinds: &[PermissionKind]) -> bool {
        let state = self.lock();
        kinds
            .iter()
            .all(|kind| state.states.get(kind) == Some(&PermissionState::Granted))
    }

    /// Number of kinds with a prompt in flight
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Labels of suspended operations with how long they have waited, in ms
    pub fn pending_labels(&self) -> Vec<(PermissionKind, String, u64)> {
        self.lock()
            .pending
            .iter()
            .map(|(kind, p)| (*kind, p.label.clone(), p.created_at.elapsed().as_millis() as u64))
            .collect()
    }

    pub fn batch_phase(&self) -> BatchPhase {
        self.lock().batch_phase
    }

    /// Whether a startup batch is currently running
    pub fn batch_in_flight(&self) -> bool {
        self.lock().batch.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    fn set_phase(&self, phase: BatchPhase) {
        let mut state = self.lock();
        if !state.disposed {
            tracing::debug!(from = ?state.batch_phase, to = ?phase, "Permission batch phase");
            state.batch_phase = phase;
        }
    }

    fn register(&self, kind: PermissionKind, label: &str) -> Registration {
        let mut state = self.lock();
        if state.disposed {
            return Registration::Ready(Authorization::Discarded);
        }
        if state.states.get(&kind) == Some(&PermissionState::Granted) {
            return Registration::Ready(Authorization::Granted);
        }
        if let Some(pending) = state.pending.get_mut(&kind) {
            let (tx, rx) = oneshot::channel();
            pending.followers.push(tx);
            tracing::debug!(
                kind = %kind,
                label = %label,
                waiting_on = %pending.label,
                "Permission prompt already in flight, queued"
            );
            return Registration::Follower(rx);
        }
        state.pending.insert(
            kind,
            PendingContinuation {
                label: label.to_string(),
                created_at: Instant::now(),
                followers: Vec::new(),
            },
        );
        Registration::Leader
    }

    /// Settle the continuation for `kind`
    ///
    /// `answer` is `Some` for an explicit OS report (recorded as the new
    /// state) and `None` for a subsystem failure (routed as denied, state
    /// untouched). Returns `Discarded` if the continuation was torn down
    /// while the prompt was showing.
    fn complete(&self, kind: PermissionKind, answer: Option<bool>) -> Authorization {
        let mut state = self.lock();
        if state.disposed {
            return Authorization::Discarded;
        }
        let Some(pending) = state.pending.remove(&kind) else {
            return Authorization::Discarded;
        };
        if let Some(granted) = answer {
            state.states.insert(kind, PermissionState::from_granted(granted));
        }
        let granted = answer.unwrap_or(false);
        for follower in pending.followers {
            let _ = follower.send(granted);
        }
        Authorization::from_granted(granted)
    }

    /// Ask the OS for `kind` without prompting; returns `true` if granted
    async fn granted_by_os(&self, kind: PermissionKind) -> bool {
        match self.gateway.permission_status(kind).await {
            Ok(PermissionState::Granted) => true,
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Permission status query failed");
                false
            }
        }
    }

    /// Suspend until `kind` is granted or denied
    ///
    /// Already granted resolves without touching the OS. Otherwise the OS
    /// status is consulted first and a prompt is shown only if that does not
    /// report a grant. `label` names the suspended operation in logs.
    pub async fn authorize(&self, kind: PermissionKind, label: &str) -> Authorization {
        match self.register(kind, label) {
            Registration::Ready(auth) => auth,
            Registration::Follower(rx) => match rx.await {
                Ok(granted) => Authorization::from_granted(granted),
                Err(_) => Authorization::Discarded,
            },
            Registration::Leader => {
                let guard = PromptGuard {
                    coordinator: self,
                    kinds: vec![kind],
                };
                if self.granted_by_os(kind).await {
                    tracing::debug!(kind = %kind, "Permission already granted by OS");
                    guard.disarm();
                    return self.complete(kind, Some(true));
                }

                tracing::info!(kind = %kind, label = %label, "Requesting permission");
                let answer = match self.gateway.request_permission(kind).await {
                    Ok(granted) => Some(granted),
                    Err(e) => {
                        tracing::warn!(
                            kind = %kind,
                            error = %e,
                            "Permission request failed, treating as denied"
                        );
                        None
                    }
                };
                guard.disarm();
                let auth = self.complete(kind, answer);
                tracing::info!(kind = %kind, outcome = ?auth, "Permission resolved");
                auth
            }
        }
    }

    /// Run `on_granted` or `on_denied` once `kind` is decided
    ///
    /// Exactly one callback runs, exactly once. Returns `None` without
    /// running either if the session is torn down while suspended.
    pub async fn check_and_run<T, G, GF, D, DF>(
        &self,
        kind: PermissionKind,
        label: &str,
        on_granted: G,
        on_denied: D,
    ) -> Option<T>
    where
        G: FnOnce() -> GF,
        GF: Future<Output = T>,
        D: FnOnce() -> DF,
        DF: Future<Output = T>,
    {
        match self.authorize(kind, label).await {
            Authorization::Granted => Some(on_granted().await),
            Authorization::Denied => Some(on_denied().await),
            Authorization::Discarded => {
                tracing::debug!(kind = %kind, label = %label, "Continuation discarded");
                None
            }
        }
    }

    /// Request every kind in `kinds` not yet granted, in one batch
    ///
    /// If anything is denied the blocking "grant again / exit" dialog is
    /// shown until the user picks one of the two. Dismissals re-present it;
    /// a dialog that fails to show ends the batch as `Unavailable`.
    ///
    /// Only one batch runs per coordinator. A call made while one is running
    /// shows nothing itself and resolves with that batch's outcome.
    pub async fn request_all(&self, kinds: &[PermissionKind]) -> BatchOutcome {
        let entry = {
            let mut state = self.lock();
            if state.disposed {
                BatchEntry::Closed
            } else if let Some(joiners) = state.batch.as_mut() {
                let (tx, rx) = oneshot::channel();
                joiners.push(tx);
                BatchEntry::Join(rx)
            } else {
                state.batch = Some(Vec::new());
                BatchEntry::Run
            }
        };

        match entry {
            BatchEntry::Closed => BatchOutcome::Discarded,
            BatchEntry::Join(rx) => {
                tracing::debug!(kinds = ?kinds, "Permission batch already running, joined");
                rx.await.unwrap_or(BatchOutcome::Discarded)
            }
            BatchEntry::Run => {
                let mut guard = BatchGuard {
                    coordinator: self,
                    outcome: None,
                };
                let outcome = self.run_batch(kinds).await;
                guard.outcome = Some(outcome);
                outcome
            }
        }
    }

    async fn run_batch(&self, kinds: &[PermissionKind]) -> BatchOutcome {
        loop {
            self.set_phase(BatchPhase::Prompting);

            let Some(missing) = self.missing_kinds(kinds).await else {
                return BatchOutcome::Discarded;
            };
            if missing.is_empty() {
                self.set_phase(BatchPhase::AllGranted);
                tracing::info!(kinds = ?kinds, "All permissions granted");
                return BatchOutcome::AllGranted;
            }

            let all_granted = match self.prompt_batch(&missing).await {
                BatchPrompt::Answered(all_granted) => all_granted,
                BatchPrompt::Busy => continue,
                BatchPrompt::Discarded => return BatchOutcome::Discarded,
            };
            if all_granted {
                self.set_phase(BatchPhase::AllGranted);
                tracing::info!(kinds = ?kinds, "All permissions granted");
                return BatchOutcome::AllGranted;
            }

            self.set_phase(BatchPhase::AnyDenied);
            match self.block_until_choice().await {
                Blocking::Chosen(BlockingChoice::Retry) => continue,
                Blocking::Chosen(BlockingChoice::Exit) => {
                    self.set_phase(BatchPhase::Terminal);
                    tracing::warn!("Required permissions denied, exiting");
                    self.gateway.exit_process().await;
                    return BatchOutcome::Exited;
                }
                Blocking::Unavailable => {
                    self.set_phase(BatchPhase::AnyDenied);
                    return BatchOutcome::Unavailable;
                }
                Blocking::Discarded => return BatchOutcome::Discarded,
            }
        }
    }

    /// Kinds in `kinds` that still need a prompt
    ///
    /// Waits out prompts already in flight for any of them, and records
    /// kinds the OS reports as granted. `None` if torn down meanwhile.
    async fn missing_kinds(&self, kinds: &[PermissionKind]) -> Option<Vec<PermissionKind>> {
        let mut missing = Vec::new();
        for kind in kinds {
            if missing.contains(kind) {
                continue;
            }
            // Serialize behind any in-flight single prompt for this kind
            let waiter = {
                let mut state = self.lock();
                if state.disposed {
                    return None;
                }
                state.pending.get_mut(kind).map(|pending| {
                    let (tx, rx) = oneshot::channel();
                    pending.followers.push(tx);
                    rx
                })
            };
            if let Some(rx) = waiter {
                rx.await.ok()?;
            }

            match self.state(*kind) {
                PermissionState::Granted => {}
                _ if self.granted_by_os(*kind).await => {
                    let mut state = self.lock();
                    if state.disposed {
                        return None;
                    }
                    state.states.insert(*kind, PermissionState::Granted);
                }
                _ => missing.push(*kind),
            }
        }
        Some(missing)
    }

    /// Issue one batched prompt for `missing`
    async fn prompt_batch(&self, missing: &[PermissionKind]) -> BatchPrompt {
        {
            let mut state = self.lock();
            if state.disposed {
                return BatchPrompt::Discarded;
            }
            // A single prompt started while we were checking; wait it out first
            if missing.iter().any(|kind| state.pending.contains_key(kind)) {
                return BatchPrompt::Busy;
            }
            for kind in missing {
                state.pending.insert(
                    *kind,
                    PendingContinuation {
                        label: "startup permission batch".to_string(),
                        created_at: Instant::now(),
                        followers: Vec::new(),
                    },
                );
            }
        }

        let guard = PromptGuard {
            coordinator: self,
            kinds: missing.to_vec(),
        };
        tracing::info!(kinds = ?missing, "Requesting permission batch");
        let answers = match self.gateway.request_permissions(missing).await {
            Ok(answers) => Some(answers),
            Err(e) => {
                tracing::warn!(error = %e, "Permission batch failed, treating as denied");
                None
            }
        };
        guard.disarm();

        let mut all_granted = true;
        for kind in missing {
            let answer = answers
                .as_ref()
                .map(|answers| answers.get(kind).copied().unwrap_or(false));
            match self.complete(*kind, answer) {
                Authorization::Granted => {}
                Authorization::Denied => all_granted = false,
                Authorization::Discarded => return BatchPrompt::Discarded,
            }
        }
        BatchPrompt::Answered(all_granted)
    }

    /// Present the blocking dialog until the user picks retry or exit
    async fn block_until_choice(&self) -> Blocking {
        loop {
            if self.is_disposed() {
                return Blocking::Discarded;
            }
            self.set_phase(BatchPhase::Blocking);
            match self.gateway.present_blocking_choice(&self.blocking_prompt).await {
                Ok(Some(choice)) => {
                    tracing::info!(choice = ?choice, "Blocking permission choice");
                    return Blocking::Chosen(choice);
                }
                Ok(None) => {
                    tracing::debug!("Blocking dialog dismissed, presenting again");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Blocking dialog failed, ending permission batch");
                    return Blocking::Unavailable;
                }
            }
        }
    }

    /// Discard every suspended continuation without resuming it
    ///
    /// Called when the owning UI session goes away. Queued followers see
    /// `Discarded`; a prompt answer arriving afterwards is ignored.
    pub fn teardown(&self) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        let discarded = state.pending.len();
        // Dropping the senders wakes followers with a closed channel
        state.pending.clear();
        state.batch = None;
        tracing::info!(discarded, "Permission coordinator torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{GatewayCall, MemoryGateway};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn coordinator(gateway: &Arc<MemoryGateway>) -> Arc<PermissionCoordinator> {
        Arc::new(PermissionCoordinator::new(
            gateway.clone(),
            BlockingPrompt::default(),
        ))
    }

    const CALL: PermissionKind = PermissionKind::CallCapability;
    const CONTACTS: PermissionKind = PermissionKind::ContactsReadCapability;

    #[tokio::test]
    async fn test_granted_runs_without_prompt() {
        let gateway = Arc::new(MemoryGateway::new().with_granted(CALL));
        let coord = coordinator(&gateway);

        let first = coord.check_and_run(CALL, "dial", || async { "granted" }, || async { "denied" }).await;
        assert_eq!(first, Some("granted"));
        assert_eq!(coord.state(CALL), PermissionState::Granted);

        let second = coord.check_and_run(CALL, "dial", || async { "granted" }, || async { "denied" }).await;
        assert_eq!(second, Some("granted"));
        assert_eq!(gateway.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_grant_then_cached() {
        let gateway = Arc::new(MemoryGateway::new());
        let coord = coordinator(&gateway);

        assert_eq!(coord.authorize(CONTACTS, "pick").await, Authorization::Granted);
        assert_eq!(gateway.prompt_count(), 1);
        assert_eq!(coord.authorize(CONTACTS, "pick").await, Authorization::Granted);
        assert_eq!(gateway.prompt_count(), 1);
        assert_eq!(coord.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_denied_runs_on_denied_once() {
        let gateway = Arc::new(MemoryGateway::new().with_default_answer(false));
        let coord = coordinator(&gateway);
        let granted = AtomicUsize::new(0);
        let denied = AtomicUsize::new(0);

        coord
            .check_and_run(
                CALL,
                "dial",
                || async { granted.fetch_add(1, Ordering::SeqCst) },
                || async { denied.fetch_add(1, Ordering::SeqCst) },
            )
            .await;

        assert_eq!(granted.load(Ordering::SeqCst), 0);
        assert_eq!(denied.load(Ordering::SeqCst), 1);
        assert_eq!(coord.state(CALL), PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_denied_state_prompts_again() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.push_answer(CALL, false);
        let coord = coordinator(&gateway);

        assert_eq!(coord.authorize(CALL, "dial").await, Authorization::Denied);
        assert_eq!(coord.authorize(CALL, "dial").await, Authorization::Granted);
        assert_eq!(gateway.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_subsystem_error_is_denied_not_recorded() {
        let gateway = Arc::new(MemoryGateway::new().with_failing_permissions());
        let coord = coordinator(&gateway);

        assert_eq!(coord.authorize(CALL, "dial").await, Authorization::Denied);
        assert_eq!(coord.state(CALL), PermissionState::Undetermined);
        assert_eq!(coord.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_prompt() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.hold_prompts();
        let coord = coordinator(&gateway);

        let first = tokio::spawn({
            let coord = coord.clone();
            async move { coord.authorize(CALL, "dial 1").await }
        });
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let coord = coord.clone();
            async move { coord.authorize(CALL, "dial 2").await }
        });
        tokio::task::yield_now().await;

        assert_eq!(coord.pending_count(), 1);
        assert_eq!(coord.pending_labels()[0].1, "dial 1");
        assert_eq!(gateway.prompt_count(), 1);

        gateway.release_prompts();
        assert_eq!(first.await.unwrap(), Authorization::Granted);
        assert_eq!(second.await.unwrap(), Authorization::Granted);
        assert_eq!(gateway.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_teardown_discards_pending() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.hold_prompts();
        let coord = coordinator(&gateway);
        let ran = Arc::new(AtomicUsize::new(0));

        let leader = tokio::spawn({
            let coord = coord.clone();
            let ran = ran.clone();
            async move {
                coord
                    .check_and_run(
                        CALL,
                        "dial",
                        || async { ran.fetch_add(1, Ordering::SeqCst) },
                        || async { ran.fetch_add(1, Ordering::SeqCst) },
                    )
                    .await
            }
        });
        tokio::task::yield_now().await;
        let follower = tokio::spawn({
            let coord = coord.clone();
            async move { coord.authorize(CALL, "dial again").await }
        });
        tokio::task::yield_now().await;

        coord.teardown();
        gateway.release_prompts();

        assert_eq!(leader.await.unwrap(), None);
        assert_eq!(follower.await.unwrap(), Authorization::Discarded);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(coord.pending_count(), 0);
        assert_eq!(coord.authorize(CONTACTS, "pick").await, Authorization::Discarded);
    }

    #[tokio::test]
    async fn test_abandoned_prompt_releases_kind() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.hold_prompts();
        let coord = coordinator(&gateway);

        let leader = tokio::spawn({
            let coord = coord.clone();
            async move { coord.authorize(CALL, "dial").await }
        });
        tokio::task::yield_now().await;
        assert_eq!(coord.pending_count(), 1);

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());
        assert_eq!(coord.pending_count(), 0);

        gateway.release_prompts();
        assert_eq!(coord.authorize(CALL, "dial again").await, Authorization::Granted);
    }

    #[tokio::test]
    async fn test_request_all_idempotent_when_granted() {
        let gateway = Arc::new(MemoryGateway::new().with_granted(CALL).with_granted(CONTACTS));
        let coord = coordinator(&gateway);

        assert_eq!(coord.request_all(&PermissionKind::ALL).await, BatchOutcome::AllGranted);
        assert_eq!(coord.request_all(&PermissionKind::ALL).await, BatchOutcome::AllGranted);
        assert_eq!(gateway.prompt_count(), 0);
        assert!(coord.all_granted(&PermissionKind::ALL));
    }

    #[tokio::test]
    async fn test_request_all_prompts_only_missing() {
        let gateway = Arc::new(MemoryGateway::new().with_granted(CALL));
        let coord = coordinator(&gateway);

        assert_eq!(coord.request_all(&PermissionKind::ALL).await, BatchOutcome::AllGranted);
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::RequestPermissions(vec![CONTACTS])]
        );
        assert_eq!(coord.batch_phase(), BatchPhase::AllGranted);
    }

    #[tokio::test]
    async fn test_request_all_denied_then_exit() {
        let gateway = Arc::new(MemoryGateway::new().with_default_answer(false));
        gateway.push_choice(Some(BlockingChoice::Exit));
        let coord = coordinator(&gateway);

        assert_eq!(coord.request_all(&PermissionKind::ALL).await, BatchOutcome::Exited);
        assert!(gateway.exited());
        assert_eq!(coord.batch_phase(), BatchPhase::Terminal);
    }

    #[tokio::test]
    async fn test_request_all_retry_after_denial() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.push_answer(CONTACTS, false);
        gateway.push_choice(Some(BlockingChoice::Retry));
        let coord = coordinator(&gateway);

        assert_eq!(coord.request_all(&PermissionKind::ALL).await, BatchOutcome::AllGranted);
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::RequestPermissions(vec![CALL, CONTACTS]),
                GatewayCall::BlockingChoice,
                GatewayCall::RequestPermissions(vec![CONTACTS]),
            ]
        );
        assert!(!gateway.exited());
    }

    #[tokio::test]
    async fn test_blocking_dialog_not_dismissible() {
        let gateway = Arc::new(MemoryGateway::new().with_default_answer(false));
        gateway.push_choice(None);
        gateway.push_choice(None);
        gateway.push_choice(Some(BlockingChoice::Exit));
        let coord = coordinator(&gateway);

        assert_eq!(coord.request_all(&[CALL]).await, BatchOutcome::Exited);
        let dialogs = gateway
            .calls()
            .into_iter()
            .filter(|c| *c == GatewayCall::BlockingChoice)
            .count();
        assert_eq!(dialogs, 3);
    }

    #[tokio::test]
    async fn test_request_all_waits_for_inflight_prompt() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.hold_prompts();
        let coord = coordinator(&gateway);

        let single = tokio::spawn({
            let coord = coord.clone();
            async move { coord.authorize(CALL, "dial").await }
        });
        tokio::task::yield_now().await;
        let batch = tokio::spawn({
            let coord = coord.clone();
            async move { coord.request_all(&[CALL]).await }
        });
        tokio::task::yield_now().await;

        gateway.release_prompts();
        assert_eq!(single.await.unwrap(), Authorization::Granted);
        assert_eq!(batch.await.unwrap(), BatchOutcome::AllGranted);
        assert_eq!(gateway.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_dialog_ends_batch() {
        let gateway = Arc::new(
            MemoryGateway::new()
                .with_default_answer(false)
                .with_failing_dialog(),
        );
        let coord = coordinator(&gateway);

        let outcome = tokio::time::timeout(Duration::from_secs(1), coord.request_all(&[CALL]))
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome::Unavailable);
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::RequestPermissions(vec![CALL]),
                GatewayCall::BlockingChoice,
            ]
        );
        assert!(!gateway.exited());
        assert!(!coord.batch_in_flight());
        assert_eq!(coord.batch_phase(), BatchPhase::AnyDenied);
    }

    #[tokio::test]
    async fn test_second_batch_joins_running_one() {
        let gateway = Arc::new(MemoryGateway::new().with_default_answer(false));
        gateway.hold_prompts();
        let coord = coordinator(&gateway);

        let first = tokio::spawn({
            let coord = coord.clone();
            async move { coord.request_all(&PermissionKind::ALL).await }
        });
        tokio::task::yield_now().await;
        assert!(coord.batch_in_flight());

        let second = tokio::spawn({
            let coord = coord.clone();
            async move { coord.request_all(&PermissionKind::ALL).await }
        });
        tokio::task::yield_now().await;

        gateway.release_prompts();
        assert_eq!(first.await.unwrap(), BatchOutcome::Exited);
        assert_eq!(second.await.unwrap(), BatchOutcome::Exited);
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::RequestPermissions(vec![CALL, CONTACTS]),
                GatewayCall::BlockingChoice,
                GatewayCall::Exit,
            ]
        );
        assert!(!coord.batch_in_flight());
    }

    #[tokio::test]
    async fn test_teardown_discards_joined_batch() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.hold_prompts();
        let coord = coordinator(&gateway);

        let first = tokio::spawn({
            let coord = coord.clone();
            async move { coord.request_all(&[CALL]).await }
        });
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let coord = coord.clone();
            async move { coord.request_all(&[CALL]).await }
        });
        tokio::task::yield_now().await;

        coord.teardown();
        gateway.release_prompts();
        assert_eq!(first.await.unwrap(), BatchOutcome::Discarded);
        assert_eq!(second.await.unwrap(), BatchOutcome::Discarded);
        assert_eq!(coord.request_all(&[CALL]).await, BatchOutcome::Discarded);
    }

    #[tokio::test]
    async fn test_request_all_batch_error_treated_as_denied() {
        let gateway = Arc::new(MemoryGateway::new().with_failing_permissions());
        let coord = coordinator(&gateway);

        assert_eq!(coord.request_all(&[CONTACTS]).await, BatchOutcome::Exited);
        assert_eq!(coord.state(CONTACTS), PermissionState::Undetermined);
    }
}
