//! The per-context version watcher state machine

use std::sync::Arc;

use eyre::{Result, eyre};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use timeoutpoll::{PollOptions, PollTask, TimeoutPoll};

use crate::channel::{ChannelHandle, ChannelMessage};
use crate::notify::{PromptHandle, PromptOutcome, UpdateNotifier, UpdatePrompt};
use crate::source::VersionSource;

use super::config::WatcherConfig;

/// Mailbox depth. Back-pressure keeps at most one tick in flight, so the
/// buffer only has to absorb control messages.
const EVENT_BUFFER: usize = 16;

/// Lifecycle phase of a watcher context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// No baseline adopted yet.
    Idle,
    /// Polling against a baseline; no prompt open.
    Watching,
    /// Update prompt open; polling paused.
    Notifying,
    /// Context finished; resources released.
    TornDown,
}

/// How a watcher run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The user confirmed the update; the embedder should reload now.
    Reload,
    /// The context was torn down without a confirmed update.
    TornDown,
}

/// Stimuli handled by the watcher's run loop.
#[derive(Debug)]
enum WatcherEvent {
    /// A poll tick; `done` releases the poll loop to re-arm.
    Tick { done: oneshot::Sender<()> },

    /// The user decided on the open prompt.
    Outcome(PromptOutcome),

    /// Programmatic dismissal of the open prompt.
    HidePrompt,

    /// The context is being destroyed.
    Teardown,
}

/// What the run loop woke up for.
enum Stimulus {
    Event(WatcherEvent),
    VisibilityChanged,
    VisibilityClosed,
    Sibling(ChannelMessage),
    ChannelClosed,
}

/// Cloneable control handle for a watcher.
#[derive(Clone)]
pub struct WatcherHandle {
    tx: mpsc::Sender<WatcherEvent>,
}

impl WatcherHandle {
    /// Dismiss an open prompt without a user decision. Polling resumes and
    /// siblings are told the prompt is gone.
    pub async fn hide_prompt(&self) -> Result<()> {
        self.tx
            .send(WatcherEvent::HidePrompt)
            .await
            .map_err(|_| eyre!("Watcher channel closed"))
    }

    /// Tear the context down: close any open prompt silently, stop polling,
    /// release the coordination channel.
    pub async fn teardown(&self) -> Result<()> {
        self.tx
            .send(WatcherEvent::Teardown)
            .await
            .map_err(|_| eyre!("Watcher channel closed"))
    }
}

struct OpenPrompt {
    handle: Box<dyn PromptHandle>,
}

/// Per-context version watcher.
///
/// Owns every piece of state the notification flow needs (the baseline
/// marker, the open prompt, the poll handle) and funnels all mutation
/// through one run loop. `run` consumes the watcher, so a context cannot be
/// started twice.
pub struct VersionWatcher {
    config: WatcherConfig,
    source: Arc<dyn VersionSource>,
    notifier: Arc<dyn UpdateNotifier>,
    prompt: UpdatePrompt,
    channel: ChannelHandle,
    visibility: watch::Receiver<bool>,
    context_id: Uuid,

    phase: WatchPhase,
    local_version: Option<String>,
    open_prompt: Option<OpenPrompt>,
    poll: Option<TimeoutPoll>,

    events_tx: mpsc::Sender<WatcherEvent>,
    events_rx: mpsc::Receiver<WatcherEvent>,
}

impl VersionWatcher {
    pub fn new(
        config: WatcherConfig,
        source: Arc<dyn VersionSource>,
        notifier: Arc<dyn UpdateNotifier>,
        prompt: UpdatePrompt,
        channel: ChannelHandle,
        visibility: watch::Receiver<bool>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let context_id = channel.origin();

        Self {
            config,
            source,
            notifier,
            prompt,
            channel,
            visibility,
            context_id,
            phase: WatchPhase::Idle,
            local_version: None,
            open_prompt: None,
            poll: None,
            events_tx,
            events_rx,
        }
    }

    /// Control handle for this watcher. Valid before and during `run`.
    pub fn handle(&self) -> WatcherHandle {
        WatcherHandle {
            tx: self.events_tx.clone(),
        }
    }

    /// The context id used in logs and channel envelopes.
    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// The last marker this context accepted as current.
    pub fn local_version(&self) -> Option<&str> {
        self.local_version.as_deref()
    }

    /// Whether an update prompt is currently open.
    pub fn prompt_open(&self) -> bool {
        self.open_prompt.is_some()
    }

    /// Run the watcher until teardown or a confirmed update.
    pub async fn run(mut self) -> WatchExit {
        let poll = TimeoutPoll::new(
            self.tick_task(),
            self.config.poll_interval(),
            PollOptions {
                immediate: self.config.immediate,
                max: self.config.max_iterations(),
            },
        );
        // Without `immediate` the constructor does not auto-start; resume is
        // idempotent, so calling it here covers both configurations.
        poll.resume();
        self.poll = Some(poll);

        info!(
            context = %self.context_id,
            interval_ms = self.config.poll_interval_ms,
            "version watcher started"
        );

        let mut visibility_alive = true;
        let mut channel_alive = true;

        let exit = loop {
            let stimulus = tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => Stimulus::Event(event),
                    // Every sender lives in this struct or a forwarder it
                    // spawned; a closed mailbox means the context is gone.
                    None => Stimulus::Event(WatcherEvent::Teardown),
                },
                changed = self.visibility.changed(), if visibility_alive => match changed {
                    Ok(()) => Stimulus::VisibilityChanged,
                    Err(_) => Stimulus::VisibilityClosed,
                },
                message = self.channel.recv(), if channel_alive => match message {
                    Some(message) => Stimulus::Sibling(message),
                    None => Stimulus::ChannelClosed,
                },
            };

            match stimulus {
                Stimulus::Event(WatcherEvent::Tick { done }) => {
                    self.check_once().await;
                    let _ = done.send(());
                }
                Stimulus::Event(WatcherEvent::Outcome(outcome)) => {
                    if self.open_prompt.is_none() {
                        // The prompt was already dismissed; a late decision
                        // has nothing to act on.
                        trace!(context = %self.context_id, ?outcome, "stale prompt outcome ignored");
                        continue;
                    }
                    match outcome {
                        PromptOutcome::Confirmed => {
                            info!(
                                context = %self.context_id,
                                version = ?self.local_version,
                                "update confirmed"
                            );
                            break WatchExit::Reload;
                        }
                        PromptOutcome::Cancelled => self.hide_prompt(false),
                    }
                }
                Stimulus::Event(WatcherEvent::HidePrompt) => self.hide_prompt(false),
                Stimulus::Event(WatcherEvent::Teardown) => break WatchExit::TornDown,
                Stimulus::VisibilityChanged => {
                    let visible = *self.visibility.borrow_and_update();
                    self.on_visibility(visible);
                }
                Stimulus::VisibilityClosed => {
                    debug!(context = %self.context_id, "visibility signal gone, gating frozen");
                    visibility_alive = false;
                }
                Stimulus::Sibling(message) => {
                    // Siblings advertise their prompt state here. Local
                    // behavior deliberately ignores it for now; this is the
                    // extension point for a cross-context suppression policy.
                    trace!(context = %self.context_id, ?message, "coordination message observed");
                }
                Stimulus::ChannelClosed => {
                    debug!(context = %self.context_id, "update channel closed");
                    channel_alive = false;
                }
            }
        };

        self.teardown();
        exit
    }

    /// Run one fetch/compare cycle.
    ///
    /// Failures are logged and swallowed; nothing a single tick does may
    /// take the poll loop down.
    pub async fn check_once(&mut self) {
        match self.source.fetch_version().await {
            Ok(remote) => self.observe_marker(remote).await,
            Err(error) => {
                warn!(context = %self.context_id, %error, "version check failed");
            }
        }
    }

    async fn observe_marker(&mut self, remote: String) {
        let Some(local) = self.local_version.as_deref() else {
            // First observation establishes the baseline, not a change.
            info!(context = %self.context_id, version = %remote, "adopted baseline version");
            self.local_version = Some(remote);
            self.phase = WatchPhase::Watching;
            return;
        };

        if remote == local {
            trace!(context = %self.context_id, version = %remote, "version unchanged");
            return;
        }

        debug!(context = %self.context_id, old = %local, new = %remote, "version changed");
        self.show_prompt(remote).await;
    }

    async fn show_prompt(&mut self, new_version: String) {
        if self.open_prompt.is_some() {
            trace!(context = %self.context_id, "prompt already open, not opening another");
            return;
        }

        let (outcome_tx, outcome_rx) = oneshot::channel();
        match self.notifier.show(self.prompt.clone(), outcome_tx).await {
            Ok(handle) => {
                // The new marker is adopted at detection time, independent
                // of whether the user confirms or cancels.
                self.local_version = Some(new_version);
                self.open_prompt = Some(OpenPrompt { handle });
                self.phase = WatchPhase::Notifying;
                if let Some(poll) = &self.poll {
                    poll.pause();
                }
                self.channel.post(ChannelMessage::Toggle { shown: true });

                // Forward the user's decision into the run loop. A closed
                // prompt drops the sender and forwards nothing.
                let events_tx = self.events_tx.clone();
                tokio::spawn(async move {
                    if let Ok(outcome) = outcome_rx.await {
                        let _ = events_tx.send(WatcherEvent::Outcome(outcome)).await;
                    }
                });
            }
            Err(error) => {
                // The baseline is left untouched, so the next tick detects
                // the same change and tries again.
                warn!(context = %self.context_id, %error, "failed to show update prompt");
            }
        }
    }

    fn hide_prompt(&mut self, silent: bool) {
        if let Some(mut open) = self.open_prompt.take() {
            open.handle.close();
        }
        self.phase = if self.local_version.is_some() {
            WatchPhase::Watching
        } else {
            WatchPhase::Idle
        };

        if let Some(poll) = &self.poll {
            poll.resume();
        }
        if !silent {
            self.channel.post(ChannelMessage::Toggle { shown: false });
        }
    }

    fn on_visibility(&mut self, visible: bool) {
        debug!(context = %self.context_id, visible, "visibility transition");
        let Some(poll) = &self.poll else {
            return;
        };

        if visible && self.open_prompt.is_none() {
            poll.resume();
        } else {
            poll.pause();
        }
    }

    /// Release everything owned by the context: the prompt is closed
    /// without rebroadcasting, the poll handle is fully reset, and the
    /// channel endpoint and visibility subscription close when the watcher
    /// drops.
    fn teardown(&mut self) {
        if let Some(mut open) = self.open_prompt.take() {
            open.handle.close();
        }
        if let Some(poll) = self.poll.take() {
            poll.reset();
        }
        self.phase = WatchPhase::TornDown;
        info!(context = %self.context_id, "version watcher torn down");
    }

    /// Build the poll task: every tick goes through the mailbox and holds
    /// the poll loop until the watcher has fully processed it.
    fn tick_task(&self) -> PollTask {
        let events_tx = self.events_tx.clone();
        Arc::new(move || {
            let events_tx = events_tx.clone();
            Box::pin(async move {
                let (done_tx, done_rx) = oneshot::channel();
                if events_tx.send(WatcherEvent::Tick { done: done_tx }).await.is_err() {
                    return;
                }
                let _ = done_rx.await;
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::UpdateChannel;
    use crate::notify::NotifyError;
    use crate::source::SourceError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that serves a scripted sequence of markers, repeating the
    /// last entry once the script runs out.
    struct ScriptedSource {
        markers: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(markers: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                markers: markers.to_vec(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VersionSource for ScriptedSource {
        async fn fetch_version(&self) -> Result<String, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let index = call.min(self.markers.len() - 1);
            Ok(self.markers[index].to_string())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl VersionSource for FailingSource {
        async fn fetch_version(&self) -> Result<String, SourceError> {
            Err(SourceError::EmptyMarker)
        }
    }

    /// Notifier that records prompts and holds the outcome sender.
    #[derive(Default)]
    struct RecordingNotifier {
        shown: AtomicUsize,
        failing: bool,
        pending: Mutex<Option<oneshot::Sender<PromptOutcome>>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                failing: true,
                ..Self::default()
            })
        }

        fn shown(&self) -> usize {
            self.shown.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpdateNotifier for RecordingNotifier {
        async fn show(
            &self,
            _prompt: UpdatePrompt,
            outcome_tx: oneshot::Sender<PromptOutcome>,
        ) -> Result<Box<dyn PromptHandle>, NotifyError> {
            if self.failing {
                return Err(NotifyError::Unavailable("no display".to_string()));
            }
            self.shown.fetch_add(1, Ordering::SeqCst);
            *self.pending.lock().unwrap() = Some(outcome_tx);
            Ok(Box::new(NoopPrompt))
        }
    }

    struct NoopPrompt;

    impl PromptHandle for NoopPrompt {
        fn close(&mut self) {}
    }

    fn test_prompt() -> UpdatePrompt {
        UpdatePrompt {
            title: "New version available".to_string(),
            body: "A new build was deployed.".to_string(),
            confirm_label: "Refresh now".to_string(),
            cancel_label: "Not yet".to_string(),
        }
    }

    fn build_watcher(
        source: Arc<dyn VersionSource>,
        notifier: Arc<dyn UpdateNotifier>,
    ) -> (VersionWatcher, ChannelHandle) {
        let channel = UpdateChannel::new("version-watch");
        let endpoint = channel.register(Uuid::now_v7());
        let sibling = channel.register(Uuid::now_v7());
        let visibility = watch::channel(true).1;

        let watcher = VersionWatcher::new(
            WatcherConfig::default(),
            source,
            notifier,
            test_prompt(),
            endpoint,
            visibility,
        );
        (watcher, sibling)
    }

    #[tokio::test]
    async fn test_first_fetch_adopts_baseline_without_prompt() {
        let source = ScriptedSource::new(&["v1"]);
        let notifier = RecordingNotifier::new();
        let (mut watcher, _sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        assert_eq!(watcher.phase(), WatchPhase::Idle);
        watcher.check_once().await;

        assert_eq!(watcher.local_version(), Some("v1"));
        assert_eq!(watcher.phase(), WatchPhase::Watching);
        assert_eq!(notifier.shown(), 0);
    }

    #[tokio::test]
    async fn test_unchanged_marker_does_not_prompt() {
        let source = ScriptedSource::new(&["abc", "abc"]);
        let notifier = RecordingNotifier::new();
        let (mut watcher, _sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;
        watcher.check_once().await;

        assert_eq!(watcher.local_version(), Some("abc"));
        assert_eq!(notifier.shown(), 0);
        assert!(!watcher.prompt_open());
    }

    #[tokio::test]
    async fn test_changed_marker_prompts_and_adopts() {
        let source = ScriptedSource::new(&["abc", "xyz"]);
        let notifier = RecordingNotifier::new();
        let (mut watcher, mut sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;
        watcher.check_once().await;

        assert_eq!(notifier.shown(), 1);
        assert!(watcher.prompt_open());
        assert_eq!(watcher.phase(), WatchPhase::Notifying);
        // Adopted at detection time, before any user decision.
        assert_eq!(watcher.local_version(), Some("xyz"));
        assert_eq!(sibling.try_recv(), Some(ChannelMessage::Toggle { shown: true }));
    }

    #[tokio::test]
    async fn test_second_change_while_prompt_open_is_ignored() {
        let source = ScriptedSource::new(&["v1", "v2", "v3"]);
        let notifier = RecordingNotifier::new();
        let (mut watcher, _sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;
        watcher.check_once().await;
        assert_eq!(notifier.shown(), 1);

        // A differing marker lands while the prompt is still open.
        watcher.check_once().await;
        assert_eq!(notifier.shown(), 1);
        assert!(watcher.prompt_open());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_swallowed() {
        let notifier = RecordingNotifier::new();
        let (mut watcher, _sibling) = build_watcher(Arc::new(FailingSource), Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;

        assert_eq!(watcher.local_version(), None);
        assert_eq!(watcher.phase(), WatchPhase::Idle);
        assert_eq!(notifier.shown(), 0);
    }

    #[tokio::test]
    async fn test_hide_prompt_resumes_and_broadcasts() {
        let source = ScriptedSource::new(&["v1", "v2"]);
        let notifier = RecordingNotifier::new();
        let (mut watcher, mut sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;
        watcher.check_once().await;
        assert_eq!(sibling.try_recv(), Some(ChannelMessage::Toggle { shown: true }));

        watcher.hide_prompt(false);

        assert!(!watcher.prompt_open());
        assert_eq!(watcher.phase(), WatchPhase::Watching);
        assert_eq!(sibling.try_recv(), Some(ChannelMessage::Toggle { shown: false }));
        // The marker stays adopted after dismissal.
        assert_eq!(watcher.local_version(), Some("v2"));
    }

    #[tokio::test]
    async fn test_silent_hide_does_not_broadcast() {
        let source = ScriptedSource::new(&["v1", "v2"]);
        let notifier = RecordingNotifier::new();
        let (mut watcher, mut sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;
        watcher.check_once().await;
        assert_eq!(sibling.try_recv(), Some(ChannelMessage::Toggle { shown: true }));

        watcher.hide_prompt(true);

        assert!(!watcher.prompt_open());
        assert_eq!(sibling.try_recv(), None);
    }

    #[tokio::test]
    async fn test_notifier_failure_keeps_old_baseline() {
        let source = ScriptedSource::new(&["v1", "v2", "v2"]);
        let notifier = RecordingNotifier::failing();
        let (mut watcher, _sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;
        watcher.check_once().await;

        // The prompt never opened, so the change was not adopted and the
        // next tick detects it again.
        assert_eq!(watcher.local_version(), Some("v1"));
        assert!(!watcher.prompt_open());
        assert_eq!(watcher.phase(), WatchPhase::Watching);

        watcher.check_once().await;
        assert_eq!(watcher.local_version(), Some("v1"));
    }

    #[tokio::test]
    async fn test_teardown_closes_prompt_silently() {
        let source = ScriptedSource::new(&["v1", "v2"]);
        let notifier = RecordingNotifier::new();
        let (mut watcher, mut sibling) = build_watcher(source, Arc::clone(&notifier) as Arc<dyn UpdateNotifier>);

        watcher.check_once().await;
        watcher.check_once().await;
        assert_eq!(sibling.try_recv(), Some(ChannelMessage::Toggle { shown: true }));

        watcher.teardown();

        assert_eq!(watcher.phase(), WatchPhase::TornDown);
        assert!(!watcher.prompt_open());
        assert_eq!(sibling.try_recv(), None);
    }
}
