//! [`Session`] – the gating pipeline for one MUD connection.
//!
//! Each transport read drives one pass through the pipeline:
//!
//! 1. **Observe** – strip ANSI codes, append to the trailing context window,
//!    and update [`WorldState`][mudgate_perception::WorldState] under the
//!    session lock.  This happens even while paused so state never goes
//!    stale.
//! 2. **Throttle** – [`InvocationThrottle::admit`] either buffers the change
//!    set or lets the cycle continue.  Force-immediate triggers (combat,
//!    severe HP loss, new status effects) always continue.
//! 3. **Classify** – [`ChangeClassifier`] compares the (buffered + new) text
//!    against the previous snapshot and decides whether anything happened.
//! 4. **Decide** – the [`Oracle`] proposes a command, with bounded retries.
//! 5. **Gatekeep** – [`CommandValidator`] breaks loops and keeps movement
//!    consistent with the known exits.
//! 6. **Act** – the command is written to the transport and announced on the
//!    [`EventBus`].
//!
//! Every stage can end the cycle early; those endings are reported as
//! [`CycleOutcome`] values, not errors.  Only transport failures are errors,
//! and they end the session.
//!
//! # Control
//!
//! A [`SessionHandle`] lets other tasks pause/resume autonomous play, inject
//! manual commands (validated, but never classified or sent to the oracle),
//! reset the throttle and classifier memory, and request shutdown.  Resuming
//! performs the same reset so the next real delta gets a fresh evaluation.
//!
//! # Example
//!
//! ```rust,no_run
//! use mudgate_middleware::{EventBus, TelnetTransport};
//! use mudgate_runtime::oracle::OpenAiCompatOracle;
//! use mudgate_runtime::session::{Session, SessionConfig};
//!
//! # async fn run() -> Result<(), mudgate_types::MudError> {
//! let transport = TelnetTransport::connect("batmud.bat.org", 2023, Default::default()).await?;
//! let oracle = OpenAiCompatOracle::new("http://localhost:11434", "llama3", None);
//! let (bus, _events) = EventBus::channel();
//!
//! let mut session = Session::new(Box::new(transport), Box::new(oracle), bus, SessionConfig::default());
//! let handle = session.handle();
//! tokio::spawn(async move { session.run().await });
//! handle.pause();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mudgate_kernel::{Admission, CommandValidator, InvocationThrottle, LoopDetector, Validated};
use mudgate_middleware::{EventBus, MudTransport, ReadOutcome};
use mudgate_perception::{ChangeClassifier, StateTracker, clean_text};
use mudgate_types::{EventPayload, MudError};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::oracle::{Oracle, RetryPolicy, UsageMeter, propose_with_retry, system_prompt};

/// Event source tag for everything the session emits.
pub const SOURCE: &str = "mudgate-runtime::session";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning knobs for one [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Minimum time between two oracle calls.
    pub min_interval: Duration,
    /// Repetitions of a 2- or 3-command pattern that count as a loop.
    pub loop_repeat_threshold: usize,
    /// Size of the trailing text window handed to the oracle, in characters.
    pub context_chars: usize,
    /// Upper bound on one transport read.
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
    /// Standing instructions sent with every oracle call.
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(2),
            loop_repeat_threshold: 2,
            context_chars: 2000,
            read_timeout: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            system_prompt: system_prompt("claude", None),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes and control
// ─────────────────────────────────────────────────────────────────────────────

/// How one pipeline pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Autonomous play is paused; state was updated, nothing else happened.
    Paused,
    /// The classifier found nothing worth a decision.
    NoNewInfo,
    /// Inside the throttle window; the change was buffered.
    Throttled,
    /// The oracle produced nothing usable after all retries.
    NoProposal,
    /// The validator suppressed the proposal.
    Suppressed,
    /// This command was written to the transport.
    Dispatched(String),
}

/// Messages accepted by a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Send a manual command (validated, never classified).
    Inject(String),
    Pause,
    Resume,
    /// Forget throttle and classifier memory.
    Reset,
    Shutdown,
}

/// Cloneable remote control for a [`Session`].
#[derive(Clone, Debug)]
pub struct SessionHandle {
    control: mpsc::UnboundedSender<Control>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    tracker: Arc<Mutex<StateTracker>>,
}

impl SessionHandle {
    fn send(&self, control: Control) {
        if self.control.send(control).is_err() {
            debug!("session already stopped; control message dropped");
        }
    }

    /// Queue a manual command.
    pub fn inject(&self, command: impl Into<String>) {
        self.send(Control::Inject(command.into()));
    }

    /// Suspend oracle calls and dispatch. A proposal still in flight is
    /// discarded when it returns.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        self.send(Control::Pause);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.send(Control::Resume);
    }

    pub fn reset(&self) {
        self.send(Control::Reset);
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.send(Control::Shutdown);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// One-paragraph description of the tracked world.
    pub async fn world_summary(&self) -> String {
        self.tracker.lock().await.state().summary()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// The gating pipeline for one connection.  Nothing inside is shared with any
/// other session.
pub struct Session {
    transport: Box<dyn MudTransport>,
    oracle: Box<dyn Oracle>,
    bus: EventBus,
    config: SessionConfig,
    tracker: Arc<Mutex<StateTracker>>,
    throttle: InvocationThrottle,
    classifier: ChangeClassifier,
    validator: CommandValidator,
    usage: UsageMeter,
    /// Trailing window of cleaned server text for the oracle context.
    history: String,
    /// Snapshot the classifier last evaluated.
    last_text: String,
    /// Cleaned text that arrived while throttled.
    pending_text: String,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl Session {
    pub fn new(
        transport: Box<dyn MudTransport>,
        oracle: Box<dyn Oracle>,
        bus: EventBus,
        config: SessionConfig,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        info!(oracle = %oracle.describe(), "session created");
        Self {
            transport,
            oracle,
            bus,
            throttle: InvocationThrottle::new(config.min_interval),
            validator: CommandValidator::new(LoopDetector::new(config.loop_repeat_threshold)),
            config,
            tracker: Arc::new(Mutex::new(StateTracker::new())),
            classifier: ChangeClassifier::new(),
            usage: UsageMeter::default(),
            history: String::new(),
            last_text: String::new(),
            pending_text: String::new(),
            paused: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            control_tx,
            control_rx,
        }
    }

    /// A remote control for this session.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            control: self.control_tx.clone(),
            paused: Arc::clone(&self.paused),
            shutdown: Arc::clone(&self.shutdown),
            tracker: Arc::clone(&self.tracker),
        }
    }

    pub fn usage(&self) -> UsageMeter {
        self.usage
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------------
    // Main loop
    // -------------------------------------------------------------------------

    /// Drive the session until shutdown or transport loss.
    ///
    /// # Errors
    ///
    /// [`MudError::Transport`] when the connection fails or the server closes
    /// it.  The failure is also reported on the event bus.
    pub async fn run(&mut self) -> Result<(), MudError> {
        info!("session loop started");
        loop {
            self.drain_control().await?;

            if self.shutdown.load(Ordering::Acquire) {
                info!(
                    calls = self.usage.calls,
                    tokens = self.usage.total_tokens(),
                    "session shutting down"
                );
                if let Err(e) = self.transport.close().await {
                    warn!(error = %e, "transport close failed");
                }
                return Ok(());
            }

            let outcome = match self.transport.read_chunk(self.config.read_timeout).await {
                Ok(ReadOutcome::Data(raw)) => self.ingest_at(&raw, Instant::now()).await?,
                Ok(ReadOutcome::Timeout) => self.on_idle(Instant::now()).await?,
                Ok(ReadOutcome::Eof) => {
                    return Err(self.fail(MudError::Transport("connection closed by server".into())));
                }
                Err(e) => return Err(self.fail(e)),
            };
            if let Some(outcome) = outcome {
                debug!(?outcome, "cycle finished");
            }
        }
    }

    /// Feed one chunk of raw server text through the pipeline.
    pub async fn ingest(&mut self, raw: &str) -> Result<CycleOutcome, MudError> {
        Ok(self
            .ingest_at(raw, Instant::now())
            .await?
            .unwrap_or(CycleOutcome::NoNewInfo))
    }

    /// Ask the oracle for a command and push it through the validator,
    /// skipping the throttle and classifier.
    pub async fn decide(&mut self) -> Result<CycleOutcome, MudError> {
        if self.is_paused() {
            return Ok(CycleOutcome::Paused);
        }
        self.decide_at(Instant::now()).await
    }

    // -------------------------------------------------------------------------
    // Pipeline stages
    // -------------------------------------------------------------------------

    async fn ingest_at(&mut self, raw: &str, now: Instant) -> Result<Option<CycleOutcome>, MudError> {
        if raw.is_empty() {
            return Ok(None);
        }
        self.emit(EventPayload::GameText(raw.to_string()));

        // ── Observe ───────────────────────────────────────────────────────────
        let cleaned = clean_text(raw);
        self.push_history(&cleaned);
        let changes = self.tracker.lock().await.update(&cleaned);

        if self.is_paused() {
            return Ok(Some(CycleOutcome::Paused));
        }

        // ── Throttle ──────────────────────────────────────────────────────────
        if self.throttle.admit(changes, now) == Admission::Buffered {
            self.pending_text.push_str(&cleaned);
            return Ok(Some(CycleOutcome::Throttled));
        }

        // This cycle carries the buffered text, so the buffered change sets
        // are consumed with it whatever the classifier decides.
        self.throttle.take_pending();
        let mut text = std::mem::take(&mut self.pending_text);
        text.push_str(&cleaned);
        self.evaluate(text, now).await.map(Some)
    }

    /// Flush buffered text once the throttle window has passed with no new
    /// input.
    async fn on_idle(&mut self, now: Instant) -> Result<Option<CycleOutcome>, MudError> {
        if self.is_paused() || !self.throttle.has_pending() || self.throttle.should_buffer(now) {
            return Ok(None);
        }
        debug!(buffered = self.throttle.pending().len(), "flushing throttled changes");
        self.throttle.take_pending();
        let text = std::mem::take(&mut self.pending_text);
        self.evaluate(text, now).await.map(Some)
    }

    async fn evaluate(&mut self, text: String, now: Instant) -> Result<CycleOutcome, MudError> {
        // An empty flush must not erase the classifier's snapshot.
        if text.is_empty() {
            return Ok(CycleOutcome::NoNewInfo);
        }

        // ── Classify ──────────────────────────────────────────────────────────
        let verdict = self.classifier.classify(&text, &self.last_text);
        self.last_text = text;
        if !verdict.should_respond() {
            return Ok(CycleOutcome::NoNewInfo);
        }
        debug!(?verdict, "classifier requests a decision");
        self.decide_at(now).await
    }

    async fn decide_at(&mut self, now: Instant) -> Result<CycleOutcome, MudError> {
        // ── Decide ────────────────────────────────────────────────────────────
        let context = Self::build_context(&self.tracker, &self.history).await;
        let proposal = propose_with_retry(
            self.oracle.as_ref(),
            &self.config.retry,
            &self.config.system_prompt,
            &context,
            &mut self.usage,
        )
        .await;

        // Pause may have been requested while the call was in flight.
        if self.is_paused() {
            if let Some(proposal) = &proposal {
                info!(command = %proposal.command, "paused during oracle call; proposal dropped");
            }
            self.emit(EventPayload::Notice(
                "autonomous play paused; oracle proposal discarded".into(),
            ));
            return Ok(CycleOutcome::Paused);
        }

        let Some(proposal) = proposal else {
            self.emit(EventPayload::Notice(
                "oracle gave no usable command; waiting for the next change".into(),
            ));
            return Ok(CycleOutcome::NoProposal);
        };
        self.throttle.commit(now);

        // ── Gatekeep ──────────────────────────────────────────────────────────
        let validated = {
            let tracker = self.tracker.lock().await;
            self.validator.validate(&proposal.command, tracker.state())
        };
        let Some(validated) = validated else {
            self.emit(EventPayload::Override {
                original: proposal.command,
                replacement: None,
                reason: "empty proposal".into(),
            });
            return Ok(CycleOutcome::Suppressed);
        };

        // ── Act ───────────────────────────────────────────────────────────────
        self.dispatch(&proposal.command, validated).await
    }

    async fn dispatch(&mut self, original: &str, validated: Validated) -> Result<CycleOutcome, MudError> {
        if let Some(reason) = &validated.rewrite {
            info!(original, replacement = %validated.command, %reason, "validator override");
            self.emit(EventPayload::Override {
                original: original.to_string(),
                replacement: Some(validated.command.clone()),
                reason: reason.to_string(),
            });
        }

        if let Err(e) = self.transport.send_line(&validated.command).await {
            return Err(self.fail(e));
        }
        self.tracker.lock().await.record_command(&validated.command);
        info!(command = %validated.command, "command dispatched");
        self.emit(EventPayload::Decision(validated.command.clone()));
        Ok(CycleOutcome::Dispatched(validated.command))
    }

    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------

    async fn drain_control(&mut self) -> Result<(), MudError> {
        while let Ok(control) = self.control_rx.try_recv() {
            match control {
                Control::Inject(command) => {
                    self.inject(&command).await?;
                }
                Control::Pause => {
                    self.paused.store(true, Ordering::Release);
                    info!("autonomous play paused");
                    self.emit(EventPayload::ModeToggle { paused: true });
                }
                Control::Resume => {
                    self.paused.store(false, Ordering::Release);
                    self.reset_memory();
                    info!("autonomous play resumed");
                    self.emit(EventPayload::ModeToggle { paused: false });
                }
                Control::Reset => {
                    self.reset_memory();
                    self.emit(EventPayload::Notice("throttle and classifier memory reset".into()));
                }
                Control::Shutdown => {
                    self.shutdown.store(true, Ordering::Release);
                }
            }
        }
        Ok(())
    }

    /// Validate and send a manual command.
    pub async fn inject(&mut self, command: &str) -> Result<CycleOutcome, MudError> {
        let validated = {
            let tracker = self.tracker.lock().await;
            self.validator.validate(command, tracker.state())
        };
        let Some(validated) = validated else {
            return Ok(CycleOutcome::Suppressed);
        };
        self.emit(EventPayload::Notice(format!("manual command: {command}")));
        self.dispatch(command, validated).await
    }

    /// Guarantee the next real delta gets a fresh evaluation.
    fn reset_memory(&mut self) {
        self.throttle.reset();
        self.last_text.clear();
        self.pending_text.clear();
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Oracle context: trailing text window, world summary, previous command.
    ///
    /// Takes its parts explicitly so the returned future never borrows the
    /// whole session.
    async fn build_context(tracker: &Mutex<StateTracker>, history: &str) -> String {
        let (summary, last_command) = {
            let tracker = tracker.lock().await;
            let state = tracker.state();
            (
                state.summary(),
                state.last_command().unwrap_or("(none)").to_string(),
            )
        };
        format!(
            "Current game state:\n{history}\n\nWorld summary:\n{summary}\n\nPrevious action taken:\n{last_command}"
        )
    }

    fn push_history(&mut self, cleaned: &str) {
        self.history.push_str(cleaned);
        let keep_from = trailing_window_start(&self.history, self.config.context_chars);
        if keep_from > 0 {
            self.history.drain(..keep_from);
        }
    }

    /// Best-effort publish; a missing sink never stops play.
    fn emit(&self, payload: EventPayload) {
        if let Err(e) = self.bus.emit(SOURCE, payload) {
            debug!(error = %e, "event dropped");
        }
    }

    fn fail(&self, error: MudError) -> MudError {
        warn!(error = %error, "session ending on transport failure");
        self.emit(EventPayload::Fault(error.to_string()));
        error
    }
}

/// Byte offset where the last `max_chars` characters of `text` begin.
fn trailing_window_start(text: &str, max_chars: usize) -> usize {
    if max_chars == 0 {
        return text.len();
    }
    text.char_indices()
        .rev()
        .nth(max_chars - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}
