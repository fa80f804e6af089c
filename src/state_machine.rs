use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::{
    dispatch::{normalize, Action, CommandDispatcher},
    engine::{SpeechEngine, StartOptions},
    model::{
        EngineEvent, EngineStatus, ErrorClass, PermissionState, SessionPhase, SessionState,
        SpeechError,
    },
    permission::{Permission, PermissionGate, PermissionProvider},
    retry::{RestartBudget, RestartDecision},
    settings::VoiceSettings,
    status::StatusSink,
    target::InteractiveTargetAdapter,
};

/// Drives permission, engine init, and listening sessions for one engine.
///
/// Everything runs on the caller's control thread. Engine callbacks only
/// enqueue [`EngineEvent`]s; they are processed in [`tick`](Self::tick).
/// The engine's callback slots are global, so keep a single controller per
/// engine.
pub struct SpeechSessionController {
    settings: VoiceSettings,
    phase: SessionPhase,
    engine_status: EngineStatus,
    listening: bool,
    gate: PermissionGate,
    engine: Box<dyn SpeechEngine>,
    permissions: Box<dyn PermissionProvider>,
    dispatcher: CommandDispatcher,
    target: InteractiveTargetAdapter,
    status: Box<dyn StatusSink>,
    restarts: RestartBudget,
    pending_restart: Option<Instant>,
    /// Control-thread clock as of the last `tick` or `handle_event`.
    now: Instant,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
    callbacks_alive: Option<Arc<AtomicBool>>,
    enabled: bool,
    destroyed: bool,
    live_transcript: String,
    last_action: Option<Action>,
    last_status: Option<String>,
}

impl SpeechSessionController {
    pub fn new(
        engine: Box<dyn SpeechEngine>,
        permissions: Box<dyn PermissionProvider>,
        target: InteractiveTargetAdapter,
        status: Box<dyn StatusSink>,
        settings: VoiceSettings,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            gate: PermissionGate::new(settings.permission_gated),
            restarts: RestartBudget::new(settings.restart),
            settings,
            phase: SessionPhase::Idle,
            engine_status: EngineStatus::Uninitialized,
            listening: false,
            engine,
            permissions,
            dispatcher: CommandDispatcher::default(),
            target,
            status,
            pending_restart: None,
            now: Instant::now(),
            events_tx,
            events_rx,
            callbacks_alive: None,
            enabled: false,
            destroyed: false,
            live_transcript: String::new(),
            last_action: None,
            last_status: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: CommandDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            permission: self.gate.state(),
            engine_status: self.engine_status,
            listening: self.listening,
            auto_stop: self.settings.auto_stop,
            max_duration_ms: self.settings.max_duration_ms,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn live_transcript(&self) -> &str {
        &self.live_transcript
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    pub fn has_pending_restart(&self) -> bool {
        self.pending_restart.is_some()
    }

    pub fn enable(&mut self) {
        if self.destroyed {
            warn!("enable ignored: controller destroyed");
            return;
        }
        if self.enabled {
            return;
        }
        self.enabled = true;
        debug!("controller enabled");
        if self.engine_status == EngineStatus::Ready {
            self.register_callbacks();
            self.start_session();
        }
    }

    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        // Slots must be empty before stop, the engine may report on stop.
        self.clear_callbacks();
        self.discard_queued_events();
        self.pending_restart = None;
        self.stop_session();
        self.enabled = false;
        self.phase = SessionPhase::Idle;
        debug!("controller disabled");
    }

    /// Final teardown. Runs once; later calls and `Drop` are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if self.callbacks_alive.is_some() {
            self.clear_callbacks();
        }
        self.discard_queued_events();
        self.pending_restart = None;
        self.stop_session();
        self.enabled = false;
        self.phase = SessionPhase::Idle;
        debug!("controller destroyed");
    }

    pub fn request_permission(&mut self) {
        if self.destroyed || !self.enabled {
            debug!("permission request ignored while inactive");
            return;
        }
        self.phase = SessionPhase::PermissionPending;
        match self.gate.request(self.permissions.as_mut()) {
            PermissionState::Granted => self.on_permission_granted(),
            PermissionState::Requested => self.notify("Waiting for microphone permission..."),
            other => debug!(state = ?other, "permission request left gate unresolved"),
        }
    }

    /// Call when the app regains focus; this is where a pending permission
    /// dialog is resolved.
    pub fn on_application_focus(&mut self, focused: bool) {
        if !focused || self.destroyed || !self.enabled || !self.gate.is_pending() {
            return;
        }
        let granted = self.permissions.has_permission(Permission::Microphone);
        match self.gate.on_resolved(granted) {
            Some(PermissionState::Granted) => self.on_permission_granted(),
            Some(PermissionState::Denied) => {
                self.phase = SessionPhase::Idle;
                self.notify("Microphone permission denied!");
            }
            _ => {}
        }
    }

    fn on_permission_granted(&mut self) {
        match self.engine_status {
            EngineStatus::Ready => self.start_session(),
            EngineStatus::Uninitialized => self.initialize(),
            EngineStatus::Initializing => {}
            EngineStatus::Failed => {
                self.phase = SessionPhase::Fatal;
                self.notify("Speech engine is not initialized. Retry to try again.");
            }
        }
    }

    pub fn initialize(&mut self) {
        if self.destroyed || !self.enabled {
            return;
        }
        match self.engine_status {
            EngineStatus::Ready => {
                debug!("engine already initialized, skipping");
                return;
            }
            EngineStatus::Initializing => return,
            EngineStatus::Failed => {
                debug!("engine init previously failed; waiting for explicit retry");
                return;
            }
            EngineStatus::Uninitialized => {}
        }
        if self.gate.state() != PermissionState::Granted {
            warn!(permission = ?self.gate.state(), "cannot initialize engine without permission");
            return;
        }

        self.phase = SessionPhase::EngineInitializing;
        self.engine_status = EngineStatus::Initializing;
        self.register_callbacks();

        match self.engine.init_engine() {
            Ok(()) => {
                self.engine_status = EngineStatus::Ready;
                info!("speech engine ready");
                self.notify("Ready: say a command");
                self.start_session();
            }
            Err(err) => {
                self.engine_status = EngineStatus::Failed;
                self.clear_callbacks();
                self.phase = SessionPhase::Fatal;
                warn!(error = %err, "speech engine init failed");
                self.notify(format!("Initialization failed: {err}"));
            }
        }
    }

    pub fn start_session(&mut self) {
        if self.listening {
            debug!("session already active");
            return;
        }
        if self.destroyed
            || !self.enabled
            || self.engine_status != EngineStatus::Ready
            || self.gate.state() != PermissionState::Granted
        {
            debug!(
                engine = ?self.engine_status,
                permission = ?self.gate.state(),
                enabled = self.enabled,
                "session start skipped"
            );
            return;
        }

        let options = StartOptions {
            auto_stop: self.settings.auto_stop,
            show_punctuation: true,
            max_duration_ms: self.settings.max_duration_ms,
        };
        match self.engine.start(options) {
            Ok(()) => {
                self.listening = true;
                self.phase = SessionPhase::Listening;
                self.pending_restart = None;
                info!(?options, "listening session started");
            }
            Err(err) => {
                warn!(error = %err, "engine refused to start session");
                self.restart_after_error(self.now);
            }
        }
    }

    pub fn stop_session(&mut self) {
        if self.engine_status != EngineStatus::Ready {
            return;
        }
        if let Err(err) = self.engine.stop() {
            warn!(error = %err, "engine stop failed");
        }
        self.listening = false;
        debug!("listening session stopped");
    }

    /// Explicit recovery entry point after denial, init failure, or an
    /// exhausted restart budget.
    pub fn retry(&mut self) {
        if self.destroyed || !self.enabled {
            return;
        }
        info!(phase = ?self.phase, "explicit retry");
        self.restarts.reset();
        self.pending_restart = None;

        if self.gate.state() != PermissionState::Granted {
            self.request_permission();
            return;
        }
        match self.engine_status {
            EngineStatus::Failed => {
                self.engine_status = EngineStatus::Uninitialized;
                self.initialize();
            }
            EngineStatus::Uninitialized => self.initialize(),
            EngineStatus::Ready => self.start_session(),
            EngineStatus::Initializing => {}
        }
    }

    /// Process queued engine callbacks and fire a due delayed restart.
    pub fn tick(&mut self, now: Instant) {
        if self.destroyed {
            return;
        }
        self.now = now;
        let events: Vec<EngineEvent> = self.events_rx.try_iter().collect();
        for event in events {
            self.handle_event(event, now);
        }
        if let Some(due) = self.pending_restart {
            if now >= due {
                self.pending_restart = None;
                self.start_session();
            }
        }
    }

    pub fn update(&mut self) {
        self.tick(Instant::now());
    }

    pub fn handle_event(&mut self, event: EngineEvent, now: Instant) {
        if self.destroyed || !self.enabled {
            debug!(?event, "dropping engine event after teardown");
            return;
        }
        self.now = now;
        match event {
            EngineEvent::PartialResult(text) => {
                self.status.transcript(&text);
                self.live_transcript = text;
            }
            EngineEvent::FinalResult(text) => self.on_final_result(&text),
            EngineEvent::Error(err) => self.on_error(err, now),
        }
    }

    fn on_final_result(&mut self, text: &str) {
        if self.settings.auto_stop {
            // The engine ends an auto-stop session on its own after a final result.
            self.listening = false;
        }
        self.live_transcript.clear();

        let command = normalize(text);
        if command.is_empty() {
            debug!("final result without speech");
        } else {
            self.notify(format!("Recognized: {command}"));
            self.restarts.reset();
            self.apply_command(&command);
        }

        if self.settings.auto_stop {
            self.start_session();
        }
    }

    fn apply_command(&mut self, command: &str) {
        let action = self.dispatcher.dispatch(command);
        self.last_action = Some(action);
        let outcome = match action {
            Action::SetVisible(visible) => self.target.set_visible(visible),
            Action::SetColor(color) => self.target.set_color(color),
            Action::NoOp => {
                info!(%command, "unrecognized command");
                return;
            }
        };
        match outcome {
            Ok(()) => info!(%command, ?action, "executed command"),
            Err(err) => {
                warn!(%command, error = %err, "command not applied");
                self.notify(format!("Error: {err}"));
            }
        }
    }

    fn on_error(&mut self, err: SpeechError, now: Instant) {
        let class = ErrorClass::classify(err.code);
        warn!(
            code = ?err.code,
            session = err.session_id.as_deref().unwrap_or("-"),
            ?class,
            message = %err.message,
            "speech error"
        );
        self.notify(format!("Speech error: {}", err.message));

        match class {
            ErrorClass::PermissionRevoked => {
                self.pending_restart = None;
                self.stop_session();
                self.gate.revoke();
                self.phase = SessionPhase::PermissionPending;
                match self.gate.request(self.permissions.as_mut()) {
                    // Platform still reports the grant; restart like any other session error.
                    PermissionState::Granted => self.restart_after_error(now),
                    PermissionState::Requested => {
                        self.notify("Waiting for microphone permission...")
                    }
                    other => debug!(state = ?other, "permission request left gate unresolved"),
                }
            }
            ErrorClass::NoSpeech => {
                self.notify("No speech detected, listening again...");
                self.restart_after_error(now);
            }
            ErrorClass::Unknown => {
                self.notify("Please go on, I'm listening.");
                self.restart_after_error(now);
            }
        }
    }

    fn restart_after_error(&mut self, now: Instant) {
        if self.engine_status != EngineStatus::Ready
            || self.gate.state() != PermissionState::Granted
        {
            debug!(
                engine = ?self.engine_status,
                permission = ?self.gate.state(),
                "no session to restart"
            );
            return;
        }
        self.phase = SessionPhase::Recovering;
        self.stop_session();
        match self.restarts.record(now) {
            RestartDecision::Immediate => self.start_session(),
            RestartDecision::After(delay) => {
                debug!(?delay, "session restart scheduled");
                self.pending_restart = Some(now + delay);
            }
            RestartDecision::Exhausted => {
                self.pending_restart = None;
                self.phase = SessionPhase::Fatal;
                warn!(
                    restarts = self.restarts.recent_restarts(),
                    "restart budget exhausted"
                );
                self.notify("Too many recognition errors; listening stopped. Retry to resume.");
            }
        }
    }

    fn register_callbacks(&mut self) {
        if let Some(previous) = self.callbacks_alive.take() {
            previous.store(false, Ordering::SeqCst);
        }
        let alive = Arc::new(AtomicBool::new(true));

        let tx = self.events_tx.clone();
        let live = Arc::clone(&alive);
        self.engine.set_result_callback(Some(Box::new(move |result| {
            if live.load(Ordering::SeqCst) {
                let _ = tx.send(EngineEvent::from(result));
            }
        })));

        let tx = self.events_tx.clone();
        let live = Arc::clone(&alive);
        self.engine.set_error_callback(Some(Box::new(move |error| {
            if live.load(Ordering::SeqCst) {
                let _ = tx.send(EngineEvent::from(error));
            }
        })));

        self.callbacks_alive = Some(alive);
    }

    fn clear_callbacks(&mut self) {
        if let Some(alive) = self.callbacks_alive.take() {
            alive.store(false, Ordering::SeqCst);
        }
        self.engine.set_result_callback(None);
        self.engine.set_error_callback(None);
    }

    fn discard_queued_events(&mut self) {
        let dropped = self.events_rx.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "discarded engine events queued before teardown");
        }
    }

    fn notify(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(status = %message);
        self.status.show(&message);
        self.last_status = Some(message);
    }
}

impl Drop for SpeechSessionController {
    fn drop(&mut self) {
        self.destroy();
    }
}
