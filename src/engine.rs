use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::{AsrResult, SpeechErrorMessage};

pub type ResultCallback = Box<dyn Fn(AsrResult) + Send>;
pub type ErrorCallback = Box<dyn Fn(SpeechErrorMessage) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineInitError {
    #[error("no speech engine is installed on this device")]
    NotInstalled,
    #[error("speech engine is unavailable")]
    Unavailable,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    pub auto_stop: bool,
    pub show_punctuation: bool,
    pub max_duration_ms: u32,
}

/// Platform speech recognizer.
///
/// The two callback slots are process-wide on real engines: registering from a
/// second controller silently replaces the first one's callbacks, so only one
/// controller may own an engine at a time.
pub trait SpeechEngine: Send {
    fn init_engine(&mut self) -> Result<(), EngineInitError>;
    fn start(&mut self, options: StartOptions) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn set_result_callback(&mut self, callback: Option<ResultCallback>);
    fn set_error_callback(&mut self, callback: Option<ErrorCallback>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Init,
    Start(StartOptions),
    Stop,
    SetResultCallback { registered: bool },
    SetErrorCallback { registered: bool },
}

#[derive(Default)]
struct SimulatedInner {
    init_outcomes: VecDeque<Result<(), EngineInitError>>,
    start_failures: u32,
    calls: Vec<EngineCall>,
    result_callback: Option<ResultCallback>,
    error_callback: Option<ErrorCallback>,
    active: Option<StartOptions>,
}

/// In-process engine used by the simulator and tests.
///
/// Clones share state, so a test can keep one handle to drive callbacks and
/// inspect calls while the controller owns another.
#[derive(Clone, Default)]
pub struct SimulatedEngine {
    inner: Arc<Mutex<SimulatedInner>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue the outcome of the next `init_engine` call. Unqueued calls succeed.
    pub fn queue_init_outcome(&self, outcome: Result<(), EngineInitError>) {
        self.lock().init_outcomes.push_back(outcome);
    }

    pub fn fail_next_starts(&self, count: u32) {
        self.lock().start_failures = count;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn start_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Start(_)))
            .count()
    }

    pub fn stop_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Stop))
            .count()
    }

    pub fn is_session_active(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn has_callbacks(&self) -> bool {
        let inner = self.lock();
        inner.result_callback.is_some() && inner.error_callback.is_some()
    }

    /// Deliver a recognition result. Returns false when no callback is registered.
    pub fn emit_result(&self, text: &str, is_final: bool) -> bool {
        let mut inner = self.lock();
        if is_final && inner.active.is_some_and(|options| options.auto_stop) {
            inner.active = None;
        }
        let Some(callback) = inner.result_callback.as_ref() else {
            return false;
        };
        callback(AsrResult {
            text: text.to_string(),
            is_final,
            is_error: false,
            error_message: None,
        });
        true
    }

    pub fn emit_result_error(&self, message: &str) -> bool {
        let inner = self.lock();
        let Some(callback) = inner.result_callback.as_ref() else {
            return false;
        };
        callback(AsrResult {
            text: String::new(),
            is_final: false,
            is_error: true,
            error_message: Some(message.to_string()),
        });
        true
    }

    pub fn emit_error(&self, code: i32, message: &str) -> bool {
        let mut inner = self.lock();
        inner.active = None;
        let Some(callback) = inner.error_callback.as_ref() else {
            return false;
        };
        callback(SpeechErrorMessage {
            code,
            message: message.to_string(),
            session_id: Some(format!("sim-{}", inner.calls.len())),
        });
        true
    }
}

impl SpeechEngine for SimulatedEngine {
    fn init_engine(&mut self) -> Result<(), EngineInitError> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::Init);
        inner.init_outcomes.pop_front().unwrap_or(Ok(()))
    }

    fn start(&mut self, options: StartOptions) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::Start(options));
        if inner.start_failures > 0 {
            inner.start_failures -= 1;
            anyhow::bail!("simulated engine refused to start");
        }
        inner.active = Some(options);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::Stop);
        inner.active = None;
        Ok(())
    }

    fn set_result_callback(&mut self, callback: Option<ResultCallback>) {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::SetResultCallback {
            registered: callback.is_some(),
        });
        inner.result_callback = callback;
    }

    fn set_error_callback(&mut self, callback: Option<ErrorCallback>) {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::SetErrorCallback {
            registered: callback.is_some(),
        });
        inner.error_callback = callback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn final_result_ends_auto_stop_session() {
        let mut engine = SimulatedEngine::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        engine.set_result_callback(Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        engine
            .start(StartOptions {
                auto_stop: true,
                show_punctuation: true,
                max_duration_ms: 1_000,
            })
            .expect("start");

        assert!(engine.emit_result("隐藏", true));
        assert!(!engine.is_session_active());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emits_nothing_without_callbacks() {
        let engine = SimulatedEngine::new();
        assert!(!engine.emit_result("显示", true));
        assert!(!engine.emit_error(1014, "silence"));
    }

    #[test]
    fn queued_init_outcomes_are_consumed_in_order() {
        let mut engine = SimulatedEngine::new();
        engine.queue_init_outcome(Err(EngineInitError::Unavailable));
        assert_eq!(engine.init_engine(), Err(EngineInitError::Unavailable));
        assert_eq!(engine.init_engine(), Ok(()));
        assert_eq!(engine.calls(), vec![EngineCall::Init, EngineCall::Init]);
    }
}
