use std::sync::{Arc, Mutex, MutexGuard};

/// The single advisory text surface (status line or debug label).
pub trait StatusSink: Send {
    fn show(&mut self, message: &str);

    /// Live, non-final transcript. Advisory only.
    fn transcript(&mut self, _text: &str) {}
}

#[derive(Debug, Default)]
struct StatusLogInner {
    messages: Vec<String>,
    transcript: String,
}

/// Sink that records everything shown. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct StatusLog {
    inner: Arc<Mutex<StatusLogInner>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatusLogInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn transcript_text(&self) -> String {
        self.lock().transcript.clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lock().messages.iter().any(|m| m.contains(needle))
    }
}

impl StatusSink for StatusLog {
    fn show(&mut self, message: &str) {
        self.lock().messages.push(message.to_string());
    }

    fn transcript(&mut self, text: &str) {
        self.lock().transcript = text.to_string();
    }
}
