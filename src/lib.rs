//! Voice-command session core: microphone permission, recognizer lifecycle,
//! bounded recovery, and keyword dispatch onto a scene object.

pub mod dispatch;
pub mod engine;
pub mod model;
pub mod permission;
pub mod replay;
pub mod retry;
pub mod settings;
pub mod state_machine;
pub mod status;
pub mod store;
pub mod target;

pub use dispatch::{Action, Color, CommandDispatcher};
pub use engine::{SimulatedEngine, SpeechEngine};
pub use model::{EngineEvent, SessionPhase, SessionState};
pub use settings::VoiceSettings;
pub use state_machine::SpeechSessionController;
