use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Unknown,
    Requested,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Where the controller sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    PermissionPending,
    EngineInitializing,
    Listening,
    Recovering,
    Fatal,
}

impl SessionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::PermissionPending => "Waiting for permission",
            SessionPhase::EngineInitializing => "Initializing",
            SessionPhase::Listening => "Listening",
            SessionPhase::Recovering => "Recovering",
            SessionPhase::Fatal => "Stopped",
        }
    }
}

/// Snapshot of the controller's session bookkeeping.
///
/// `listening == true` implies `engine_status == Ready` and `permission == Granted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub permission: PermissionState,
    pub engine_status: EngineStatus,
    pub listening: bool,
    pub auto_stop: bool,
    pub max_duration_ms: u32,
}

/// Raw result payload as delivered by the engine's result slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsrResult {
    pub text: String,
    pub is_final: bool,
    pub is_error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Raw payload from the engine's error slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechErrorMessage {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechError {
    pub code: Option<i32>,
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PartialResult(String),
    FinalResult(String),
    Error(SpeechError),
}

impl From<AsrResult> for EngineEvent {
    fn from(result: AsrResult) -> Self {
        if result.is_error {
            let message = result
                .error_message
                .unwrap_or_else(|| "recognition result reported an error".to_string());
            return EngineEvent::Error(SpeechError {
                code: None,
                message,
                session_id: None,
            });
        }
        if result.is_final {
            EngineEvent::FinalResult(result.text)
        } else {
            EngineEvent::PartialResult(result.text)
        }
    }
}

impl From<SpeechErrorMessage> for EngineEvent {
    fn from(msg: SpeechErrorMessage) -> Self {
        EngineEvent::Error(SpeechError {
            code: Some(msg.code),
            message: msg.message,
            session_id: msg.session_id,
        })
    }
}

pub const PERMISSION_REVOKED_CODE: i32 = -402;
pub const NO_SPEECH_CODE: i32 = 1014;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    PermissionRevoked,
    NoSpeech,
    Unknown,
}

impl ErrorClass {
    pub fn classify(code: Option<i32>) -> Self {
        match code {
            Some(PERMISSION_REVOKED_CODE) => ErrorClass::PermissionRevoked,
            Some(NO_SPEECH_CODE) => ErrorClass::NoSpeech,
            _ => ErrorClass::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn result_payloads_become_tagged_events() {
        let partial = AsrResult {
            text: "显".into(),
            ..Default::default()
        };
        assert_eq!(EngineEvent::from(partial), EngineEvent::PartialResult("显".into()));

        let failed = AsrResult {
            text: "ignored".into(),
            is_final: true,
            is_error: true,
            error_message: Some("decoder crashed".into()),
        };
        assert_eq!(
            EngineEvent::from(failed),
            EngineEvent::Error(SpeechError {
                code: None,
                message: "decoder crashed".into(),
                session_id: None,
            })
        );
    }

    #[test]
    fn error_codes_fall_into_three_buckets() {
        assert_eq!(ErrorClass::classify(Some(-402)), ErrorClass::PermissionRevoked);
        assert_eq!(ErrorClass::classify(Some(1014)), ErrorClass::NoSpeech);
        assert_eq!(ErrorClass::classify(Some(7)), ErrorClass::Unknown);
        assert_eq!(ErrorClass::classify(None), ErrorClass::Unknown);
    }
}
