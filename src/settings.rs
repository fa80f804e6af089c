use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("max_duration_ms must be greater than zero")]
    ZeroMaxDuration,
    #[error("restart.max_restarts must be greater than zero")]
    ZeroRestartBudget,
    #[error("restart.window_ms must be greater than zero")]
    ZeroRestartWindow,
    #[error("restart.backoff_base_ms ({base}) exceeds restart.backoff_max_ms ({max})")]
    BackoffOrder { base: u64, max: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub immediate_restarts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub max_restarts: u32,
    pub window_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            immediate_restarts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            max_restarts: 10,
            window_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// End each engine session after one final result and restart explicitly.
    pub auto_stop: bool,
    pub max_duration_ms: u32,
    /// Platform shows a runtime microphone permission dialog.
    pub permission_gated: bool,
    pub restart: RestartPolicy,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            auto_stop: true,
            max_duration_ms: 60_000,
            permission_gated: true,
            restart: RestartPolicy::default(),
        }
    }
}

impl VoiceSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_duration_ms == 0 {
            return Err(SettingsError::ZeroMaxDuration);
        }
        if self.restart.max_restarts == 0 {
            return Err(SettingsError::ZeroRestartBudget);
        }
        if self.restart.window_ms == 0 {
            return Err(SettingsError::ZeroRestartWindow);
        }
        if self.restart.backoff_base_ms > self.restart.backoff_max_ms {
            return Err(SettingsError::BackoffOrder {
                base: self.restart.backoff_base_ms,
                max: self.restart.backoff_max_ms,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: VoiceSettings =
            serde_json::from_str(r#"{"auto_stop": false, "restart": {"max_restarts": 4}}"#)
                .expect("parse");
        assert!(!settings.auto_stop);
        assert_eq!(settings.max_duration_ms, 60_000);
        assert_eq!(settings.restart.max_restarts, 4);
        assert_eq!(settings.restart.window_ms, 60_000);
    }

    #[test]
    fn rejects_inverted_backoff() {
        let mut settings = VoiceSettings::default();
        settings.restart.backoff_base_ms = 10_000;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::BackoffOrder {
                base: 10_000,
                max: 8_000
            })
        );
    }
}
