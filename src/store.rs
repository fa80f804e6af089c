use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::settings::VoiceSettings;

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<VoiceSettings> {
        if !self.path.exists() {
            return Ok(VoiceSettings::default());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading settings file {}", self.path.display()))?;
        let settings: VoiceSettings =
            serde_json::from_str(&raw).context("failed parsing settings json")?;
        settings
            .validate()
            .with_context(|| format!("invalid settings in {}", self.path.display()))?;
        Ok(settings)
    }

    /// Invalid settings are refused, and the file is replaced via rename so a
    /// crash mid-write never leaves a truncated config behind.
    pub fn save(&self, settings: &VoiceSettings) -> Result<()> {
        settings.validate().context("refusing to save invalid settings")?;
        let Some(parent) = self.path.parent() else {
            anyhow::bail!("settings path has no parent")
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;

        let content = serde_json::to_string_pretty(settings)?;
        let staging = self.staging_path();
        fs::write(&staging, content)
            .with_context(|| format!("failed writing {}", staging.display()))?;
        fs::rename(&staging, &self.path).with_context(|| {
            format!("failed replacing settings file {}", self.path.display())
        })?;
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing() {
        let tmp = std::env::temp_dir().join("voice-session-settings-missing.json");
        let _ = std::fs::remove_file(&tmp);
        let store = SettingsStore::new(tmp);
        let settings = store.load().expect("load defaults");
        assert!(settings.auto_stop);
        assert_eq!(settings.max_duration_ms, 60_000);
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let tmp = std::env::temp_dir()
            .join("voice-session-store-test")
            .join("settings.json");
        let store = SettingsStore::new(tmp.clone());
        let settings = VoiceSettings {
            auto_stop: false,
            max_duration_ms: 10_000,
            ..VoiceSettings::default()
        };
        store.save(&settings).expect("save");
        assert_eq!(store.load().expect("load"), settings);
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let tmp = std::env::temp_dir().join("voice-session-settings-invalid.json");
        std::fs::write(&tmp, r#"{"max_duration_ms": 0}"#).expect("write");
        let store = SettingsStore::new(tmp.clone());
        assert!(store.load().is_err());
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn invalid_settings_are_not_written() {
        let dir = std::env::temp_dir().join("voice-session-store-reject");
        let path = dir.join("settings.json");
        let store = SettingsStore::new(path.clone());
        store.save(&VoiceSettings::default()).expect("save defaults");

        let broken = VoiceSettings {
            max_duration_ms: 0,
            ..VoiceSettings::default()
        };
        assert!(store.save(&broken).is_err());
        assert_eq!(store.load().expect("load"), VoiceSettings::default());
        assert!(!dir.join("settings.json.tmp").exists());
        let _ = std::fs::remove_file(&path);
    }
}
