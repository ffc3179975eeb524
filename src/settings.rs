use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::timer::{TimerConfig, TimerMode};

pub const DEBUG_ENV: &str = "STUDYFOCUS_DEBUG";
pub const API_URL_ENV: &str = "STUDYFOCUS_API_URL";
pub const API_TOKEN_ENV: &str = "STUDYFOCUS_API_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TimerSettings {
    pub milestone_minutes: u64,
    pub autosave_seconds: u64,
    pub heartbeat_every_ticks: u32,
    pub final_flush_timeout_seconds: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            milestone_minutes: 5,
            autosave_seconds: 30,
            heartbeat_every_ticks: 10,
            final_flush_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PomodoroSettings {
    pub work_minutes: u32,
    pub break_minutes: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
        }
    }
}

/// Where sessions go. No API URL means the local database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncSettings {
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChimeSettings {
    pub enabled: bool,
    pub volume: f32,
}

impl Default for ChimeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub timer: TimerSettings,
    pub pomodoro: PomodoroSettings,
    pub sync: SyncSettings,
    pub chime: ChimeSettings,
    #[serde(skip)]
    pub debug: bool,
}

impl UserSettings {
    /// Apply `STUDYFOCUS_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.debug = lookup(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.sync.api_base_url = Some(url);
        }
        if let Some(token) = lookup(API_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.sync.api_token = Some(token);
        }
    }

    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            tick_interval: Duration::from_secs(1),
            milestone_every_secs: self.timer.milestone_minutes.max(1) * 60,
            autosave_interval: Duration::from_secs(self.timer.autosave_seconds.max(1)),
            heartbeat_every_ticks: if self.debug {
                1
            } else {
                self.timer.heartbeat_every_ticks.max(1)
            },
            final_flush_timeout: Duration::from_secs(self.timer.final_flush_timeout_seconds.max(1)),
        }
    }

    pub fn pomodoro_mode(&self) -> TimerMode {
        TimerMode::Pomodoro {
            work_minutes: self.pomodoro.work_minutes.max(1),
            break_minutes: self.pomodoro.break_minutes.max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_seconds.max(1))
    }
}

/// `settings.json` in the data directory, read once at startup.
pub struct SettingsStore {
    data: UserSettings,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings in {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self { data })
    }

    /// Settings with environment overrides applied.
    pub fn resolved(&self) -> UserSettings {
        let mut settings = self.get();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    pub fn get(&self) -> UserSettings {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), UserSettings::default());
        assert_eq!(store.get().timer_config().milestone_every_secs, 300);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"pomodoro": {"workMinutes": 50}}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.pomodoro.work_minutes, 50);
        assert_eq!(settings.pomodoro.break_minutes, 5);
        assert_eq!(settings.timer.autosave_seconds, 30);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(SettingsStore::new(path).unwrap().get(), UserSettings::default());
    }

    #[test]
    fn chime_preferences_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"chime": {"enabled": false, "volume": 0.2}}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert!(!settings.chime.enabled);
        assert!((settings.chime.volume - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn env_overrides_sync_target_and_debug() {
        let mut settings = UserSettings::default();
        settings.apply_env(|key| match key {
            DEBUG_ENV => Some("true".into()),
            API_URL_ENV => Some("https://study.example".into()),
            _ => None,
        });

        assert!(settings.debug);
        assert_eq!(settings.timer_config().heartbeat_every_ticks, 1);
        assert_eq!(
            settings.sync.api_base_url.as_deref(),
            Some("https://study.example")
        );
        assert!(settings.sync.api_token.is_none());
    }
}
