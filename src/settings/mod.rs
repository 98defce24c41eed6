//! Application settings.
//!
//! Settings are a flat set of named options persisted one row per key, each
//! value JSON-encoded. Loading merges stored rows over the defaults key by
//! key: unknown keys are ignored and ill-typed values are skipped with a
//! warning, so one bad row never discards the rest.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::engine::CountdownDurations;
use crate::store::{SettingsStore, StoreError};
use crate::types::{CloseBehavior, Theme, TimerMode};

// ============================================================================
// Duration helpers
// ============================================================================

/// Converts a minutes + seconds pair to milliseconds. Negative results clamp to 0.
pub fn minutes_seconds_to_ms(minutes: i64, seconds: i64) -> i64 {
    ((minutes * 60 + seconds) * 1000).max(0)
}

/// Splits milliseconds into whole minutes and remaining seconds.
pub fn ms_to_minutes_seconds(ms: i64) -> (i64, i64) {
    let total_seconds = ms.max(0) / 1000;
    (total_seconds / 60, total_seconds % 60)
}

// ============================================================================
// SettingsError
// ============================================================================

/// Errors raised by [`SettingsManager`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The key is not a known setting.
    #[error("不明な設定キーです: {0}")]
    UnknownKey(String),

    /// The value does not fit the setting's type.
    #[error("設定値が不正です ({key}): {message}")]
    InvalidValue { key: String, message: String },

    /// Settings could not be encoded.
    #[error("設定のシリアライズに失敗しました: {0}")]
    Serialization(String),
}

impl SettingsError {
    /// Returns true if the error came from user input rather than storage.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::UnknownKey(_) | Self::InvalidValue { .. })
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Store(e) => e.suggestion(),
            Self::UnknownKey(_) => "settings show で利用可能なキーを確認してください",
            Self::InvalidValue { .. } => "値の型（数値・真偽値・文字列）を確認してください",
            Self::Serialization(_) => "アプリケーションを再起動してください",
        }
    }
}

// ============================================================================
// AppSettings
// ============================================================================

/// User preferences.
///
/// Field names are serialized in camelCase; these names are also the keys of
/// the persisted rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub timer_mode: TimerMode,

    // Countdown durations
    pub work_duration_minutes: i64,
    pub work_duration_seconds: i64,
    pub break_duration_minutes: i64,
    pub break_duration_seconds: i64,

    // Stopwatch
    pub stopwatch_break_minutes: i64,
    pub stopwatch_break_seconds: i64,
    pub stopwatch_reminder_enabled: bool,
    pub stopwatch_reminder_minutes: i64,
    pub stopwatch_reminder_seconds: i64,
    pub enable_stopwatch_reminder_sound: bool,

    // Sounds and notifications
    #[serde(rename = "enableworkSound")]
    pub enable_work_sound: bool,
    #[serde(rename = "enablerestSound")]
    pub enable_rest_sound: bool,
    pub enable_notification: bool,
    pub sound_volume: f64,

    pub close_behavior: CloseBehavior,

    // Floating window
    pub enable_floating_window: bool,
    pub floating_window_width: i64,
    pub floating_window_height: i64,
    pub floating_window_show_timer: bool,
    pub floating_window_show_state: bool,
    pub floating_window_x: Option<i64>,
    pub floating_window_y: Option<i64>,

    // Main window
    pub window_width: i64,
    pub window_height: i64,
    pub window_x: Option<i64>,
    pub window_y: Option<i64>,

    pub theme: Theme,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timer_mode: TimerMode::Countdown,
            work_duration_minutes: 25,
            work_duration_seconds: 0,
            break_duration_minutes: 5,
            break_duration_seconds: 0,
            stopwatch_break_minutes: 5,
            stopwatch_break_seconds: 0,
            stopwatch_reminder_enabled: false,
            stopwatch_reminder_minutes: 45,
            stopwatch_reminder_seconds: 0,
            enable_stopwatch_reminder_sound: true,
            enable_work_sound: true,
            enable_rest_sound: true,
            enable_notification: true,
            sound_volume: 0.5,
            close_behavior: CloseBehavior::Ask,
            enable_floating_window: true,
            floating_window_width: 150,
            floating_window_height: 50,
            floating_window_show_timer: true,
            floating_window_show_state: true,
            floating_window_x: None,
            floating_window_y: None,
            window_width: 450,
            window_height: 550,
            window_x: None,
            window_y: None,
            theme: Theme::Dark,
        }
    }
}

impl AppSettings {
    pub fn work_duration_ms(&self) -> i64 {
        minutes_seconds_to_ms(self.work_duration_minutes, self.work_duration_seconds)
    }

    pub fn break_duration_ms(&self) -> i64 {
        minutes_seconds_to_ms(self.break_duration_minutes, self.break_duration_seconds)
    }

    pub fn stopwatch_break_ms(&self) -> i64 {
        minutes_seconds_to_ms(self.stopwatch_break_minutes, self.stopwatch_break_seconds)
    }

    /// Reminder threshold, or `None` when the reminder is off or zero.
    pub fn stopwatch_reminder_ms(&self) -> Option<i64> {
        if !self.stopwatch_reminder_enabled {
            return None;
        }
        let ms = minutes_seconds_to_ms(
            self.stopwatch_reminder_minutes,
            self.stopwatch_reminder_seconds,
        );
        (ms > 0).then_some(ms)
    }

    pub fn countdown_durations(&self) -> CountdownDurations {
        CountdownDurations {
            work_ms: self.work_duration_ms(),
            break_ms: self.break_duration_ms(),
        }
    }

    /// Sound volume clamped to `0.0..=1.0`.
    pub fn volume(&self) -> f32 {
        self.sound_volume.clamp(0.0, 1.0) as f32
    }

    /// Returns every setting as a JSON object keyed by setting name.
    pub fn to_map(&self) -> Result<Map<String, Value>, SettingsError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SettingsError::Serialization(
                "settings did not serialize to an object".to_string(),
            )),
            Err(e) => Err(SettingsError::Serialization(e.to_string())),
        }
    }

    /// Returns the names of all settings.
    pub fn keys() -> Vec<String> {
        Self::default()
            .to_map()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces a single setting.
    ///
    /// # Errors
    ///
    /// Fails if the key is unknown or the value has the wrong type; the
    /// settings are left untouched in that case.
    pub fn apply(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut map = self.to_map()?;
        if !map.contains_key(key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        map.insert(key.to_string(), value);
        *self = serde_json::from_value(Value::Object(map)).map_err(|e| {
            SettingsError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// Returns the JSON-encoded value of one setting.
    pub fn encoded(&self, key: &str) -> Result<String, SettingsError> {
        let map = self.to_map()?;
        let value = map
            .get(key)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        Ok(value.to_string())
    }
}

// ============================================================================
// SettingsManager
// ============================================================================

/// Owns the in-memory settings and their persistence.
pub struct SettingsManager {
    store: Arc<dyn SettingsStore>,
    settings: AppSettings,
    loaded: bool,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            settings: AppSettings::default(),
            loaded: false,
        }
    }

    /// Loads stored settings over the defaults.
    ///
    /// On a store failure the defaults stay in place and saving remains
    /// disabled so the stored rows are not overwritten.
    pub fn load(&mut self) -> Result<&AppSettings, SettingsError> {
        let rows = self.store.get_all()?;
        let mut settings = AppSettings::default();

        for (key, raw) in rows {
            let value: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("設定 {} の解析に失敗しました: {}", key, e);
                    continue;
                }
            };
            match settings.apply(&key, value) {
                Ok(()) => {}
                Err(SettingsError::UnknownKey(_)) => {
                    tracing::debug!("不明な設定キーを無視します: {}", key);
                }
                Err(e) => tracing::warn!("設定 {} を無視します: {}", key, e),
            }
        }

        self.settings = settings;
        self.loaded = true;
        tracing::debug!("設定を読み込みました");
        Ok(&self.settings)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self) -> &AppSettings {
        &self.settings
    }

    /// Mutates the in-memory settings. Nothing is persisted.
    pub fn update(&mut self, f: impl FnOnce(&mut AppSettings)) {
        f(&mut self.settings);
    }

    /// Sets one setting from a JSON value and persists it.
    pub fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.settings.apply(key, value)?;
        self.save_one(key)
    }

    /// Persists every setting in one batch.
    pub fn save(&self) -> Result<(), SettingsError> {
        if !self.loaded {
            tracing::warn!("設定が読み込まれていないため保存をスキップします");
            return Ok(());
        }

        let entries: Vec<(String, String)> = self
            .settings
            .to_map()?
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        self.store.save_batch(&entries)?;
        tracing::debug!("設定を保存しました ({} 件)", entries.len());
        Ok(())
    }

    /// Persists a single setting. Skipped until settings were loaded.
    pub fn save_one(&self, key: &str) -> Result<(), SettingsError> {
        if !self.loaded {
            tracing::warn!(key, "設定が読み込まれていないため保存をスキップします");
            return Ok(());
        }
        let encoded = self.settings.encoded(key)?;
        self.store.save_one(key, &encoded)?;
        Ok(())
    }

    /// Restores the defaults and removes every stored row.
    pub fn reset_to_default(&mut self) -> Result<(), SettingsError> {
        self.settings = AppSettings::default();
        self.store.clear()?;
        self.loaded = true;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
