//! Cross-window state synchronization.
//!
//! The broadcaster projects engine and settings state into the messages the
//! floating window and the tray icon render, and publishes them on the event
//! bus. Projection is pure; publication compares against the last message
//! sent on each channel and only emits on change.
//!
//! The application calls [`Broadcaster::publish`] at the end of every
//! mutation (command, tick, settings change).

use std::sync::Arc;

use serde::Serialize;

use crate::bus::{channels, emit_json, EventBus};
use crate::engine::{CountdownSnapshot, StopwatchSnapshot};
use crate::settings::AppSettings;
use crate::types::{CountdownPhase, StopwatchPhase, Theme, TimerMode, TrayIconState};

// ============================================================================
// Messages
// ============================================================================

/// Payload of `timer-state-sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSyncMessage {
    pub theme: Theme,
    /// Phase of the active engine (`idle`, `work` or `break`)
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<i64>,
    pub is_running: bool,
    pub timer_mode: TimerMode,
    pub is_break_mode: bool,
    /// Time spent in the current break, 0 outside break
    pub break_elapsed_ms: i64,
}

/// Payload of `float-display-settings-sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettingsMessage {
    pub show_timer: bool,
    pub show_state: bool,
    pub theme: Theme,
}

/// Payload of `float-size-sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FloatSizeMessage {
    pub width: i64,
    pub height: i64,
}

/// Payload of `tray-icon-state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrayStateMessage {
    pub state: TrayIconState,
    pub tooltip: &'static str,
}

impl From<TrayIconState> for TrayStateMessage {
    fn from(state: TrayIconState) -> Self {
        Self {
            state,
            tooltip: state.tooltip(),
        }
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Everything the projection reads.
#[derive(Debug, Clone, Copy)]
pub struct SyncInput<'a> {
    pub settings: &'a AppSettings,
    pub countdown: CountdownSnapshot,
    pub stopwatch: StopwatchSnapshot,
}

/// Projects the active engine into a state-sync message.
pub fn project_state(input: &SyncInput<'_>) -> StateSyncMessage {
    let theme = input.settings.theme;
    match input.settings.timer_mode {
        TimerMode::Countdown => {
            let c = &input.countdown;
            let is_break = c.phase == CountdownPhase::Break;
            StateSyncMessage {
                theme,
                mode: c.phase.as_str(),
                remaining_ms: Some(c.remaining_ms),
                elapsed_ms: None,
                is_running: c.is_running,
                timer_mode: TimerMode::Countdown,
                is_break_mode: is_break,
                break_elapsed_ms: if is_break { c.break_elapsed_ms } else { 0 },
            }
        }
        TimerMode::Stopwatch => {
            let s = &input.stopwatch;
            let is_break = s.is_break();
            StateSyncMessage {
                theme,
                mode: s.phase.as_str(),
                remaining_ms: None,
                elapsed_ms: Some(s.elapsed_ms),
                is_running: s.is_running,
                timer_mode: TimerMode::Stopwatch,
                is_break_mode: is_break,
                break_elapsed_ms: if is_break { s.elapsed_ms } else { 0 },
            }
        }
    }
}

/// Derives the tray icon state from the active engine.
///
/// A paused stopwatch with no time on it counts as idle.
pub fn tray_icon_state(input: &SyncInput<'_>) -> TrayIconState {
    match input.settings.timer_mode {
        TimerMode::Countdown => match input.countdown.phase {
            CountdownPhase::Idle => TrayIconState::Idle,
            CountdownPhase::Break => TrayIconState::Break,
            CountdownPhase::Work if input.countdown.is_running => TrayIconState::Working,
            CountdownPhase::Work => TrayIconState::Paused,
        },
        TimerMode::Stopwatch => {
            let s = &input.stopwatch;
            match s.phase {
                StopwatchPhase::Break => TrayIconState::Break,
                StopwatchPhase::Work if s.is_running => TrayIconState::Working,
                StopwatchPhase::Work if s.elapsed_ms > 0 => TrayIconState::Paused,
                StopwatchPhase::Work => TrayIconState::Idle,
            }
        }
    }
}

pub fn display_settings(settings: &AppSettings) -> DisplaySettingsMessage {
    DisplaySettingsMessage {
        show_timer: settings.floating_window_show_timer,
        show_state: settings.floating_window_show_state,
        theme: settings.theme,
    }
}

pub fn float_size(settings: &AppSettings) -> FloatSizeMessage {
    FloatSizeMessage {
        width: settings.floating_window_width,
        height: settings.floating_window_height,
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Publishes projected state on change.
///
/// Floating-window messages are only sent while the floating window is
/// enabled. The tray state is always published.
pub struct Broadcaster {
    bus: Arc<dyn EventBus>,
    last_state: Option<StateSyncMessage>,
    last_tray: Option<TrayIconState>,
    last_display: Option<DisplaySettingsMessage>,
    last_size: Option<FloatSizeMessage>,
}

impl Broadcaster {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus,
            last_state: None,
            last_tray: None,
            last_display: None,
            last_size: None,
        }
    }

    /// Publishes whatever changed since the last call.
    pub fn publish(&mut self, input: &SyncInput<'_>) {
        self.publish_tray(input);
        if input.settings.enable_floating_window {
            self.publish_floating(input, false);
        }
    }

    /// Sends every floating-window message regardless of the cache.
    ///
    /// Called when the floating window is enabled, so it starts from the
    /// current state rather than waiting for the next change.
    pub fn force_floating(&mut self, input: &SyncInput<'_>) {
        self.publish_floating(input, true);
    }

    /// Forgets what was sent on the floating-window channels.
    pub fn reset_floating_cache(&mut self) {
        self.last_state = None;
        self.last_display = None;
        self.last_size = None;
    }

    pub fn last_tray_state(&self) -> Option<TrayIconState> {
        self.last_tray
    }

    pub fn last_state(&self) -> Option<&StateSyncMessage> {
        self.last_state.as_ref()
    }

    fn publish_tray(&mut self, input: &SyncInput<'_>) {
        let state = tray_icon_state(input);
        if self.last_tray == Some(state) {
            return;
        }
        tracing::debug!(state = state.as_str(), "トレイアイコン状態を更新");
        if self.send(channels::TRAY_ICON_STATE, &TrayStateMessage::from(state)) {
            self.last_tray = Some(state);
        }
    }

    fn publish_floating(&mut self, input: &SyncInput<'_>, force: bool) {
        let size = float_size(input.settings);
        if (force || self.last_size != Some(size)) && self.send(channels::FLOAT_SIZE_SYNC, &size) {
            self.last_size = Some(size);
        }

        let display = display_settings(input.settings);
        if (force || self.last_display.as_ref() != Some(&display))
            && self.send(channels::FLOAT_DISPLAY_SETTINGS_SYNC, &display)
        {
            self.last_display = Some(display);
        }

        let state = project_state(input);
        if (force || self.last_state.as_ref() != Some(&state))
            && self.send(channels::TIMER_STATE_SYNC, &state)
        {
            self.last_state = Some(state);
        }
    }

    fn send<T: Serialize>(&self, channel: &str, payload: &T) -> bool {
        match emit_json(self.bus.as_ref(), channel, payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(channel, error = %e, "同期メッセージの送信に失敗しました");
                false
            }
        }
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("last_tray", &self.last_tray)
            .field("last_state", &self.last_state)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{LocalEventBus, MessageLog};
    use serde_json::json;

    fn countdown(phase: CountdownPhase, remaining_ms: i64, is_running: bool) -> CountdownSnapshot {
        CountdownSnapshot {
            phase,
            remaining_ms,
            total_duration_ms: 1_500_000,
            is_running,
            cycle_count: 0,
            break_elapsed_ms: 0,
        }
    }

    fn stopwatch(phase: StopwatchPhase, elapsed_ms: i64, is_running: bool) -> StopwatchSnapshot {
        StopwatchSnapshot {
            phase,
            elapsed_ms,
            is_running,
            break_target_ms: 0,
            reminder_ms: None,
        }
    }

    fn idle_input(settings: &AppSettings) -> SyncInput<'_> {
        SyncInput {
            settings,
            countdown: countdown(CountdownPhase::Idle, 1_500_000, false),
            stopwatch: stopwatch(StopwatchPhase::Work, 0, false),
        }
    }

    mod projection_tests {
        use super::*;

        #[test]
        fn test_countdown_payload_shape() {
            let settings = AppSettings::default();
            let mut input = idle_input(&settings);
            input.countdown = countdown(CountdownPhase::Work, 1_200_000, true);

            let value = serde_json::to_value(project_state(&input)).unwrap();
            assert_eq!(
                value,
                json!({
                    "theme": "dark",
                    "mode": "work",
                    "remainingMs": 1_200_000,
                    "isRunning": true,
                    "timerMode": "countdown",
                    "isBreakMode": false,
                    "breakElapsedMs": 0
                })
            );
        }

        #[test]
        fn test_countdown_break_reports_overshoot() {
            let settings = AppSettings::default();
            let mut input = idle_input(&settings);
            input.countdown = CountdownSnapshot {
                break_elapsed_ms: 320_000,
                ..countdown(CountdownPhase::Break, 0, true)
            };

            let message = project_state(&input);
            assert!(message.is_break_mode);
            assert_eq!(message.break_elapsed_ms, 320_000);
        }

        #[test]
        fn test_break_elapsed_zero_outside_break() {
            let settings = AppSettings::default();
            let mut input = idle_input(&settings);
            input.countdown = CountdownSnapshot {
                break_elapsed_ms: 99,
                ..countdown(CountdownPhase::Work, 10, true)
            };
            assert_eq!(project_state(&input).break_elapsed_ms, 0);
        }

        #[test]
        fn test_stopwatch_payload_uses_elapsed() {
            let settings = AppSettings {
                timer_mode: TimerMode::Stopwatch,
                ..AppSettings::default()
            };
            let mut input = idle_input(&settings);
            input.stopwatch = stopwatch(StopwatchPhase::Break, 42_000, true);

            let value = serde_json::to_value(project_state(&input)).unwrap();
            assert_eq!(value["elapsedMs"], json!(42_000));
            assert!(value.get("remainingMs").is_none());
            assert_eq!(value["breakElapsedMs"], json!(42_000));
            assert_eq!(value["mode"], json!("break"));
        }

        #[test]
        fn test_tray_state_countdown() {
            let settings = AppSettings::default();
            let mut input = idle_input(&settings);
            assert_eq!(tray_icon_state(&input), TrayIconState::Idle);

            input.countdown = countdown(CountdownPhase::Work, 10, true);
            assert_eq!(tray_icon_state(&input), TrayIconState::Working);

            input.countdown = countdown(CountdownPhase::Work, 10, false);
            assert_eq!(tray_icon_state(&input), TrayIconState::Paused);

            input.countdown = countdown(CountdownPhase::Break, 10, false);
            assert_eq!(tray_icon_state(&input), TrayIconState::Break);
        }

        #[test]
        fn test_tray_state_stopwatch() {
            let settings = AppSettings {
                timer_mode: TimerMode::Stopwatch,
                ..AppSettings::default()
            };
            let mut input = idle_input(&settings);
            assert_eq!(tray_icon_state(&input), TrayIconState::Idle);

            input.stopwatch = stopwatch(StopwatchPhase::Work, 0, true);
            assert_eq!(tray_icon_state(&input), TrayIconState::Working);

            input.stopwatch = stopwatch(StopwatchPhase::Work, 5_000, false);
            assert_eq!(tray_icon_state(&input), TrayIconState::Paused);

            input.stopwatch = stopwatch(StopwatchPhase::Break, 0, false);
            assert_eq!(tray_icon_state(&input), TrayIconState::Break);
        }
    }

    mod broadcaster_tests {
        use super::*;

        #[test]
        fn test_publish_only_on_change() {
            let bus = Arc::new(LocalEventBus::new());
            let states = MessageLog::attach(bus.as_ref(), channels::TIMER_STATE_SYNC).unwrap();
            let tray = MessageLog::attach(bus.as_ref(), channels::TRAY_ICON_STATE).unwrap();
            let mut broadcaster = Broadcaster::new(bus.clone());

            let settings = AppSettings::default();
            let input = idle_input(&settings);
            broadcaster.publish(&input);
            broadcaster.publish(&input);

            assert_eq!(states.len(), 1);
            assert_eq!(tray.len(), 1);
            assert_eq!(
                tray.last(),
                Some(json!({"state": "idle", "tooltip": "Pomodoro Reminder - Idle"}))
            );
        }

        #[test]
        fn test_floating_disabled_sends_tray_only() {
            let bus = Arc::new(LocalEventBus::new());
            let states = MessageLog::attach(bus.as_ref(), channels::TIMER_STATE_SYNC).unwrap();
            let tray = MessageLog::attach(bus.as_ref(), channels::TRAY_ICON_STATE).unwrap();
            let mut broadcaster = Broadcaster::new(bus.clone());

            let settings = AppSettings {
                enable_floating_window: false,
                ..AppSettings::default()
            };
            broadcaster.publish(&idle_input(&settings));

            assert!(states.is_empty());
            assert_eq!(tray.len(), 1);
        }

        #[test]
        fn test_force_floating_resends_unchanged_state() {
            let bus = Arc::new(LocalEventBus::new());
            let states = MessageLog::attach(bus.as_ref(), channels::TIMER_STATE_SYNC).unwrap();
            let sizes = MessageLog::attach(bus.as_ref(), channels::FLOAT_SIZE_SYNC).unwrap();
            let display =
                MessageLog::attach(bus.as_ref(), channels::FLOAT_DISPLAY_SETTINGS_SYNC).unwrap();
            let mut broadcaster = Broadcaster::new(bus.clone());

            let settings = AppSettings::default();
            let input = idle_input(&settings);
            broadcaster.publish(&input);
            broadcaster.force_floating(&input);

            assert_eq!(states.len(), 2);
            assert_eq!(sizes.len(), 2);
            assert_eq!(display.len(), 2);
            assert_eq!(sizes.last(), Some(json!({"width": 150, "height": 50})));
        }

        #[test]
        fn test_display_change_sends_display_message() {
            let bus = Arc::new(LocalEventBus::new());
            let display =
                MessageLog::attach(bus.as_ref(), channels::FLOAT_DISPLAY_SETTINGS_SYNC).unwrap();
            let states = MessageLog::attach(bus.as_ref(), channels::TIMER_STATE_SYNC).unwrap();
            let mut broadcaster = Broadcaster::new(bus.clone());

            let mut settings = AppSettings::default();
            broadcaster.publish(&idle_input(&settings));
            settings.floating_window_show_state = false;
            broadcaster.publish(&idle_input(&settings));

            assert_eq!(display.len(), 2);
            assert_eq!(
                display.last(),
                Some(json!({"showTimer": true, "showState": false, "theme": "dark"}))
            );
            assert_eq!(states.len(), 1);
        }
    }
}
