//! Component integration tests.
//!
//! Wires real components together without the application loop:
//! - SQLite stores behind the settings manager and the dispatcher
//! - Broadcaster, tray bridge and tray manager over one event bus
//! - Dispatcher failure isolation

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use crossbeam_channel::unbounded;
use serde_json::{json, Value};

use pomodoro_reminder::bus::{channels, EventBus, LocalEventBus, MessageLog};
use pomodoro_reminder::dispatch::{EffectSettings, PendingSession, SideEffectDispatcher};
use pomodoro_reminder::engine::{CountdownSnapshot, StopwatchSnapshot};
use pomodoro_reminder::history::HistoryStats;
use pomodoro_reminder::listener::{AppCommand, CommandListener};
use pomodoro_reminder::menubar::{MenuItemId, TrayBridge, TrayIconManager};
use pomodoro_reminder::notification::MockNotificationService;
use pomodoro_reminder::settings::{AppSettings, SettingsManager};
use pomodoro_reminder::sound::{MockAudioService, SoundLibrary};
use pomodoro_reminder::store::{MemoryRecordStore, RecordStore, SqliteStore};
use pomodoro_reminder::sync::{Broadcaster, SyncInput};
use pomodoro_reminder::types::{
    CloseBehavior, CountdownPhase, RecordPhase, RecordType, StopwatchPhase, Theme, TimerRecord,
    TrayIconState,
};
use pomodoro_reminder::window::{MockWindow, WindowCall};

fn effects() -> EffectSettings {
    EffectSettings::from(&AppSettings::default())
}

fn dispatcher(
    records: Arc<dyn RecordStore>,
) -> (
    SideEffectDispatcher,
    Arc<MockWindow>,
    Arc<MockNotificationService>,
    Arc<MockAudioService>,
) {
    let window = Arc::new(MockWindow::new());
    let notifier = Arc::new(MockNotificationService::new());
    let audio = Arc::new(MockAudioService::new());
    let dispatcher = SideEffectDispatcher::new(
        records,
        window.clone(),
        notifier.clone(),
        audio.clone(),
        SoundLibrary::new(PathBuf::from("/sounds")),
    );
    (dispatcher, window, notifier, audio)
}

mod sqlite_integration {
    use super::*;

    #[test]
    fn test_settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("reminder.db");

        {
            let store = Arc::new(SqliteStore::open(&path).unwrap());
            let mut manager = SettingsManager::new(store);
            manager.load().unwrap();
            manager.set_value("theme", json!("light")).unwrap();
            manager.update(|s| {
                s.close_behavior = CloseBehavior::Minimize;
                s.window_x = Some(120);
            });
            manager.save().unwrap();
        }

        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let mut manager = SettingsManager::new(store);
        let settings = manager.load().unwrap();
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.close_behavior, CloseBehavior::Minimize);
        assert_eq!(settings.window_x, Some(120));
        assert_eq!(settings.window_y, None);
    }

    #[test]
    fn test_reset_removes_stored_rows() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut manager = SettingsManager::new(store.clone());
        manager.load().unwrap();
        manager.set_value("workDurationMinutes", json!(50)).unwrap();

        manager.reset_to_default().unwrap();

        let mut reloaded = SettingsManager::new(store);
        assert_eq!(reloaded.load().unwrap(), &AppSettings::default());
    }

    #[test]
    fn test_dispatcher_records_land_in_sqlite() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let (dispatcher, _, _, _) = dispatcher(store.clone());

        dispatcher.on_countdown_work_end(1_500_000, 2_000_000, "writing", effects());
        dispatcher.on_countdown_break_end(240_000, 2_300_000, "writing", true, effects());
        let saved = dispatcher
            .record_stopwatch_session(
                PendingSession {
                    duration_ms: 600_000,
                    ended_at_ms: 3_000_000,
                },
                "調査",
                None,
            )
            .unwrap();

        let records = store.list(None).unwrap();
        assert_eq!(records.len(), 3);
        // Newest first
        assert_eq!(records[0], saved);
        assert_eq!(records[0].category_or_default(), "work");
        assert_eq!(records[1].phase, Some(RecordPhase::Break));
        assert_eq!(records[1].start_time, 2_060_000);
        assert_eq!(records[2].record_type, RecordType::Countdown);
        assert_eq!(records[2].category.as_deref(), Some("writing"));
    }

    #[test]
    fn test_update_details_then_list() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record =
            TimerRecord::completed(RecordType::Stopwatch, RecordPhase::Work, 10_000, 5_000);
        store.add(&record).unwrap();

        store
            .update_details(&record.id, Some("名前"), Some("deep"))
            .unwrap();
        let updated = store.get_record(&record.id).unwrap().unwrap();
        assert_eq!(updated.name.as_deref(), Some("名前"));
        assert_eq!(updated.category.as_deref(), Some("deep"));
        assert_eq!(updated.duration, 5_000);

        let missing = store.update_details("nope", None, None).unwrap_err();
        assert!(missing.is_not_found());
    }

    #[test]
    fn test_history_stats_over_stored_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 18, 0, 0).unwrap();
        let at = |d: u32, h: u32| {
            Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0)
                .unwrap()
                .timestamp_millis()
        };
        for (end, phase) in [
            (at(15, 10), RecordPhase::Work),
            (at(15, 11), RecordPhase::Break),
            (at(13, 9), RecordPhase::Work),
            (at(12, 9), RecordPhase::Work),
        ] {
            store
                .add(&TimerRecord::completed(RecordType::Countdown, phase, end, 60_000))
                .unwrap();
        }

        let stats = HistoryStats::compute(&store.list(None).unwrap(), &now);
        assert_eq!(stats.today_count, 2);
        assert_eq!(stats.week_count, 3);
        assert_eq!(stats.week_work_ms, 120_000);
    }
}

mod tray_integration {
    use super::*;

    fn input(settings: &AppSettings, running: bool) -> SyncInput<'_> {
        SyncInput {
            settings,
            countdown: CountdownSnapshot {
                phase: CountdownPhase::Work,
                remaining_ms: 600_000,
                total_duration_ms: 1_500_000,
                is_running: running,
                cycle_count: 0,
                break_elapsed_ms: 0,
            },
            stopwatch: StopwatchSnapshot {
                phase: StopwatchPhase::Work,
                elapsed_ms: 0,
                is_running: false,
                break_target_ms: 0,
                reminder_ms: None,
            },
        }
    }

    #[test]
    fn test_broadcast_reaches_tray_title() {
        let bus = Arc::new(LocalEventBus::new());
        let (tx, rx) = unbounded();
        let _bridge = TrayBridge::attach(bus.clone(), tx).unwrap();
        let mut tray = TrayIconManager::new(rx, bus.clone());
        let mut broadcaster = Broadcaster::new(bus.clone());
        let settings = AppSettings::default();

        broadcaster.publish(&input(&settings, true));
        tray.pump();
        assert_eq!(tray.view().state, TrayIconState::Working);
        assert_eq!(tray.generate_title(), "🍅 10:00");
        assert!(!tray.generate_menu_config().start.enabled);

        broadcaster.publish(&input(&settings, false));
        tray.pump();
        assert_eq!(tray.generate_title(), "⏸ 一時停止");
        assert!(tray.generate_menu_config().start.enabled);
    }

    #[tokio::test]
    async fn test_tray_clicks_become_commands() {
        let bus = Arc::new(LocalEventBus::new());
        let (command_tx, mut command_rx) = tokio::sync::mpsc::unbounded_channel();
        let _listener = CommandListener::attach(bus.clone(), command_tx).unwrap();
        let (_tx, rx) = unbounded();
        let tray = TrayIconManager::new(rx, bus.clone());

        tray.handle_menu_click(MenuItemId::Start);
        tray.handle_menu_click(MenuItemId::Settings);
        tray.handle_icon_click();
        tray.handle_menu_click(MenuItemId::Quit);

        assert!(matches!(command_rx.recv().await, Some(AppCommand::Start)));
        assert!(matches!(command_rx.recv().await, Some(AppCommand::OpenSettings)));
        assert!(matches!(command_rx.recv().await, Some(AppCommand::ShowMain)));
        assert!(matches!(command_rx.recv().await, Some(AppCommand::Quit)));
    }

    #[test]
    fn test_floating_messages_follow_settings() {
        let bus = Arc::new(LocalEventBus::new());
        let display = MessageLog::attach(bus.as_ref(), channels::FLOAT_DISPLAY_SETTINGS_SYNC)
            .unwrap();
        let mut broadcaster = Broadcaster::new(bus.clone());

        let mut settings = AppSettings::default();
        broadcaster.publish(&input(&settings, true));
        settings.floating_window_show_timer = false;
        broadcaster.publish(&input(&settings, true));

        assert_eq!(display.len(), 2);
        assert_eq!(
            display.last().unwrap(),
            json!({"showTimer": false, "showState": true, "theme": "dark"})
        );
    }

    #[test]
    fn test_closed_bus_rejects_emit() {
        let bus = LocalEventBus::new();
        bus.close();
        assert!(bus.emit(channels::TRAY_START, Value::Null).is_err());
    }
}

mod failure_isolation {
    use super::*;

    #[test]
    fn test_store_failure_does_not_stop_other_effects() {
        let records = Arc::new(MemoryRecordStore::new());
        records.set_should_fail(true);
        let (dispatcher, window, notifier, audio) = dispatcher(records.clone());

        dispatcher.on_countdown_work_end(1_500_000, 2_000_000, "work", effects());

        assert!(records.is_empty());
        assert!(window.calls().contains(&WindowCall::SetAlwaysOnTop(true)));
        assert_eq!(notifier.sent_count(), 1);
        assert_eq!(audio.play_count(), 1);
    }

    #[test]
    fn test_window_and_audio_failures_still_record() {
        let records = Arc::new(MemoryRecordStore::new());
        let (dispatcher, window, notifier, audio) = dispatcher(records.clone());
        window.set_should_fail(true);
        audio.set_should_fail(true);
        notifier.set_should_fail(true);

        dispatcher.on_countdown_work_end(1_500_000, 2_000_000, "work", effects());

        assert_eq!(records.len(), 1);
        assert!(window.calls().is_empty());
    }
}
