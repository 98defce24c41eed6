//! Pomodoro Reminder Library
//!
//! This library provides the core of the Pomodoro Reminder:
//! - Countdown (work/break) and stopwatch engines driven by a tick source
//! - Side effects on timer events: records, window pinning, notifications, sounds
//! - State broadcasting to the tray and the floating window over an event bus
//! - Settings and timer record persistence (SQLite)
//! - Menu bar UI with tray icon (macOS only)
//! - CLI command parsing and display utilities

pub mod app;
pub mod bus;
pub mod cli;
pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod history;
pub mod listener;
pub mod menubar;
pub mod notification;
pub mod settings;
pub mod sound;
pub mod store;
pub mod sync;
pub mod types;
pub mod window;

// Re-export commonly used types for convenience
pub use app::{
    AppConfig, AppContext, CloseOutcome, LoopControl, Services, StatusReport, TickMode,
};
pub use types::{
    CloseBehavior, CountdownPhase, RecordPhase, RecordType, StopwatchPhase, Theme, TimerMode,
    TimerRecord, TrayIconState,
};

// Re-export engine types
pub use engine::{
    CountdownDurations, CountdownEvent, CountdownSnapshot, CountdownTimer, StopwatchEvent,
    StopwatchSnapshot, StopwatchTimer,
};

// Re-export collaborator traits and their test doubles
pub use bus::{EventBus, LocalEventBus, MessageLog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use notification::{MockNotificationService, NotificationService};
pub use sound::{AudioService, MockAudioService, MutedAudioService};
pub use store::{
    MemoryRecordStore, MemorySettingsStore, RecordStore, SettingsStore, SqliteStore, StoreError,
};
pub use window::{HeadlessWindow, MockWindow, WindowHandle};

// Re-export menubar types
pub use menubar::{
    EventHandler, IconManager, MenuAction, MenuBuilder, MenuConfig, MenuItemConfig, MenuItemId,
    TrayIconManager, TrayUpdate,
};
