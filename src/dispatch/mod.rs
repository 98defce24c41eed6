//! Side effects of engine transitions.
//!
//! The dispatcher turns engine events into persistence, window, notification
//! and sound effects. Every effect of one transition runs in the order
//! persist, window, notification, sound. Each step is isolated: a failing
//! step is logged and the remaining steps still run.
//!
//! All methods block on I/O. The application loop runs them through
//! `tokio::task::spawn_blocking` and never waits for them on the tick path.
//! The one exception is [`SideEffectDispatcher::record_stopwatch_session`],
//! which is user initiated and reports its failure.

use std::sync::Arc;

use crate::notification::{
    send_with_permission, stopwatch_reminder_content, work_end_content, NotificationService,
};
use crate::settings::AppSettings;
use crate::sound::{AudioService, SoundCue, SoundLibrary};
use crate::store::{RecordStore, StoreError};
use crate::types::{RecordPhase, RecordType, TimerRecord};
use crate::window::WindowHandle;

/// Category stored on stopwatch break records.
pub const BREAK_CATEGORY: &str = "break";

// ============================================================================
// EffectSettings
// ============================================================================

/// Settings read by the dispatcher, captured when the event is handled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectSettings {
    pub enable_notification: bool,
    pub enable_work_sound: bool,
    pub enable_rest_sound: bool,
    pub enable_reminder_sound: bool,
    pub volume: f32,
}

impl From<&AppSettings> for EffectSettings {
    fn from(settings: &AppSettings) -> Self {
        Self {
            enable_notification: settings.enable_notification,
            enable_work_sound: settings.enable_work_sound,
            enable_rest_sound: settings.enable_rest_sound,
            enable_reminder_sound: settings.enable_stopwatch_reminder_sound,
            volume: settings.volume(),
        }
    }
}

// ============================================================================
// PendingSession
// ============================================================================

/// A stopped stopwatch session waiting for the user to describe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSession {
    /// Elapsed time captured before the engine reset
    pub duration_ms: i64,
    pub ended_at_ms: i64,
}

// ============================================================================
// SideEffectDispatcher
// ============================================================================

/// Runs the side effects of engine events.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    records: Arc<dyn RecordStore>,
    window: Arc<dyn WindowHandle>,
    notifier: Arc<dyn NotificationService>,
    audio: Arc<dyn AudioService>,
    sounds: SoundLibrary,
}

impl SideEffectDispatcher {
    pub fn new(
        records: Arc<dyn RecordStore>,
        window: Arc<dyn WindowHandle>,
        notifier: Arc<dyn NotificationService>,
        audio: Arc<dyn AudioService>,
        sounds: SoundLibrary,
    ) -> Self {
        Self {
            records,
            window,
            notifier,
            audio,
            sounds,
        }
    }

    /// A countdown work interval ended.
    ///
    /// Records the interval, brings the main window to the front and pins
    /// it, then notifies and plays the work-end sound.
    pub fn on_countdown_work_end(
        &self,
        duration_ms: i64,
        ended_at_ms: i64,
        category: &str,
        settings: EffectSettings,
    ) {
        let record = TimerRecord::completed(
            RecordType::Countdown,
            RecordPhase::Work,
            ended_at_ms,
            duration_ms,
        )
        .with_category(category);
        self.persist(&record);

        self.surface_main_window();

        if settings.enable_notification {
            self.notify_work_end();
        }

        if settings.enable_work_sound {
            self.play(SoundCue::WorkEnd, settings.volume);
        }
    }

    /// The countdown break target was reached. The engine stays in break.
    pub fn on_countdown_break_target(&self, settings: EffectSettings) {
        if settings.enable_rest_sound {
            self.play(SoundCue::BreakEnd, settings.volume);
        }
    }

    /// The user left a countdown break.
    ///
    /// Records the break with the time actually spent in it, under the
    /// current countdown category.
    pub fn on_countdown_break_end(
        &self,
        elapsed_ms: i64,
        ended_at_ms: i64,
        category: &str,
        silent: bool,
        settings: EffectSettings,
    ) {
        let record = TimerRecord::completed(
            RecordType::Countdown,
            RecordPhase::Break,
            ended_at_ms,
            elapsed_ms,
        )
        .with_category(category);
        self.persist(&record);

        if !silent && settings.enable_rest_sound {
            self.play(SoundCue::BreakEnd, settings.volume);
        }
    }

    /// The stopwatch crossed its reminder threshold.
    pub fn on_stopwatch_reminder(&self, settings: EffectSettings) {
        if settings.enable_notification {
            if let Err(e) =
                send_with_permission(self.notifier.as_ref(), &stopwatch_reminder_content())
            {
                tracing::warn!(error = %e, "リマインダー通知の送信に失敗しました");
            }
        }
        if settings.enable_reminder_sound {
            self.play(SoundCue::Reminder, settings.volume);
        }
    }

    /// The stopwatch break crossed its target. The break keeps counting.
    pub fn on_stopwatch_break_target(&self, settings: EffectSettings) {
        if settings.enable_rest_sound {
            self.play(SoundCue::BreakEnd, settings.volume);
        }
    }

    /// The user ended a stopwatch break.
    pub fn on_stopwatch_break_end(&self, elapsed_ms: i64, ended_at_ms: i64) {
        let record = TimerRecord::completed(
            RecordType::Stopwatch,
            RecordPhase::Break,
            ended_at_ms,
            elapsed_ms,
        )
        .with_category(BREAK_CATEGORY);
        self.persist(&record);
    }

    /// Saves a confirmed stopwatch work session.
    ///
    /// # Errors
    ///
    /// Returns the store error so the caller can report it to the user.
    pub fn record_stopwatch_session(
        &self,
        session: PendingSession,
        name: &str,
        category: Option<&str>,
    ) -> Result<TimerRecord, StoreError> {
        let mut record = TimerRecord::completed(
            RecordType::Stopwatch,
            RecordPhase::Work,
            session.ended_at_ms,
            session.duration_ms,
        )
        .with_name(name);
        if let Some(category) = category {
            record = record.with_category(category);
        }
        self.records.add(&record)?;
        tracing::info!(id = %record.id, duration_ms = record.duration, "セッションを記録しました");
        Ok(record)
    }

    /// Drops the always-on-top pin set at work end.
    pub fn release_main_window(&self) {
        if let Err(e) = self.window.set_always_on_top(false) {
            tracing::warn!(error = %e, "最前面表示の解除に失敗しました");
        }
    }

    fn persist(&self, record: &TimerRecord) {
        match self.records.add(record) {
            Ok(()) => tracing::debug!(
                record_type = record.record_type.as_str(),
                duration_ms = record.duration,
                "記録を保存しました"
            ),
            Err(e) => tracing::warn!(error = %e, "記録の保存に失敗しました"),
        }
    }

    fn surface_main_window(&self) {
        let steps: [(&str, Result<(), crate::window::WindowError>); 3] = [
            ("show", self.window.show()),
            ("always_on_top", self.window.set_always_on_top(true)),
            ("focus", self.window.focus()),
        ];
        for (step, result) in steps {
            if let Err(e) = result {
                tracing::warn!(step, error = %e, "メインウィンドウの表示に失敗しました");
            }
        }
    }

    fn notify_work_end(&self) {
        match send_with_permission(self.notifier.as_ref(), &work_end_content()) {
            Ok(true) => {}
            Ok(false) => tracing::debug!("通知許可がないため通知を省略しました"),
            Err(e) => tracing::warn!(error = %e, "通知の送信に失敗しました"),
        }
    }

    fn play(&self, cue: SoundCue, volume: f32) {
        let path = self.sounds.resolve(cue);
        if let Err(e) = self.audio.play(&path, volume) {
            tracing::warn!(error = %e, "サウンドの再生に失敗しました");
        }
    }
}

impl std::fmt::Debug for SideEffectDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideEffectDispatcher")
            .field("sounds", &self.sounds)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
