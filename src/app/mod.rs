//! Application context.
//!
//! [`AppContext`] owns both engines, the settings, the dispatcher and the
//! broadcaster, and runs the single event loop that mutates them. There is
//! no global state: everything is created by [`AppContext::init`] and torn
//! down by [`AppContext::dispose`].
//!
//! # Event loop
//!
//! ```text
//!  ticks ──────┐
//!  commands ───┼──▶ AppContext ──▶ engines ──▶ events ──▶ dispatcher (spawn_blocking)
//!  tray pump ──┘                         └────────────▶ broadcaster ──▶ bus
//! ```
//!
//! Every mutation ends with [`AppContext::after_mutation`]: engine events are
//! drained and dispatched, then the broadcaster publishes whatever changed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bus::{channels, emit_json, EventBus};
use crate::clock::{
    Clock, IntervalTicker, ManualTicker, Tick, TickScheduler, TickTarget,
    DEFAULT_TICK_INTERVAL_MS,
};
use crate::dispatch::{EffectSettings, PendingSession, SideEffectDispatcher};
use crate::engine::{
    BreakEndReason, CountdownEvent, CountdownSnapshot, CountdownTimer, StopwatchEvent,
    StopwatchSnapshot, StopwatchTimer,
};
use crate::listener::{AppCommand, CommandListener};
use crate::menubar::{TrayBridge, TrayIconManager};
use crate::notification::NotificationService;
use crate::settings::{SettingsError, SettingsManager};
use crate::sound::{default_sound_dir, AudioService, SoundLibrary};
use crate::store::{RecordStore, SettingsStore};
use crate::sync::{tray_icon_state, Broadcaster, SyncInput};
use crate::types::{
    CloseBehavior, StopwatchPhase, TimerMode, TimerRecord, TrayIconState, DEFAULT_CATEGORY,
};
use crate::window::{logical_geometry, LogicalPosition, LogicalSize, WindowHandle};

/// How often the tray applies queued updates.
const TRAY_PUMP_INTERVAL: Duration = Duration::from_millis(250);

// ============================================================================
// Configuration
// ============================================================================

/// Where ticks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// A tokio interval per running engine
    Interval { period_ms: u64 },
    /// No automatic ticks; callers use [`AppContext::manual_tick`]
    Manual,
}

/// Runtime configuration chosen by the caller (not persisted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub tick: TickMode,
    pub sound_dir: PathBuf,
    /// Create the tray icon
    pub enable_tray: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick: TickMode::Interval {
                period_ms: DEFAULT_TICK_INTERVAL_MS,
            },
            sound_dir: default_sound_dir(),
            enable_tray: false,
        }
    }
}

/// External collaborators.
#[derive(Clone)]
pub struct Services {
    pub settings_store: Arc<dyn SettingsStore>,
    pub records: Arc<dyn RecordStore>,
    pub main_window: Arc<dyn WindowHandle>,
    pub floating_window: Arc<dyn WindowHandle>,
    pub notifier: Arc<dyn NotificationService>,
    pub audio: Arc<dyn AudioService>,
    pub bus: Arc<dyn EventBus>,
    pub clock: Arc<dyn Clock>,
}

// ============================================================================
// Results
// ============================================================================

/// Whether the event loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// What a close request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// State was saved; the application should exit
    Exit,
    /// The main window was hidden to the tray
    Hidden,
    /// The user has to choose; see [`AppCommand::ConfirmClose`]
    PromptShown,
}

/// Snapshot returned by [`AppCommand::Status`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub mode: TimerMode,
    pub countdown: CountdownSnapshot,
    pub stopwatch: StopwatchSnapshot,
    pub tray_state: TrayIconState,
    pub category: String,
    pub pending_session: Option<PendingSession>,
    pub close_prompt_open: bool,
    pub floating_window: bool,
}

struct Tray {
    manager: TrayIconManager,
    _bridge: TrayBridge,
}

// ============================================================================
// AppContext
// ============================================================================

/// The running application.
pub struct AppContext {
    settings: SettingsManager,
    countdown: CountdownTimer,
    stopwatch: StopwatchTimer,
    countdown_events: mpsc::UnboundedReceiver<CountdownEvent>,
    stopwatch_events: mpsc::UnboundedReceiver<StopwatchEvent>,
    ticks: mpsc::UnboundedReceiver<Tick>,
    commands_tx: mpsc::UnboundedSender<AppCommand>,
    commands_rx: mpsc::UnboundedReceiver<AppCommand>,
    dispatcher: SideEffectDispatcher,
    broadcaster: Broadcaster,
    listener: Option<CommandListener>,
    tray: Option<Tray>,
    main_window: Arc<dyn WindowHandle>,
    floating_window: Arc<dyn WindowHandle>,
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    /// Category of the next countdown record
    countdown_category: String,
    pending_session: Option<PendingSession>,
    close_prompt_open: bool,
    /// Floating window state last applied to the window
    floating_enabled: bool,
    floating_size: (i64, i64),
    /// Tail of the side-effect chain
    effects: Option<JoinHandle<()>>,
    disposed: bool,
}

impl AppContext {
    /// Loads settings, restores the main window and wires every component.
    ///
    /// A settings load failure is logged and the defaults are used; saving is
    /// then refused so the stored values are not overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus rejects the command listener or the tray
    /// bridge.
    pub fn init(services: Services, config: AppConfig) -> anyhow::Result<Self> {
        let mut settings = SettingsManager::new(Arc::clone(&services.settings_store));
        if let Err(e) = settings.load() {
            tracing::warn!(
                error = %e,
                suggestion = e.suggestion(),
                "設定の読み込みに失敗しました。既定値を使用します"
            );
        }

        restore_main_window(services.main_window.as_ref(), &settings);

        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let (countdown_ticker, stopwatch_ticker) = tickers(config.tick, &services.clock, tick_tx);

        let mut countdown = CountdownTimer::new(
            settings.get().countdown_durations(),
            countdown_ticker,
            Arc::clone(&services.clock),
        );
        let mut stopwatch = StopwatchTimer::new(stopwatch_ticker, Arc::clone(&services.clock));
        stopwatch.set_reminder_time(settings.get().stopwatch_reminder_ms());
        let countdown_events = countdown.subscribe();
        let stopwatch_events = stopwatch.subscribe();

        let dispatcher = SideEffectDispatcher::new(
            services.records,
            Arc::clone(&services.main_window),
            services.notifier,
            services.audio,
            SoundLibrary::new(config.sound_dir),
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let listener = CommandListener::attach(Arc::clone(&services.bus), commands_tx.clone())
            .context("コマンドリスナーの登録に失敗しました")?;

        let tray = if config.enable_tray {
            Some(create_tray(&services.bus)?)
        } else {
            None
        };

        let mut app = Self {
            settings,
            countdown,
            stopwatch,
            countdown_events,
            stopwatch_events,
            ticks,
            commands_tx,
            commands_rx,
            dispatcher,
            broadcaster: Broadcaster::new(Arc::clone(&services.bus)),
            listener: Some(listener),
            tray,
            main_window: services.main_window,
            floating_window: services.floating_window,
            bus: services.bus,
            clock: services.clock,
            countdown_category: DEFAULT_CATEGORY.to_string(),
            pending_session: None,
            close_prompt_open: false,
            floating_enabled: false,
            floating_size: (0, 0),
            effects: None,
            disposed: false,
        };

        app.sync_floating_window();
        app.publish();
        app.pump_tray();
        tracing::info!(mode = app.mode().as_str(), "アプリケーションを初期化しました");
        Ok(app)
    }

    /// Sender for feeding commands from outside the bus (CLI, signals).
    pub fn command_sender(&self) -> mpsc::UnboundedSender<AppCommand> {
        self.commands_tx.clone()
    }

    /// Runs the event loop until a quit command, then disposes.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut tray_pump = tokio::time::interval(TRAY_PUMP_INTERVAL);
        loop {
            tokio::select! {
                Some(tick) = self.ticks.recv() => self.on_tick(tick),
                Some(command) = self.commands_rx.recv() => {
                    if self.handle_command(command).await == LoopControl::Exit {
                        break;
                    }
                }
                _ = tray_pump.tick() => self.pump_tray(),
            }
        }
        self.dispose().await;
        Ok(())
    }

    /// Applies a tick from a tick source.
    pub fn on_tick(&mut self, tick: Tick) {
        let applied = match tick.target {
            TickTarget::Countdown => self.countdown.on_tick(&tick),
            TickTarget::Stopwatch => self.stopwatch.on_tick(&tick),
        };
        if applied {
            self.after_mutation();
        }
    }

    /// Charges both engines up to `now_ms` without a tick source.
    ///
    /// Engines that are not running ignore it.
    pub fn manual_tick(&mut self, now_ms: i64) {
        self.countdown.tick(now_ms);
        self.stopwatch.tick(now_ms);
        self.after_mutation();
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Executes one command against the engine selected by the mode setting.
    pub async fn handle_command(&mut self, command: AppCommand) -> LoopControl {
        if self.disposed {
            return LoopControl::Exit;
        }
        tracing::info!(command = command.name(), "コマンド実行");
        let mode = self.mode();

        match command {
            AppCommand::Start => match mode {
                TimerMode::Countdown => self.countdown.start(),
                TimerMode::Stopwatch => self.stopwatch.start(),
            },
            AppCommand::Pause => match mode {
                TimerMode::Countdown => self.countdown.pause(),
                TimerMode::Stopwatch => self.stopwatch.pause(),
            },
            AppCommand::Reset => match mode {
                TimerMode::Countdown => {
                    self.countdown.reset();
                    self.schedule_effect("release-window", |d| d.release_main_window());
                }
                TimerMode::Stopwatch => self.stopwatch.stop(),
            },
            AppCommand::Stop => {
                if mode == TimerMode::Stopwatch {
                    self.stopwatch.stop();
                } else {
                    tracing::debug!("カウントダウンモードでは停止コマンドを無視します");
                }
            }
            AppCommand::SkipBreak => match mode {
                TimerMode::Countdown => self.end_countdown_break(),
                TimerMode::Stopwatch => self.end_stopwatch_break(),
            },
            AppCommand::StartBreak => {
                if mode == TimerMode::Stopwatch {
                    self.start_stopwatch_break();
                } else {
                    tracing::debug!("カウントダウンモードでは休憩開始コマンドを無視します");
                }
            }
            AppCommand::ConfirmSession {
                name,
                category,
                take_break,
            } => {
                if let Err(e) = self
                    .confirm_stopwatch_session(name, category, take_break)
                    .await
                {
                    tracing::error!(error = %e, "セッションの記録に失敗しました");
                }
            }
            AppCommand::DiscardSession => {
                if self.pending_session.take().is_some() {
                    tracing::info!("セッションを破棄しました");
                }
            }
            AppCommand::SetCategory(category) => self.set_category(category),
            AppCommand::SetMode(mode) => self.set_mode(mode),
            AppCommand::UpdateSetting { key, value } => {
                if let Err(e) = self.update_setting(&key, value) {
                    tracing::warn!(key = %key, error = %e, "設定の更新に失敗しました");
                }
            }
            AppCommand::ShowMain => self.show_main_window(),
            AppCommand::OpenSettings => {
                self.show_main_window();
                if let Err(e) = self.bus.emit(channels::OPEN_SETTINGS, Value::Null) {
                    tracing::warn!(error = %e, "設定画面を開けませんでした");
                }
            }
            AppCommand::RequestClose => {
                if self.request_close() == CloseOutcome::Exit {
                    return LoopControl::Exit;
                }
            }
            AppCommand::ConfirmClose { minimize, remember } => {
                if self.confirm_close(minimize, remember) == LoopControl::Exit {
                    return LoopControl::Exit;
                }
            }
            AppCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            AppCommand::Quit => {
                self.save_state();
                return LoopControl::Exit;
            }
        }

        self.after_mutation();
        LoopControl::Continue
    }

    /// The user ended the countdown break.
    ///
    /// Unpins the main window and leaves the break without the end sound.
    pub fn end_countdown_break(&mut self) {
        self.schedule_effect("release-window", |d| d.release_main_window());
        self.countdown.skip_break(true);
    }

    /// The user ended the stopwatch break.
    pub fn end_stopwatch_break(&mut self) {
        self.stopwatch.end_break();
    }

    /// Starts a stopwatch break of the configured length.
    ///
    /// A work session with time on it is stopped first, so it becomes the
    /// pending session instead of being lost. Ignored during a break, which
    /// keeps its elapsed time until it is ended.
    pub fn start_stopwatch_break(&mut self) {
        if self.stopwatch.phase() == StopwatchPhase::Break {
            tracing::debug!("すでに休憩中のため休憩開始を無視します");
            return;
        }
        if self.stopwatch.elapsed_ms() > 0 {
            self.stopwatch.stop();
        }
        let target_ms = self.settings.get().stopwatch_break_ms();
        self.stopwatch.start_break(target_ms);
    }

    /// Saves the pending stopwatch session and optionally starts a break.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no pending session or the record could
    /// not be stored. The session stays pending on failure.
    pub async fn confirm_stopwatch_session(
        &mut self,
        name: String,
        category: Option<String>,
        take_break: bool,
    ) -> anyhow::Result<TimerRecord> {
        let session = self
            .pending_session
            .context("記録待ちのセッションがありません")?;

        let dispatcher = self.dispatcher.clone();
        let record = tokio::task::spawn_blocking(move || {
            dispatcher.record_stopwatch_session(session, &name, category.as_deref())
        })
        .await
        .context("記録タスクが異常終了しました")?
        .context("セッションの記録に失敗しました")?;

        self.pending_session = None;
        if take_break {
            let target_ms = self.settings.get().stopwatch_break_ms();
            self.stopwatch.start_break(target_ms);
        }
        self.after_mutation();
        Ok(record)
    }

    pub fn set_category(&mut self, category: String) {
        let category = category.trim();
        self.countdown_category = if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category.to_string()
        };
    }

    /// Switches the active engine. The engine being left is paused.
    pub fn set_mode(&mut self, mode: TimerMode) {
        let current = self.mode();
        if current == mode {
            return;
        }
        match current {
            TimerMode::Countdown => self.countdown.pause(),
            TimerMode::Stopwatch => self.stopwatch.pause(),
        }
        self.settings.update(|s| s.timer_mode = mode);
        if let Err(e) = self.settings.save_one("timerMode") {
            tracing::warn!(error = %e, "モードの保存に失敗しました");
        }
        tracing::info!(mode = mode.as_str(), "モードを切り替えました");
        self.after_mutation();
    }

    /// Changes one setting, persists it and applies it to the engines and
    /// the floating window.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, ill-typed values or store failures.
    pub fn update_setting(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.settings.set_value(key, value)?;
        self.apply_settings();
        Ok(())
    }

    /// Pushes the current settings into the engines and the floating window.
    pub fn apply_settings(&mut self) {
        let (durations, reminder) = {
            let s = self.settings.get();
            (s.countdown_durations(), s.stopwatch_reminder_ms())
        };
        self.countdown.update_durations(durations);
        self.stopwatch.set_reminder_time(reminder);
        self.sync_floating_window();
        self.after_mutation();
    }

    // ------------------------------------------------------------------------
    // Windows
    // ------------------------------------------------------------------------

    pub fn show_main_window(&self) {
        if let Err(e) = self.main_window.show() {
            tracing::warn!(error = %e, "メインウィンドウを表示できませんでした");
        }
        if let Err(e) = self.main_window.focus() {
            tracing::warn!(error = %e, "メインウィンドウにフォーカスできませんでした");
        }
    }

    /// Handles the main window's close button according to `closeBehavior`.
    ///
    /// Window geometry and the floating position are saved first in every
    /// case.
    pub fn request_close(&mut self) -> CloseOutcome {
        self.save_window_state();
        self.save_floating_position();

        match self.settings.get().close_behavior {
            CloseBehavior::Quit => {
                self.save_state();
                CloseOutcome::Exit
            }
            CloseBehavior::Minimize => {
                self.hide_main_window();
                CloseOutcome::Hidden
            }
            CloseBehavior::Ask => {
                self.close_prompt_open = true;
                if let Err(e) = self.bus.emit(channels::CLOSE_REQUESTED, Value::Null) {
                    tracing::warn!(error = %e, "終了確認を表示できませんでした");
                }
                CloseOutcome::PromptShown
            }
        }
    }

    /// Applies the answer to the close prompt.
    ///
    /// With `remember`, the choice becomes the new `closeBehavior`.
    pub fn confirm_close(&mut self, minimize: bool, remember: bool) -> LoopControl {
        self.close_prompt_open = false;
        if remember {
            let behavior = if minimize {
                CloseBehavior::Minimize
            } else {
                CloseBehavior::Quit
            };
            self.settings.update(|s| s.close_behavior = behavior);
            if let Err(e) = self.settings.save() {
                tracing::warn!(error = %e, "終了動作の保存に失敗しました");
            }
        }

        if minimize {
            self.hide_main_window();
            LoopControl::Continue
        } else {
            self.save_state();
            LoopControl::Exit
        }
    }

    /// Saves window geometry, the floating window position and every setting.
    pub fn save_state(&mut self) {
        self.save_window_state();
        self.save_floating_position();
        match self.settings.save() {
            Ok(()) => tracing::info!("状態を保存しました"),
            Err(e) => tracing::warn!(error = %e, "設定の保存に失敗しました"),
        }
    }

    fn hide_main_window(&self) {
        if let Err(e) = self.main_window.hide() {
            tracing::warn!(error = %e, "メインウィンドウを隠せませんでした");
        }
    }

    /// Copies the main window geometry (logical units) into the settings.
    fn save_window_state(&mut self) {
        match logical_geometry(self.main_window.as_ref()) {
            Ok((size, position)) => self.settings.update(|s| {
                s.window_width = size.width.round() as i64;
                s.window_height = size.height.round() as i64;
                s.window_x = Some(position.x.round() as i64);
                s.window_y = Some(position.y.round() as i64);
            }),
            Err(e) => tracing::warn!(error = %e, "ウィンドウ状態の取得に失敗しました"),
        }
    }

    /// Copies the floating window position into the settings while it is shown.
    fn save_floating_position(&mut self) {
        if !self.floating_enabled {
            return;
        }
        let window = self.floating_window.as_ref();
        let position = window
            .scale_factor()
            .and_then(|scale| Ok(window.inner_position()?.to_logical(scale)));
        match position {
            Ok(position) => self.settings.update(|s| {
                s.floating_window_x = Some(position.x.round() as i64);
                s.floating_window_y = Some(position.y.round() as i64);
            }),
            Err(e) => tracing::warn!(error = %e, "フローティングウィンドウの位置取得に失敗しました"),
        }
    }

    /// Brings the floating window in line with the settings.
    ///
    /// Enabling restores the saved position, shows the window and sends the
    /// current state at once. Disabling saves the position and hides it.
    fn sync_floating_window(&mut self) {
        let (enabled, size, position) = {
            let s = self.settings.get();
            (
                s.enable_floating_window,
                (s.floating_window_width, s.floating_window_height),
                s.floating_window_x.zip(s.floating_window_y),
            )
        };

        if enabled != self.floating_enabled {
            if enabled {
                let window = self.floating_window.as_ref();
                if let Some((x, y)) = position {
                    warn_on_err(
                        window.set_position(LogicalPosition::new(x as f64, y as f64)),
                        "フローティングウィンドウの位置復元",
                    );
                }
                warn_on_err(
                    window.set_size(LogicalSize::new(size.0 as f64, size.1 as f64)),
                    "フローティングウィンドウのサイズ変更",
                );
                warn_on_err(window.show(), "フローティングウィンドウの表示");
                self.floating_enabled = true;
                self.floating_size = size;

                let input = SyncInput {
                    settings: self.settings.get(),
                    countdown: self.countdown.snapshot(),
                    stopwatch: self.stopwatch.snapshot(),
                };
                self.broadcaster.force_floating(&input);
                tracing::debug!("フローティングウィンドウを有効化しました");
            } else {
                self.save_floating_position();
                warn_on_err(self.floating_window.hide(), "フローティングウィンドウの非表示");
                self.floating_enabled = false;
                self.broadcaster.reset_floating_cache();
                tracing::debug!("フローティングウィンドウを無効化しました");
            }
        } else if enabled && size != self.floating_size {
            warn_on_err(
                self.floating_window
                    .set_size(LogicalSize::new(size.0 as f64, size.1 as f64)),
                "フローティングウィンドウのサイズ変更",
            );
            self.floating_size = size;
        }
    }

    // ------------------------------------------------------------------------
    // Events and effects
    // ------------------------------------------------------------------------

    /// Drains engine events and publishes the resulting state.
    pub fn after_mutation(&mut self) {
        while let Ok(event) = self.countdown_events.try_recv() {
            self.on_countdown_event(event);
        }
        while let Ok(event) = self.stopwatch_events.try_recv() {
            self.on_stopwatch_event(event);
        }
        self.publish();
    }

    fn publish(&mut self) {
        let input = SyncInput {
            settings: self.settings.get(),
            countdown: self.countdown.snapshot(),
            stopwatch: self.stopwatch.snapshot(),
        };
        self.broadcaster.publish(&input);
    }

    fn on_countdown_event(&mut self, event: CountdownEvent) {
        let fx = EffectSettings::from(self.settings.get());
        let category = self.countdown_category.clone();

        match event {
            CountdownEvent::WorkEnded {
                cycle_count,
                duration_ms,
                ended_at_ms,
            } => {
                tracing::info!(cycle_count, "作業時間が終了しました");
                self.schedule_effect("work-end", move |d| {
                    d.on_countdown_work_end(duration_ms, ended_at_ms, &category, fx)
                });
            }
            CountdownEvent::BreakEnded {
                reason: BreakEndReason::TargetReached,
                ..
            } => {
                tracing::info!("休憩時間が終了しました");
                self.schedule_effect("break-target", move |d| d.on_countdown_break_target(fx));
            }
            CountdownEvent::BreakEnded {
                reason: BreakEndReason::EndedByUser { silent },
                elapsed_ms,
                ended_at_ms,
            } => {
                tracing::info!(elapsed_ms, "休憩を終了しました");
                self.schedule_effect("break-end", move |d| {
                    d.on_countdown_break_end(elapsed_ms, ended_at_ms, &category, silent, fx)
                });
            }
        }
    }

    fn on_stopwatch_event(&mut self, event: StopwatchEvent) {
        let fx = EffectSettings::from(self.settings.get());

        match event {
            StopwatchEvent::ReminderReached { elapsed_ms } => {
                tracing::info!(elapsed_ms, "リマインダー時間に到達しました");
                self.schedule_effect("reminder", move |d| d.on_stopwatch_reminder(fx));
            }
            StopwatchEvent::WorkSessionEnded {
                duration_ms,
                ended_at_ms,
            } => {
                let session = PendingSession {
                    duration_ms,
                    ended_at_ms,
                };
                if let Some(previous) = self.pending_session {
                    tracing::warn!(
                        discarded_ms = previous.duration_ms,
                        "未保存のセッションを新しいセッションで置き換えます"
                    );
                }
                tracing::info!(duration_ms, "セッションの記録待ち");
                if let Err(e) = emit_json(
                    self.bus.as_ref(),
                    channels::SESSION_PENDING,
                    &serde_json::json!({ "durationMs": duration_ms, "endedAtMs": ended_at_ms }),
                ) {
                    tracing::warn!(error = %e, "セッション通知の送信に失敗しました");
                }
                self.pending_session = Some(session);
            }
            StopwatchEvent::BreakTargetReached { target_ms, .. } => {
                tracing::info!(target_ms, "休憩目標時間に到達しました");
                self.schedule_effect("break-target", move |d| d.on_stopwatch_break_target(fx));
            }
            StopwatchEvent::BreakEnded {
                elapsed_ms,
                ended_at_ms,
            } => {
                tracing::info!(elapsed_ms, "休憩を終了しました");
                self.schedule_effect("break-end", move |d| {
                    d.on_stopwatch_break_end(elapsed_ms, ended_at_ms);
                    d.release_main_window();
                });
            }
        }
    }

    /// Queues an effect behind the previous one and runs it off the loop.
    fn schedule_effect<F>(&mut self, name: &'static str, effect: F)
    where
        F: FnOnce(&SideEffectDispatcher) + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            effect(&dispatcher);
            return;
        };

        let previous = self.effects.take();
        self.effects = Some(handle.spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if let Err(e) = tokio::task::spawn_blocking(move || effect(&dispatcher)).await {
                tracing::warn!(effect = name, error = %e, "副作用の実行に失敗しました");
            }
        }));
    }

    /// Waits until every queued effect has run.
    pub async fn flush_effects(&mut self) {
        if let Some(effects) = self.effects.take() {
            let _ = effects.await;
        }
    }

    fn pump_tray(&mut self) {
        if let Some(tray) = self.tray.as_mut() {
            tray.manager.pump();
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Detaches listeners, stops both engines and waits for queued effects.
    ///
    /// Safe to call more than once.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(mut listener) = self.listener.take() {
            listener.detach();
        }
        self.countdown.dispose();
        self.stopwatch.dispose();
        self.flush_effects().await;

        if let Some(mut tray) = self.tray.take() {
            tray.manager.shutdown();
        }
        tracing::info!("アプリケーションを終了しました");
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn mode(&self) -> TimerMode {
        self.settings.get().timer_mode
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    pub fn countdown(&self) -> CountdownSnapshot {
        self.countdown.snapshot()
    }

    pub fn stopwatch(&self) -> StopwatchSnapshot {
        self.stopwatch.snapshot()
    }

    pub fn pending_session(&self) -> Option<PendingSession> {
        self.pending_session
    }

    pub fn category(&self) -> &str {
        &self.countdown_category
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn status(&self) -> StatusReport {
        let input = SyncInput {
            settings: self.settings.get(),
            countdown: self.countdown.snapshot(),
            stopwatch: self.stopwatch.snapshot(),
        };
        StatusReport {
            mode: self.mode(),
            countdown: input.countdown,
            stopwatch: input.stopwatch,
            tray_state: tray_icon_state(&input),
            category: self.countdown_category.clone(),
            pending_session: self.pending_session,
            close_prompt_open: self.close_prompt_open,
            floating_window: self.floating_enabled,
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("mode", &self.mode())
            .field("countdown", &self.countdown.snapshot())
            .field("stopwatch", &self.stopwatch.snapshot())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

type Tickers = (Box<dyn TickScheduler>, Box<dyn TickScheduler>);

/// One tick source per engine. Manual mode drops the sender, which disables
/// the tick branch of the event loop.
fn tickers(
    mode: TickMode,
    clock: &Arc<dyn Clock>,
    tick_tx: mpsc::UnboundedSender<Tick>,
) -> Tickers {
    match mode {
        TickMode::Interval { period_ms } => (
            Box::new(IntervalTicker::new(
                TickTarget::Countdown,
                period_ms,
                Arc::clone(clock),
                tick_tx.clone(),
            )),
            Box::new(IntervalTicker::new(
                TickTarget::Stopwatch,
                period_ms,
                Arc::clone(clock),
                tick_tx,
            )),
        ),
        TickMode::Manual => (Box::new(ManualTicker::new()), Box::new(ManualTicker::new())),
    }
}

/// Applies the saved size and position, then shows the window.
fn restore_main_window(window: &dyn WindowHandle, settings: &SettingsManager) {
    let s = settings.get();
    warn_on_err(
        window.set_size(LogicalSize::new(s.window_width as f64, s.window_height as f64)),
        "ウィンドウサイズの復元",
    );
    if let (Some(x), Some(y)) = (s.window_x, s.window_y) {
        warn_on_err(
            window.set_position(LogicalPosition::new(x as f64, y as f64)),
            "ウィンドウ位置の復元",
        );
    }
    warn_on_err(window.show(), "ウィンドウの表示");
}

fn create_tray(bus: &Arc<dyn EventBus>) -> anyhow::Result<Tray> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let bridge = TrayBridge::attach(Arc::clone(bus), tx).context("トレイの接続に失敗しました")?;
    let mut manager = TrayIconManager::new(rx, Arc::clone(bus));
    if let Err(e) = manager.initialize() {
        tracing::warn!(error = %e, "トレイアイコンを作成できませんでした");
    }
    Ok(Tray {
        manager,
        _bridge: bridge,
    })
}

fn warn_on_err<E: std::fmt::Display>(result: Result<(), E>, action: &str) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "{}に失敗しました", action);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{LocalEventBus, MessageLog};
    use crate::clock::ManualClock;
    use crate::notification::MockNotificationService;
    use crate::sound::MockAudioService;
    use crate::store::{MemoryRecordStore, MemorySettingsStore};
    use crate::types::{CountdownPhase, RecordPhase, RecordType};
    use crate::window::{MockWindow, PhysicalPosition, PhysicalSize, WindowCall};
    use serde_json::json;

    const START_MS: i64 = 1_700_000_000_000;

    struct Harness {
        app: AppContext,
        clock: Arc<ManualClock>,
        settings_store: Arc<MemorySettingsStore>,
        records: Arc<MemoryRecordStore>,
        main: Arc<MockWindow>,
        floating: Arc<MockWindow>,
        notifier: Arc<MockNotificationService>,
        audio: Arc<MockAudioService>,
        bus: Arc<LocalEventBus>,
        state_log: MessageLog,
        tray_log: MessageLog,
    }

    impl Harness {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self::build(entries, false)
        }

        fn build(entries: &[(&str, &str)], failing_store: bool) -> Self {
            let clock = Arc::new(ManualClock::new(START_MS));
            let settings_store = Arc::new(MemorySettingsStore::with_entries(entries.iter().copied()));
            settings_store.set_should_fail(failing_store);
            let records = Arc::new(MemoryRecordStore::new());
            let main = Arc::new(MockWindow::new());
            let floating = Arc::new(MockWindow::new());
            let notifier = Arc::new(MockNotificationService::new());
            let audio = Arc::new(MockAudioService::new());
            let bus = Arc::new(LocalEventBus::new());
            let state_log = MessageLog::attach(bus.as_ref(), channels::TIMER_STATE_SYNC).unwrap();
            let tray_log = MessageLog::attach(bus.as_ref(), channels::TRAY_ICON_STATE).unwrap();

            let services = Services {
                settings_store: settings_store.clone(),
                records: records.clone(),
                main_window: main.clone(),
                floating_window: floating.clone(),
                notifier: notifier.clone(),
                audio: audio.clone(),
                bus: bus.clone(),
                clock: clock.clone(),
            };
            let config = AppConfig {
                tick: TickMode::Manual,
                sound_dir: PathBuf::from("/sounds"),
                enable_tray: false,
            };
            let app = AppContext::init(services, config).unwrap();
            settings_store.set_should_fail(false);

            Self {
                app,
                clock,
                settings_store,
                records,
                main,
                floating,
                notifier,
                audio,
                bus,
                state_log,
                tray_log,
            }
        }

        /// One-minute work and break intervals.
        fn short() -> Self {
            Self::new(&[
                ("workDurationMinutes", "1"),
                ("breakDurationMinutes", "1"),
                ("stopwatchBreakMinutes", "2"),
            ])
        }

        async fn send(&mut self, command: AppCommand) -> LoopControl {
            self.app.handle_command(command).await
        }

        fn advance(&mut self, delta_ms: i64) {
            let now = self.clock.advance(delta_ms);
            self.app.manual_tick(now);
        }
    }

    mod init_tests {
        use super::*;

        #[tokio::test]
        async fn test_restores_saved_geometry_then_shows() {
            let h = Harness::new(&[
                ("windowWidth", "800"),
                ("windowHeight", "600"),
                ("windowX", "10"),
                ("windowY", "20"),
            ]);
            assert_eq!(
                h.main.calls(),
                vec![
                    WindowCall::SetSize(LogicalSize::new(800.0, 600.0)),
                    WindowCall::SetPosition(LogicalPosition::new(10.0, 20.0)),
                    WindowCall::Show,
                ]
            );
        }

        #[tokio::test]
        async fn test_default_size_without_position() {
            let h = Harness::new(&[]);
            assert_eq!(
                h.main.calls(),
                vec![
                    WindowCall::SetSize(LogicalSize::new(450.0, 550.0)),
                    WindowCall::Show
                ]
            );
        }

        #[tokio::test]
        async fn test_floating_window_shown_when_enabled() {
            let h = Harness::new(&[("floatingWindowX", "300"), ("floatingWindowY", "40")]);
            assert_eq!(
                h.floating.calls(),
                vec![
                    WindowCall::SetPosition(LogicalPosition::new(300.0, 40.0)),
                    WindowCall::SetSize(LogicalSize::new(150.0, 50.0)),
                    WindowCall::Show,
                ]
            );
            assert!(h.app.status().floating_window);
            assert_eq!(h.state_log.len(), 1);
        }

        #[tokio::test]
        async fn test_floating_window_untouched_when_disabled() {
            let h = Harness::new(&[("enableFloatingWindow", "false")]);
            assert!(h.floating.calls().is_empty());
            assert!(h.state_log.is_empty());
            assert_eq!(h.tray_log.last().unwrap()["state"], "idle");
        }

        #[tokio::test]
        async fn test_load_failure_keeps_defaults_and_skips_save() {
            let mut h = Harness::build(&[("workDurationMinutes", "5")], true);
            assert_eq!(h.app.countdown().remaining_ms, 25 * 60_000);

            assert_eq!(h.send(AppCommand::Quit).await, LoopControl::Exit);
            assert_eq!(h.settings_store.write_count(), 0);
            assert_eq!(h.settings_store.raw("workDurationMinutes").as_deref(), Some("5"));
        }

        #[tokio::test]
        async fn test_load_failure_blocks_single_key_writes() {
            let mut h = Harness::build(&[("timerMode", "\"countdown\"")], true);
            h.send(AppCommand::SetMode(TimerMode::Stopwatch)).await;
            let result = h.app.update_setting("workDurationMinutes", json!(40));

            assert!(result.is_ok());
            assert_eq!(h.app.mode(), TimerMode::Stopwatch);
            assert_eq!(h.settings_store.write_count(), 0);
            assert_eq!(
                h.settings_store.raw("timerMode").as_deref(),
                Some("\"countdown\"")
            );
        }
    }

    mod countdown_flow_tests {
        use super::*;

        #[tokio::test]
        async fn test_work_end_records_and_surfaces_window() {
            let mut h = Harness::short();
            h.send(AppCommand::SetCategory("writing".into())).await;
            h.send(AppCommand::Start).await;
            h.main.clear_calls();

            h.advance(60_000);
            h.app.flush_effects().await;

            let snapshot = h.app.countdown();
            assert_eq!(snapshot.phase, CountdownPhase::Break);
            assert_eq!(snapshot.cycle_count, 1);

            let records = h.records.records();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].record_type, RecordType::Countdown);
            assert_eq!(records[0].phase, Some(RecordPhase::Work));
            assert_eq!(records[0].duration, 60_000);
            assert_eq!(records[0].category.as_deref(), Some("writing"));

            assert_eq!(
                h.main.calls(),
                vec![
                    WindowCall::Show,
                    WindowCall::SetAlwaysOnTop(true),
                    WindowCall::Focus
                ]
            );
            assert_eq!(h.notifier.sent_count(), 1);
            assert_eq!(h.audio.played_files(), vec!["notification-piano.mp3"]);
            assert_eq!(h.tray_log.last().unwrap()["state"], "break");
        }

        #[tokio::test]
        async fn test_sounds_and_notification_follow_settings() {
            let mut h = Harness::new(&[
                ("workDurationMinutes", "1"),
                ("enableworkSound", "false"),
                ("enableNotification", "false"),
            ]);
            h.send(AppCommand::Start).await;
            h.advance(60_000);
            h.app.flush_effects().await;

            assert_eq!(h.records.len(), 1);
            assert_eq!(h.notifier.sent_count(), 0);
            assert_eq!(h.audio.play_count(), 0);
        }

        #[tokio::test]
        async fn test_break_target_plays_chime_without_record() {
            let mut h = Harness::short();
            h.send(AppCommand::Start).await;
            h.advance(60_000);
            h.advance(60_000);
            h.app.flush_effects().await;

            assert_eq!(h.records.len(), 1);
            assert_eq!(
                h.audio.played_files(),
                vec!["notification-piano.mp3", "notification-chime.mp3"]
            );
            // The break keeps counting past its target
            h.advance(5_000);
            assert_eq!(h.app.countdown().break_elapsed_ms, 65_000);
        }

        #[tokio::test]
        async fn test_user_ended_break_records_elapsed_and_releases_window() {
            let mut h = Harness::short();
            h.send(AppCommand::Start).await;
            h.advance(60_000);
            h.advance(20_000);
            h.app.flush_effects().await;
            h.main.clear_calls();

            h.send(AppCommand::SkipBreak).await;
            h.app.flush_effects().await;

            let records = h.records.records();
            assert_eq!(records.len(), 2);
            assert_eq!(records[1].phase, Some(RecordPhase::Break));
            assert_eq!(records[1].duration, 20_000);
            assert_eq!(records[1].category.as_deref(), Some("work"));
            assert_eq!(h.main.calls(), vec![WindowCall::SetAlwaysOnTop(false)]);
            // Ending the break by hand is silent
            assert_eq!(h.audio.play_count(), 1);
            assert_eq!(h.app.countdown().phase, CountdownPhase::Work);
        }

        #[tokio::test]
        async fn test_reset_keeps_cycle_count() {
            let mut h = Harness::short();
            h.send(AppCommand::Start).await;
            h.advance(60_000);
            h.send(AppCommand::Reset).await;

            let snapshot = h.app.countdown();
            assert_eq!(snapshot.phase, CountdownPhase::Idle);
            assert_eq!(snapshot.remaining_ms, 60_000);
            assert_eq!(snapshot.cycle_count, 1);
        }

        #[tokio::test]
        async fn test_stop_is_ignored_in_countdown_mode() {
            let mut h = Harness::short();
            h.send(AppCommand::Start).await;
            h.advance(10_000);
            h.send(AppCommand::Stop).await;
            assert!(h.app.countdown().is_running);
        }
    }

    mod stopwatch_flow_tests {
        use super::*;

        async fn stopwatch() -> Harness {
            let mut h = Harness::short();
            h.send(AppCommand::SetMode(TimerMode::Stopwatch)).await;
            h
        }

        #[tokio::test]
        async fn test_stop_leaves_pending_session() {
            let mut h = stopwatch().await;
            h.send(AppCommand::Start).await;
            h.advance(90_000);
            h.send(AppCommand::Stop).await;

            let pending = h.app.pending_session().unwrap();
            assert_eq!(pending.duration_ms, 90_000);
            assert_eq!(pending.ended_at_ms, START_MS + 90_000);
            assert_eq!(h.app.stopwatch().elapsed_ms, 0);
            assert!(h.records.is_empty());
        }

        #[tokio::test]
        async fn test_confirm_session_saves_record_and_starts_break() {
            let mut h = stopwatch().await;
            h.send(AppCommand::Start).await;
            h.advance(90_000);
            h.send(AppCommand::Stop).await;

            h.send(AppCommand::ConfirmSession {
                name: "設計レビュー".into(),
                category: Some("review".into()),
                take_break: true,
            })
            .await;

            let records = h.records.records();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].record_type, RecordType::Stopwatch);
            assert_eq!(records[0].name.as_deref(), Some("設計レビュー"));
            assert_eq!(records[0].category.as_deref(), Some("review"));
            assert_eq!(records[0].duration, 90_000);
            assert!(h.app.pending_session().is_none());

            let snapshot = h.app.stopwatch();
            assert_eq!(snapshot.phase, StopwatchPhase::Break);
            assert!(snapshot.is_running);
            assert_eq!(h.tray_log.last().unwrap()["state"], "break");
        }

        #[tokio::test]
        async fn test_confirm_failure_keeps_session_pending() {
            let mut h = stopwatch().await;
            h.send(AppCommand::Start).await;
            h.advance(30_000);
            h.send(AppCommand::Stop).await;
            h.records.set_should_fail(true);

            let result = h
                .app
                .confirm_stopwatch_session("x".into(), None, true)
                .await;
            assert!(result.is_err());
            assert!(h.app.pending_session().is_some());
            assert_eq!(h.app.stopwatch().phase, StopwatchPhase::Work);
        }

        #[tokio::test]
        async fn test_confirm_without_pending_session_fails() {
            let mut h = stopwatch().await;
            let result = h.app.confirm_stopwatch_session("x".into(), None, false).await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_break_end_records_break_category() {
            let mut h = stopwatch().await;
            h.send(AppCommand::StartBreak).await;
            h.advance(150_000);
            h.send(AppCommand::SkipBreak).await;
            h.app.flush_effects().await;

            let records = h.records.records();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].phase, Some(RecordPhase::Break));
            assert_eq!(records[0].category.as_deref(), Some("break"));
            assert_eq!(records[0].duration, 150_000);
            // The 2 minute target was crossed once
            assert_eq!(h.audio.played_files(), vec!["notification-chime.mp3"]);
            assert!(h.main.calls().contains(&WindowCall::SetAlwaysOnTop(false)));
        }

        #[tokio::test]
        async fn test_start_break_moves_running_work_to_pending() {
            let mut h = stopwatch().await;
            h.send(AppCommand::Start).await;
            h.advance(45_000);
            h.send(AppCommand::StartBreak).await;

            assert_eq!(h.app.pending_session().unwrap().duration_ms, 45_000);
            assert_eq!(h.app.stopwatch().phase, StopwatchPhase::Break);
        }

        #[tokio::test]
        async fn test_start_break_during_break_keeps_elapsed() {
            let mut h = stopwatch().await;
            h.send(AppCommand::StartBreak).await;
            h.advance(60_000);
            h.send(AppCommand::StartBreak).await;

            assert_eq!(h.app.stopwatch().elapsed_ms, 60_000);
            assert_eq!(h.app.stopwatch().phase, StopwatchPhase::Break);

            h.send(AppCommand::SkipBreak).await;
            h.app.flush_effects().await;
            let durations: Vec<i64> = h.records.records().iter().map(|r| r.duration).collect();
            assert_eq!(durations, vec![60_000]);
        }

        #[tokio::test]
        async fn test_second_stop_replaces_pending_session() {
            let mut h = stopwatch().await;
            let pending_log = MessageLog::attach(h.bus.as_ref(), channels::SESSION_PENDING).unwrap();
            h.send(AppCommand::Start).await;
            h.advance(30_000);
            h.send(AppCommand::Stop).await;
            h.send(AppCommand::Start).await;
            h.advance(5_000);
            h.send(AppCommand::Stop).await;

            assert_eq!(h.app.pending_session().unwrap().duration_ms, 5_000);
            assert_eq!(pending_log.len(), 2);
            assert_eq!(pending_log.last().unwrap()["durationMs"], 5_000);
            assert!(h.records.is_empty());
        }

        #[tokio::test]
        async fn test_set_mode_publishes_new_mode() {
            let mut h = Harness::short();
            h.app.set_mode(TimerMode::Stopwatch);

            let state = h.state_log.last().unwrap();
            assert_eq!(state["timerMode"], "stopwatch");
            assert_eq!(state["elapsedMs"], 0);
        }

        #[tokio::test]
        async fn test_reminder_fires_once() {
            let mut h = Harness::new(&[
                ("timerMode", "\"stopwatch\""),
                ("stopwatchReminderEnabled", "true"),
                ("stopwatchReminderMinutes", "1"),
            ]);
            h.send(AppCommand::Start).await;
            h.advance(59_000);
            h.advance(2_000);
            h.advance(60_000);
            h.app.flush_effects().await;

            assert_eq!(h.notifier.sent_count(), 1);
            assert_eq!(h.audio.played_files(), vec!["notification-piano.mp3"]);
        }

        #[tokio::test]
        async fn test_set_mode_pauses_previous_engine() {
            let mut h = Harness::short();
            h.send(AppCommand::Start).await;
            h.send(AppCommand::SetMode(TimerMode::Stopwatch)).await;

            assert!(!h.app.countdown().is_running);
            assert_eq!(h.app.mode(), TimerMode::Stopwatch);
            assert_eq!(
                h.settings_store.raw("timerMode").as_deref(),
                Some("\"stopwatch\"")
            );
        }
    }

    mod settings_tests {
        use super::*;

        #[tokio::test]
        async fn test_duration_change_applies_to_idle_countdown() {
            let mut h = Harness::short();
            h.send(AppCommand::UpdateSetting {
                key: "workDurationMinutes".into(),
                value: json!(10),
            })
            .await;

            assert_eq!(h.app.countdown().remaining_ms, 600_000);
            assert_eq!(
                h.settings_store.raw("workDurationMinutes").as_deref(),
                Some("10")
            );
        }

        #[tokio::test]
        async fn test_unknown_setting_is_rejected() {
            let mut h = Harness::short();
            let result = h.app.update_setting("noSuchKey", json!(1));
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_disable_floating_saves_position_and_hides() {
            let mut h = Harness::short();
            h.floating
                .place(PhysicalSize::new(150, 50), PhysicalPosition::new(300, 400));
            h.floating.clear_calls();

            h.app
                .update_setting("enableFloatingWindow", json!(false))
                .unwrap();

            assert_eq!(h.floating.calls(), vec![WindowCall::Hide]);
            assert_eq!(h.app.settings().get().floating_window_x, Some(300));
            assert_eq!(h.app.settings().get().floating_window_y, Some(400));
            assert!(!h.app.status().floating_window);
        }

        #[tokio::test]
        async fn test_reenable_floating_restores_and_resends_state() {
            let mut h = Harness::short();
            h.floating
                .place(PhysicalSize::new(150, 50), PhysicalPosition::new(300, 400));
            h.app
                .update_setting("enableFloatingWindow", json!(false))
                .unwrap();
            h.floating.clear_calls();
            h.state_log.clear();

            h.app
                .update_setting("enableFloatingWindow", json!(true))
                .unwrap();

            assert_eq!(
                h.floating.calls(),
                vec![
                    WindowCall::SetPosition(LogicalPosition::new(300.0, 400.0)),
                    WindowCall::SetSize(LogicalSize::new(150.0, 50.0)),
                    WindowCall::Show,
                ]
            );
            // Unchanged state is still sent once on enable
            assert_eq!(h.state_log.len(), 1);
        }

        #[tokio::test]
        async fn test_floating_resize() {
            let mut h = Harness::short();
            let sizes = MessageLog::attach(h.bus.as_ref(), channels::FLOAT_SIZE_SYNC).unwrap();
            h.floating.clear_calls();

            h.app.update_setting("floatingWindowWidth", json!(200)).unwrap();

            assert_eq!(
                h.floating.calls(),
                vec![WindowCall::SetSize(LogicalSize::new(200.0, 50.0))]
            );
            assert_eq!(sizes.last().unwrap(), json!({"width": 200, "height": 50}));
        }
    }

    mod close_tests {
        use super::*;

        #[tokio::test]
        async fn test_ask_shows_prompt() {
            let mut h = Harness::short();
            let prompts = MessageLog::attach(h.bus.as_ref(), channels::CLOSE_REQUESTED).unwrap();

            assert_eq!(h.app.request_close(), CloseOutcome::PromptShown);
            assert!(h.app.status().close_prompt_open);
            assert_eq!(prompts.len(), 1);
        }

        #[tokio::test]
        async fn test_minimize_behavior_hides() {
            let mut h = Harness::new(&[("closeBehavior", "\"minimize\"")]);
            h.main.clear_calls();

            assert_eq!(
                h.send(AppCommand::RequestClose).await,
                LoopControl::Continue
            );
            assert_eq!(h.main.calls(), vec![WindowCall::Hide]);
        }

        #[tokio::test]
        async fn test_quit_behavior_saves_geometry_and_exits() {
            let mut h = Harness::new(&[("closeBehavior", "\"quit\"")]);
            h.main
                .place(PhysicalSize::new(1000, 800), PhysicalPosition::new(40, 60));
            h.floating
                .place(PhysicalSize::new(150, 50), PhysicalPosition::new(700, 20));

            assert_eq!(h.send(AppCommand::RequestClose).await, LoopControl::Exit);

            let raw = |key: &str| h.settings_store.raw(key);
            assert_eq!(raw("windowWidth").as_deref(), Some("1000"));
            assert_eq!(raw("windowHeight").as_deref(), Some("800"));
            assert_eq!(raw("windowX").as_deref(), Some("40"));
            assert_eq!(raw("windowY").as_deref(), Some("60"));
            assert_eq!(raw("floatingWindowX").as_deref(), Some("700"));
            assert_eq!(raw("floatingWindowY").as_deref(), Some("20"));
        }

        #[tokio::test]
        async fn test_confirm_close_remembers_minimize() {
            let mut h = Harness::short();
            h.app.request_close();
            h.main.clear_calls();

            assert_eq!(h.app.confirm_close(true, true), LoopControl::Continue);
            assert!(!h.app.status().close_prompt_open);
            assert_eq!(h.main.calls(), vec![WindowCall::Hide]);
            assert_eq!(
                h.settings_store.raw("closeBehavior").as_deref(),
                Some("\"minimize\"")
            );
        }

        #[tokio::test]
        async fn test_confirm_close_without_remember_keeps_ask() {
            let mut h = Harness::short();
            h.app.request_close();

            assert_eq!(h.app.confirm_close(false, false), LoopControl::Exit);
            assert_eq!(h.app.settings().get().close_behavior, CloseBehavior::Ask);
        }
    }

    mod loop_tests {
        use super::*;

        #[tokio::test]
        async fn test_bus_commands_drive_run_loop() {
            let mut h = Harness::short();
            h.bus.emit(channels::TRAY_START, Value::Null).unwrap();
            h.bus.emit(channels::TRAY_QUIT, Value::Null).unwrap();

            h.app.run().await.unwrap();

            assert!(h.app.is_disposed());
            assert_eq!(h.app.countdown().phase, CountdownPhase::Work);
            // Only the two message logs remain after dispose
            assert_eq!(h.bus.listener_count(), 2);
        }

        #[tokio::test]
        async fn test_status_command_replies() {
            let mut h = Harness::short();
            h.send(AppCommand::Start).await;

            let (tx, rx) = tokio::sync::oneshot::channel();
            h.send(AppCommand::Status(tx)).await;
            let report = rx.await.unwrap();

            assert_eq!(report.mode, TimerMode::Countdown);
            assert_eq!(report.tray_state, TrayIconState::Working);
            assert_eq!(report.category, "work");
            assert!(report.countdown.is_running);
        }

        #[tokio::test]
        async fn test_open_settings_shows_and_emits() {
            let mut h = Harness::short();
            let opened = MessageLog::attach(h.bus.as_ref(), channels::OPEN_SETTINGS).unwrap();
            h.main.clear_calls();

            h.send(AppCommand::OpenSettings).await;

            assert_eq!(h.main.calls(), vec![WindowCall::Show, WindowCall::Focus]);
            assert_eq!(opened.len(), 1);
        }

        #[tokio::test]
        async fn test_commands_after_dispose_exit() {
            let mut h = Harness::short();
            h.app.dispose().await;
            h.app.dispose().await;
            assert_eq!(h.send(AppCommand::Start).await, LoopControl::Exit);
        }
    }
}
