//! Inbound commands from the tray icon and the floating window.
//!
//! Both surfaces publish bare events on the bus (`tray-start`,
//! `float-pause`, ...). [`CommandListener`] subscribes to those channels and
//! forwards the matching [`AppCommand`] to the application loop, which
//! dispatches it to the engine selected by the mode setting.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::bus::{channels, BusError, EventBus, ListenerId};
use crate::types::TimerMode;

// ============================================================================
// AppCommand
// ============================================================================

/// Commands accepted by the application loop.
#[derive(Debug)]
pub enum AppCommand {
    /// Start or resume the active engine
    Start,
    /// Pause the active engine
    Pause,
    /// Reset the countdown, or stop the stopwatch
    Reset,
    /// Stop the stopwatch; ignored in countdown mode
    Stop,
    /// Leave the current break
    SkipBreak,
    /// Start a stopwatch break of the configured length
    StartBreak,
    /// Save the pending stopwatch session
    ConfirmSession {
        name: String,
        category: Option<String>,
        take_break: bool,
    },
    /// Drop the pending stopwatch session without saving
    DiscardSession,
    /// Category used for the next countdown work record
    SetCategory(String),
    /// Switch between countdown and stopwatch
    SetMode(TimerMode),
    /// Change one setting and apply it
    UpdateSetting { key: String, value: Value },
    ShowMain,
    OpenSettings,
    /// The user tried to close the main window
    RequestClose,
    /// Answer to the close prompt
    ConfirmClose { minimize: bool, remember: bool },
    /// Report the current state
    Status(oneshot::Sender<crate::app::StatusReport>),
    Quit,
}

impl AppCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AppCommand::Start => "start",
            AppCommand::Pause => "pause",
            AppCommand::Reset => "reset",
            AppCommand::Stop => "stop",
            AppCommand::SkipBreak => "skip-break",
            AppCommand::StartBreak => "start-break",
            AppCommand::ConfirmSession { .. } => "confirm-session",
            AppCommand::DiscardSession => "discard-session",
            AppCommand::SetCategory(_) => "set-category",
            AppCommand::SetMode(_) => "set-mode",
            AppCommand::UpdateSetting { .. } => "update-setting",
            AppCommand::ShowMain => "show-main",
            AppCommand::OpenSettings => "open-settings",
            AppCommand::RequestClose => "request-close",
            AppCommand::ConfirmClose { .. } => "confirm-close",
            AppCommand::Status(_) => "status",
            AppCommand::Quit => "quit",
        }
    }
}

/// Channels the listener subscribes to.
pub const INBOUND_CHANNELS: &[&str] = &[
    channels::TRAY_START,
    channels::TRAY_PAUSE,
    channels::TRAY_RESET,
    channels::TRAY_SETTINGS,
    channels::TRAY_QUIT,
    channels::TRAY_SHOW,
    channels::FLOAT_START,
    channels::FLOAT_PAUSE,
    channels::FLOAT_STOP,
    channels::FLOAT_SHOW_MAIN,
];

/// Maps an inbound channel to its command.
pub fn command_for_channel(channel: &str) -> Option<AppCommand> {
    let command = match channel {
        channels::TRAY_START | channels::FLOAT_START => AppCommand::Start,
        channels::TRAY_PAUSE | channels::FLOAT_PAUSE => AppCommand::Pause,
        channels::TRAY_RESET => AppCommand::Reset,
        channels::FLOAT_STOP => AppCommand::Stop,
        channels::TRAY_SETTINGS => AppCommand::OpenSettings,
        channels::TRAY_QUIT => AppCommand::Quit,
        channels::TRAY_SHOW | channels::FLOAT_SHOW_MAIN => AppCommand::ShowMain,
        _ => return None,
    };
    Some(command)
}

// ============================================================================
// CommandListener
// ============================================================================

/// Forwards tray and floating-window events to the application loop.
///
/// Subscriptions are removed by [`CommandListener::detach`] or on drop.
pub struct CommandListener {
    bus: Arc<dyn EventBus>,
    ids: Vec<ListenerId>,
}

impl CommandListener {
    /// Subscribes to every inbound channel.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscription fails. Subscriptions made before
    /// the failure are removed.
    pub fn attach(
        bus: Arc<dyn EventBus>,
        commands: mpsc::UnboundedSender<AppCommand>,
    ) -> Result<Self, BusError> {
        let mut listener = Self {
            bus: Arc::clone(&bus),
            ids: Vec::with_capacity(INBOUND_CHANNELS.len()),
        };

        for &channel in INBOUND_CHANNELS {
            let tx = commands.clone();
            let id = bus.listen(
                channel,
                Arc::new(move |_payload| {
                    let Some(command) = command_for_channel(channel) else {
                        return;
                    };
                    tracing::info!(channel, "コマンドを受信");
                    if tx.send(command).is_err() {
                        tracing::debug!(channel, "アプリケーションループは終了しています");
                    }
                }),
            )?;
            listener.ids.push(id);
        }

        tracing::debug!(count = listener.ids.len(), "コマンドリスナーを登録しました");
        Ok(listener)
    }

    pub fn is_attached(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Removes every subscription. Safe to call more than once.
    pub fn detach(&mut self) {
        for id in self.ids.drain(..) {
            if let Err(e) = self.bus.unlisten(id) {
                tracing::warn!(error = %e, "リスナーの解除に失敗しました");
            }
        }
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for CommandListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandListener")
            .field("subscriptions", &self.ids.len())
            .finish_non_exhaustive()
    }
}
