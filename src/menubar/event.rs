//! Event handling for tray interactions.
//!
//! This module handles:
//! - Mapping tray menu item ids to actions
//! - Mapping actions to the bus channels the command listener consumes
//! - The update messages sent to the tray from the application loop
//!
//! The event types and mapping are platform-independent.

use std::fmt;

use crate::bus::channels;
use crate::types::TrayIconState;

// ============================================================================
// MenuAction
// ============================================================================

/// Actions that can be triggered from the tray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Start or resume the active timer
    Start,
    /// Pause the active timer
    Pause,
    /// Reset the countdown, or stop the stopwatch
    Reset,
    /// Show the main window on the settings page
    OpenSettings,
    /// Show the main window (left click on the icon)
    ShowMain,
    /// Save state and exit
    Quit,
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel())
    }
}

impl MenuAction {
    /// Returns the bus channel this action is published on.
    pub fn channel(&self) -> &'static str {
        match self {
            MenuAction::Start => channels::TRAY_START,
            MenuAction::Pause => channels::TRAY_PAUSE,
            MenuAction::Reset => channels::TRAY_RESET,
            MenuAction::OpenSettings => channels::TRAY_SETTINGS,
            MenuAction::ShowMain => channels::TRAY_SHOW,
            MenuAction::Quit => channels::TRAY_QUIT,
        }
    }

    /// Returns a human-readable description of this action.
    pub fn description(&self) -> &'static str {
        match self {
            MenuAction::Start => "開始",
            MenuAction::Pause => "一時停止",
            MenuAction::Reset => "リセット",
            MenuAction::OpenSettings => "設定",
            MenuAction::ShowMain => "ウィンドウを表示",
            MenuAction::Quit => "終了",
        }
    }
}

// ============================================================================
// MenuItemId
// ============================================================================

/// Identifiers for tray menu items.
///
/// The string form is the id given to the native menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuItemId {
    Start,
    Pause,
    Reset,
    Settings,
    Quit,
    /// Unknown or unhandled menu item
    Unknown,
}

impl MenuItemId {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuItemId::Start => "start",
            MenuItemId::Pause => "pause",
            MenuItemId::Reset => "reset",
            MenuItemId::Settings => "settings",
            MenuItemId::Quit => "quit",
            MenuItemId::Unknown => "unknown",
        }
    }

    /// Parses a native menu item id.
    pub fn from_id(id: &str) -> Self {
        match id {
            "start" => MenuItemId::Start,
            "pause" => MenuItemId::Pause,
            "reset" => MenuItemId::Reset,
            "settings" => MenuItemId::Settings,
            "quit" => MenuItemId::Quit,
            _ => MenuItemId::Unknown,
        }
    }

    /// Converts a menu item ID to the corresponding action.
    pub fn to_action(&self) -> Option<MenuAction> {
        match self {
            MenuItemId::Start => Some(MenuAction::Start),
            MenuItemId::Pause => Some(MenuAction::Pause),
            MenuItemId::Reset => Some(MenuAction::Reset),
            MenuItemId::Settings => Some(MenuAction::OpenSettings),
            MenuItemId::Quit => Some(MenuAction::Quit),
            MenuItemId::Unknown => None,
        }
    }
}

// ============================================================================
// EventHandler
// ============================================================================

/// Converts tray interactions to actions.
#[derive(Debug, Default)]
pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    /// Processes a menu item click and returns the corresponding action.
    pub fn handle_click(&self, item_id: MenuItemId) -> Option<MenuAction> {
        let action = item_id.to_action();

        match action {
            Some(ref action) => tracing::info!(action = %action, "メニューからアクションを受信"),
            None => tracing::debug!(id = item_id.as_str(), "未対応のメニュー項目"),
        }

        action
    }

    /// A left click on the icon shows the main window.
    pub fn handle_icon_click(&self) -> MenuAction {
        tracing::debug!("トレイアイコンがクリックされました");
        MenuAction::ShowMain
    }
}

// ============================================================================
// TrayUpdate
// ============================================================================

/// Updates sent to the tray from the application loop.
///
/// Sent over a crossbeam channel so the tray can live on whichever thread
/// owns the native event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TrayUpdate {
    /// The tray icon state changed
    SetState(TrayIconState),
    /// Time shown next to the icon (remaining or elapsed)
    SetClock(i64),
    /// Shutdown the tray icon
    Shutdown,
}

// ============================================================================
// Tests
// ============================================================================
