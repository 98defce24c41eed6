//! Menu configuration for the tray.
//!
//! This module handles:
//! - Menu item text and ids
//! - Which items are enabled for the current tray state
//!
//! The configuration logic is platform-independent and fully testable.
//! Native menu creation happens in the platform-specific code.

use super::event::MenuItemId;
use super::icon::{format_clock, TrayView};
use crate::types::TrayIconState;

// ============================================================================
// MenuItemConfig
// ============================================================================

/// Configuration for a menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemConfig {
    pub id: MenuItemId,
    /// Display text for the menu item
    pub text: String,
    /// Whether the menu item is enabled (clickable)
    pub enabled: bool,
}

impl MenuItemConfig {
    pub fn new(id: MenuItemId, text: impl Into<String>, enabled: bool) -> Self {
        Self {
            id,
            text: text.into(),
            enabled,
        }
    }

    /// A disabled informational line.
    pub fn label(text: impl Into<String>) -> Self {
        Self::new(MenuItemId::Unknown, text, false)
    }
}

// ============================================================================
// MenuConfig
// ============================================================================

/// Complete menu configuration for one tray state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuConfig {
    /// Title item (always disabled, shows app name)
    pub title: MenuItemConfig,
    /// Status lines (always disabled)
    pub status_items: Vec<MenuItemConfig>,
    pub start: MenuItemConfig,
    pub pause: MenuItemConfig,
    pub reset: MenuItemConfig,
    /// Settings item (always enabled)
    pub settings: MenuItemConfig,
    /// Quit item (always enabled)
    pub quit: MenuItemConfig,
}

impl MenuConfig {
    /// Action items in display order.
    pub fn action_items(&self) -> [&MenuItemConfig; 5] {
        [
            &self.start,
            &self.pause,
            &self.reset,
            &self.settings,
            &self.quit,
        ]
    }
}

// ============================================================================
// MenuBuilder
// ============================================================================

/// Builds menu configuration for a tray view.
#[derive(Debug, Default)]
pub struct MenuBuilder;

impl MenuBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, view: &TrayView) -> MenuConfig {
        MenuConfig {
            title: MenuItemConfig::label("Pomodoro Reminder"),
            status_items: self.build_status_items(view),
            start: MenuItemConfig::new(
                MenuItemId::Start,
                "▶ 開始",
                Self::is_start_enabled(view.state),
            ),
            pause: MenuItemConfig::new(
                MenuItemId::Pause,
                "⏸ 一時停止",
                Self::is_pause_enabled(view.state),
            ),
            reset: MenuItemConfig::new(
                MenuItemId::Reset,
                "⏹ リセット",
                Self::is_reset_enabled(view.state),
            ),
            settings: MenuItemConfig::new(MenuItemId::Settings, "設定…", true),
            quit: MenuItemConfig::new(MenuItemId::Quit, "終了", true),
        }
    }

    fn build_status_items(&self, view: &TrayView) -> Vec<MenuItemConfig> {
        let phase_text = match view.state {
            TrayIconState::Idle => "停止中",
            TrayIconState::Working => "作業中",
            TrayIconState::Paused => "一時停止",
            TrayIconState::Break => "休憩中",
        };
        let mut items = vec![MenuItemConfig::label(phase_text)];
        if view.state != TrayIconState::Idle {
            if let Some(ms) = view.clock_ms {
                items.push(MenuItemConfig::label(format!("時間: {}", format_clock(ms))));
            }
        }
        items
    }

    /// Start is available unless the timer is already running a work phase.
    pub fn is_start_enabled(state: TrayIconState) -> bool {
        state != TrayIconState::Working
    }

    pub fn is_pause_enabled(state: TrayIconState) -> bool {
        matches!(state, TrayIconState::Working | TrayIconState::Break)
    }

    pub fn is_reset_enabled(state: TrayIconState) -> bool {
        state != TrayIconState::Idle
    }
}

// ============================================================================
// Tests
// ============================================================================
