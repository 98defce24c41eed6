//! Title and tooltip generation for the tray icon.
//!
//! This module handles:
//! - Generating the text shown next to the icon (e.g., "🍅 15:30")
//! - Tracking state changes so the menu is only rebuilt when needed
//!
//! The text generation logic is platform-independent and fully testable.

use crate::types::TrayIconState;

// ============================================================================
// Constants
// ============================================================================

/// Emoji for work session
const WORKING_EMOJI: &str = "🍅";

/// Emoji for break session
const BREAK_EMOJI: &str = "☕";

/// Emoji for paused/idle state
const STOPPED_EMOJI: &str = "⏸";

// ============================================================================
// TrayView
// ============================================================================

/// What the tray currently displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrayView {
    pub state: TrayIconState,
    /// Remaining (countdown) or elapsed (stopwatch) time, when known
    pub clock_ms: Option<i64>,
}

// ============================================================================
// IconManager
// ============================================================================

/// Generates the tray title and tooltip.
#[derive(Debug, Default)]
pub struct IconManager {
    /// Last state the menu was built for
    last_state: Option<TrayIconState>,
}

impl IconManager {
    pub fn new() -> Self {
        Self { last_state: None }
    }

    /// Generates the title text shown next to the icon.
    ///
    /// Format:
    /// - Working: "🍅 MM:SS" (or "🍅" when the time is unknown)
    /// - Break: "☕ MM:SS"
    /// - Paused: "⏸ 一時停止"
    /// - Idle: "⏸ 停止中"
    pub fn generate_title(&self, view: &TrayView) -> String {
        match view.state {
            TrayIconState::Working => with_clock(WORKING_EMOJI, view.clock_ms),
            TrayIconState::Break => with_clock(BREAK_EMOJI, view.clock_ms),
            TrayIconState::Paused => format!("{} 一時停止", STOPPED_EMOJI),
            TrayIconState::Idle => format!("{} 停止中", STOPPED_EMOJI),
        }
    }

    pub fn tooltip(&self, view: &TrayView) -> &'static str {
        view.state.tooltip()
    }

    /// Returns the emoji for a state.
    pub fn get_emoji(&self, state: TrayIconState) -> &'static str {
        match state {
            TrayIconState::Working => WORKING_EMOJI,
            TrayIconState::Break => BREAK_EMOJI,
            TrayIconState::Paused | TrayIconState::Idle => STOPPED_EMOJI,
        }
    }

    /// Checks if the state has changed since the last call.
    pub fn state_changed(&mut self, state: TrayIconState) -> bool {
        let changed = self.last_state != Some(state);
        if changed {
            self.last_state = Some(state);
        }
        changed
    }
}

fn with_clock(emoji: &str, clock_ms: Option<i64>) -> String {
    match clock_ms {
        Some(ms) => format!("{} {}", emoji, format_clock(ms)),
        None => emoji.to_string(),
    }
}

/// Formats milliseconds as `MM:SS`, or `H:MM:SS` from one hour up.
///
/// Partial seconds are dropped; negative values show as zero.
pub fn format_clock(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

// ============================================================================
// Tests
// ============================================================================
