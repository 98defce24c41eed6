//! Core data types for the Pomodoro Reminder.
//!
//! This module defines the data structures shared by the engines, the
//! side-effect dispatcher, the broadcaster and the stores:
//! - Timer modes and phases
//! - Persisted timer records
//! - Display preferences (theme, close behavior)
//! - Tray icon state

use serde::{Deserialize, Serialize};

/// Category assigned to records that were saved without one.
pub const DEFAULT_CATEGORY: &str = "work";

// ============================================================================
// TimerMode
// ============================================================================

/// Which engine is currently active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Pomodoro countdown (work → break cycles)
    #[default]
    Countdown,
    /// Count-up stopwatch
    Stopwatch,
}

impl TimerMode {
    /// Returns the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Countdown => "countdown",
            TimerMode::Stopwatch => "stopwatch",
        }
    }
}

// ============================================================================
// Phases
// ============================================================================

/// Phase of the countdown engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownPhase {
    /// Not started (or reset)
    #[default]
    Idle,
    /// Counting down a work interval
    Work,
    /// Counting down a break interval (may overshoot)
    Break,
}

impl CountdownPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            CountdownPhase::Idle => "idle",
            CountdownPhase::Work => "work",
            CountdownPhase::Break => "break",
        }
    }
}

/// Phase of the stopwatch engine. There is no idle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopwatchPhase {
    /// Accumulating work time
    #[default]
    Work,
    /// Accumulating break time towards a target
    Break,
}

impl StopwatchPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            StopwatchPhase::Work => "work",
            StopwatchPhase::Break => "break",
        }
    }
}

// ============================================================================
// TimerRecord
// ============================================================================

/// Engine that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Countdown,
    Stopwatch,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Countdown => "countdown",
            RecordType::Stopwatch => "stopwatch",
        }
    }

    /// Parses the stored representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "countdown" => Some(RecordType::Countdown),
            "stopwatch" => Some(RecordType::Stopwatch),
            _ => None,
        }
    }
}

/// Phase a record covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordPhase {
    Work,
    Break,
}

impl RecordPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordPhase::Work => "work",
            RecordPhase::Break => "break",
        }
    }

    /// Parses the stored representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "work" => Some(RecordPhase::Work),
            "break" => Some(RecordPhase::Break),
            _ => None,
        }
    }
}

/// A completed interval.
///
/// Records are created once by the dispatcher and never mutated afterwards,
/// except for the user-editable `name` and `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    /// Unique identifier
    pub id: String,
    /// Engine that produced the record
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Work or break; absent on legacy rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<RecordPhase>,
    /// User supplied name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// User supplied category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Start timestamp (epoch millis)
    pub start_time: i64,
    /// End timestamp (epoch millis)
    pub end_time: i64,
    /// `end_time - start_time` in millis
    pub duration: i64,
}

impl TimerRecord {
    /// Creates a record for an interval of `duration_ms` that ended at `end_time`.
    ///
    /// The start time is derived from the duration so that
    /// `duration == end_time - start_time` always holds.
    pub fn completed(
        record_type: RecordType,
        phase: RecordPhase,
        end_time: i64,
        duration_ms: i64,
    ) -> Self {
        let duration = duration_ms.max(0);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            record_type,
            phase: Some(phase),
            name: None,
            category: None,
            start_time: end_time - duration,
            end_time,
            duration,
        }
    }

    /// Sets the record name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    /// Sets the record category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = if category.trim().is_empty() {
            None
        } else {
            Some(category)
        };
        self
    }

    /// Returns the category, falling back to [`DEFAULT_CATEGORY`].
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }
}

// ============================================================================
// Display preferences
// ============================================================================

/// Color theme shared by the main and floating windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
    System,
}

/// What closing the main window does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseBehavior {
    /// Ask the user every time
    #[default]
    Ask,
    /// Hide to the tray
    Minimize,
    /// Save state and exit
    Quit,
}

// ============================================================================
// TrayIconState
// ============================================================================

/// State shown by the tray icon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrayIconState {
    #[default]
    Idle,
    Working,
    Paused,
    Break,
}

impl TrayIconState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrayIconState::Idle => "idle",
            TrayIconState::Working => "working",
            TrayIconState::Paused => "paused",
            TrayIconState::Break => "break",
        }
    }

    /// Tooltip text shown when hovering the tray icon.
    pub fn tooltip(&self) -> &'static str {
        match self {
            TrayIconState::Idle => "Pomodoro Reminder - Idle",
            TrayIconState::Working => "Pomodoro Reminder - Working",
            TrayIconState::Paused => "Pomodoro Reminder - Paused",
            TrayIconState::Break => "Pomodoro Reminder - On break",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
