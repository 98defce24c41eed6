//! Command definitions for the Pomodoro Reminder CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::types::TimerMode;

// ============================================================================
// CLI Structure
// ============================================================================

/// Pomodoro Reminder - countdown and stopwatch work timer
#[derive(Parser, Debug)]
#[command(
    name = "pomodoro-reminder",
    version,
    about = "ポモドーロ/ストップウォッチ作業リマインダー",
    long_about = "作業時間を計測し、終了時に通知・サウンド・ウィンドウ表示で知らせます。\n\
                  記録と設定はSQLiteデータベースに保存されます。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database file (defaults to the user data directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the timer, reading commands from stdin
    Run(RunArgs),

    /// Show recent records with today/week totals
    History {
        /// Number of records to show
        #[arg(
            short,
            long,
            default_value = "20",
            value_parser = clap::value_parser!(u32).range(1..=1000)
        )]
        limit: u32,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// `settings` actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    /// Print every setting
    Show,

    /// Change one setting (VALUE is JSON; bare words are taken as strings)
    Set {
        /// Setting key in camelCase, e.g. workDurationMinutes
        key: String,
        value: String,
    },

    /// Restore the defaults
    Reset,
}

// ============================================================================
// Run Command Arguments
// ============================================================================

/// Timer mode as accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Countdown,
    Stopwatch,
}

impl From<ModeArg> for TimerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Countdown => TimerMode::Countdown,
            ModeArg::Stopwatch => TimerMode::Stopwatch,
        }
    }
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Switch to this mode before starting (saved to settings)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Tick interval in milliseconds (50-1000)
    #[arg(
        long,
        default_value = "200",
        value_parser = clap::value_parser!(u64).range(50..=1000)
    )]
    pub tick_ms: u64,

    /// Directory containing the notification sounds
    #[arg(long, value_name = "DIR")]
    pub sound_dir: Option<PathBuf>,

    /// Disable sound playback
    #[arg(long)]
    pub no_sound: bool,

    /// Show the menu bar icon (macOS only)
    #[arg(long)]
    pub tray: bool,
}

// ============================================================================
// Value Parsing
// ============================================================================

/// Parses a setting value from the command line.
///
/// Valid JSON is taken as is (`25`, `true`, `"dark"`); anything else is used
/// as a string so `theme light` works without quoting.
pub fn parse_setting_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
