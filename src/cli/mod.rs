//! CLI module for Pomodoro Reminder.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `input`: Line commands read from stdin while `run` is active
//! - `display`: Output formatting and display logic

pub mod commands;
pub mod display;
pub mod input;

pub use commands::{parse_setting_value, Cli, Commands, ModeArg, RunArgs, SettingsAction};
pub use display::Display;
pub use input::{forward_lines, parse_line, InputError, LineCommand};
