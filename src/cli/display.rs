//! Display utilities for the Pomodoro Reminder CLI.
//!
//! `format_*` functions build the text so it can be tested; `show_*`
//! functions print it.

use chrono::{Local, TimeZone};

use crate::app::StatusReport;
use crate::history::HistoryStats;
use crate::menubar::format_clock;
use crate::settings::AppSettings;
use crate::types::{CountdownPhase, StopwatchPhase, TimerMode, TimerRecord, TrayIconState};

const RULE: &str = "─────────────────────────────";

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the current timer status.
    pub fn show_status(report: &StatusReport) {
        println!("{}", Self::format_status(report));
    }

    pub fn format_status(report: &StatusReport) -> String {
        let mut lines = vec![
            "ポモドーロリマインダー ステータス".to_string(),
            RULE.to_string(),
            format!("モード: {}", Self::mode_label(report.mode)),
            format!("状態: {}", Self::state_label(report.tray_state)),
        ];

        match report.mode {
            TimerMode::Countdown => {
                let countdown = &report.countdown;
                lines.push(format!("残り時間: {}", format_clock(countdown.remaining_ms)));
                if countdown.phase == CountdownPhase::Break {
                    lines.push(format!(
                        "休憩経過: {}",
                        format_clock(countdown.break_elapsed_ms)
                    ));
                }
                lines.push(format!("サイクル: #{}", countdown.cycle_count));
                lines.push(format!("カテゴリ: {}", report.category));
            }
            TimerMode::Stopwatch => {
                let stopwatch = &report.stopwatch;
                lines.push(format!("経過時間: {}", format_clock(stopwatch.elapsed_ms)));
                if stopwatch.phase == StopwatchPhase::Break {
                    lines.push(format!(
                        "休憩目標: {}",
                        format_clock(stopwatch.break_target_ms)
                    ));
                } else if let Some(reminder_ms) = stopwatch.reminder_ms {
                    lines.push(format!("リマインダー: {}", format_clock(reminder_ms)));
                }
            }
        }

        if let Some(session) = report.pending_session {
            lines.push(format!(
                "記録待ち: {} (save NAME で保存)",
                format_clock(session.duration_ms)
            ));
        }
        if report.close_prompt_open {
            lines.push("終了確認中: close-answer minimize|quit [remember]".to_string());
        }
        lines.join("\n")
    }

    /// Shows recent records with today/week totals.
    pub fn show_history(records: &[TimerRecord], stats: &HistoryStats) {
        println!("{}", Self::format_history(records, stats));
    }

    pub fn format_history(records: &[TimerRecord], stats: &HistoryStats) -> String {
        let mut lines = vec![
            format!(
                "今日: {}件 / {}",
                stats.today_count,
                format_clock(stats.today_ms)
            ),
            format!(
                "今週: {}件 / {} (作業 {})",
                stats.week_count,
                format_clock(stats.week_ms),
                format_clock(stats.week_work_ms)
            ),
            RULE.to_string(),
        ];

        if records.is_empty() {
            lines.push("記録はありません".to_string());
        }
        for record in records {
            let mut line = format!(
                "{}  {:<9}  {:<5}  {:>8}  {}",
                Self::format_timestamp(record.end_time),
                record.record_type.as_str(),
                record.phase.map(|p| p.as_str()).unwrap_or("-"),
                format_clock(record.duration),
                record.category_or_default(),
            );
            if let Some(name) = &record.name {
                line.push_str("  ");
                line.push_str(name);
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    /// Shows every setting as `key = value`.
    pub fn show_settings(settings: &AppSettings) {
        println!("{}", Self::format_settings(settings));
    }

    pub fn format_settings(settings: &AppSettings) -> String {
        match settings.to_map() {
            Ok(map) => map
                .iter()
                .map(|(key, value)| format!("{} = {}", key, value))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("設定を表示できません: {}", e),
        }
    }

    pub fn show_setting_updated(key: &str, settings: &AppSettings) {
        match settings.encoded(key) {
            Ok(value) => println!("* {} = {} に変更しました", key, value),
            Err(_) => println!("* {} を変更しました", key),
        }
    }

    pub fn show_settings_reset() {
        println!("* 設定を既定値に戻しました");
    }

    pub fn show_run_started(report: &StatusReport) {
        println!(
            "* {}モードで起動しました (help でコマンド一覧)",
            Self::mode_label(report.mode)
        );
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    fn mode_label(mode: TimerMode) -> &'static str {
        match mode {
            TimerMode::Countdown => "カウントダウン",
            TimerMode::Stopwatch => "ストップウォッチ",
        }
    }

    fn state_label(state: TrayIconState) -> &'static str {
        match state {
            TrayIconState::Idle => "停止中",
            TrayIconState::Working => "作業中",
            TrayIconState::Paused => "一時停止中",
            TrayIconState::Break => "休憩中",
        }
    }

    /// Formats epoch millis as local `YYYY-MM-DD HH:MM`.
    fn format_timestamp(ms: i64) -> String {
        match Local.timestamp_millis_opt(ms).single() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            None => "----------------".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
