//! Line commands read from stdin by `run`.
//!
//! One command per line. Words are separated by whitespace; the first word
//! selects the command.

use std::io::BufRead;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::commands::parse_setting_value;
use super::display::Display;
use crate::listener::AppCommand;
use crate::types::TimerMode;

/// Help shown for `help` and after an unknown command.
pub const HELP: &str = "\
コマンド:
  start                 開始/再開
  pause                 一時停止
  reset                 リセット (ストップウォッチでは停止)
  stop                  ストップウォッチを停止
  skip | end-break      休憩を終了
  break                 ストップウォッチの休憩を開始
  save NAME [CATEGORY]  記録待ちのセッションを保存
  save-break NAME [CATEGORY]
                        保存して休憩を開始
  discard               記録待ちのセッションを破棄
  category NAME         カウントダウンのカテゴリを設定
  mode countdown|stopwatch
  set KEY VALUE         設定を変更
  show                  メインウィンドウを表示
  settings              設定画面を開く
  close                 ウィンドウを閉じる
  close-answer minimize|quit [remember]
  status                状態を表示
  quit                  終了";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("不明なコマンドです: {0}")]
    UnknownCommand(String),

    #[error("{command} には {argument} が必要です")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("不正な値です: {0}")]
    InvalidValue(String),
}

/// A parsed stdin line.
#[derive(Debug)]
pub enum LineCommand {
    App(AppCommand),
    /// Needs a reply channel, created by the reader
    Status,
    Help,
}

/// Parses one line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<LineCommand>, InputError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head {
        "start" => AppCommand::Start,
        "pause" => AppCommand::Pause,
        "reset" => AppCommand::Reset,
        "stop" => AppCommand::Stop,
        "skip" | "end-break" => AppCommand::SkipBreak,
        "break" => AppCommand::StartBreak,
        "save" | "save-break" => {
            let name = rest.first().ok_or(InputError::MissingArgument {
                command: "save",
                argument: "NAME",
            })?;
            AppCommand::ConfirmSession {
                name: (*name).to_string(),
                category: rest.get(1).map(|c| (*c).to_string()),
                take_break: head == "save-break",
            }
        }
        "discard" => AppCommand::DiscardSession,
        "category" => {
            if rest.is_empty() {
                return Err(InputError::MissingArgument {
                    command: "category",
                    argument: "NAME",
                });
            }
            AppCommand::SetCategory(rest.join(" "))
        }
        "mode" => match rest.first().copied() {
            Some("countdown") => AppCommand::SetMode(TimerMode::Countdown),
            Some("stopwatch") => AppCommand::SetMode(TimerMode::Stopwatch),
            Some(other) => return Err(InputError::InvalidValue(other.to_string())),
            None => {
                return Err(InputError::MissingArgument {
                    command: "mode",
                    argument: "countdown|stopwatch",
                })
            }
        },
        "set" => {
            let (Some(key), Some(_)) = (rest.first(), rest.get(1)) else {
                return Err(InputError::MissingArgument {
                    command: "set",
                    argument: "KEY VALUE",
                });
            };
            AppCommand::UpdateSetting {
                key: (*key).to_string(),
                value: parse_setting_value(&rest[1..].join(" ")),
            }
        }
        "show" => AppCommand::ShowMain,
        "settings" => AppCommand::OpenSettings,
        "close" => AppCommand::RequestClose,
        "close-answer" => {
            let minimize = match rest.first().copied() {
                Some("minimize") => true,
                Some("quit") => false,
                Some(other) => return Err(InputError::InvalidValue(other.to_string())),
                None => {
                    return Err(InputError::MissingArgument {
                        command: "close-answer",
                        argument: "minimize|quit",
                    })
                }
            };
            AppCommand::ConfirmClose {
                minimize,
                remember: rest.get(1) == Some(&"remember"),
            }
        }
        "status" => return Ok(Some(LineCommand::Status)),
        "help" | "?" => return Ok(Some(LineCommand::Help)),
        "quit" | "exit" => AppCommand::Quit,
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Some(LineCommand::App(command)))
}

/// Forwards lines to the application until EOF or `quit`.
///
/// Blocks the calling thread; `run` gives it a thread of its own. EOF is
/// treated as `quit` so piping a script ends the run.
pub fn forward_lines<R: BufRead>(reader: R, commands: mpsc::UnboundedSender<AppCommand>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "標準入力の読み込みに失敗しました");
                break;
            }
        };

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(LineCommand::Help)) => println!("{}", HELP),
            Ok(Some(LineCommand::Status)) => {
                let (tx, rx) = oneshot::channel();
                if commands.send(AppCommand::Status(tx)).is_err() {
                    return;
                }
                match rx.blocking_recv() {
                    Ok(report) => Display::show_status(&report),
                    Err(_) => return,
                }
            }
            Ok(Some(LineCommand::App(command))) => {
                let quit = matches!(command, AppCommand::Quit);
                if commands.send(command).is_err() || quit {
                    return;
                }
            }
            Err(e) => {
                Display::show_error(&e.to_string());
                if matches!(e, InputError::UnknownCommand(_)) {
                    eprintln!("{}", HELP);
                }
            }
        }
    }

    tracing::debug!("標準入力が終了しました");
    let _ = commands.send(AppCommand::Quit);
}

// ============================================================================
// Tests
// ============================================================================
