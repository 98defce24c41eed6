//! End-to-End Tests for the Pomodoro Reminder CLI.
//!
//! Runs the built binary against a temporary database:
//! - settings show / set / reset
//! - history on an empty database
//! - a scripted `run` session over stdin
//! - shell completions

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reminder.db");
    (dir, path)
}

/// The binary with `--db` pointing at `db` and logging silenced.
fn cli(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pomodoro-reminder").unwrap();
    cmd.env("RUST_LOG", "off").arg("--db").arg(db);
    cmd
}

// ============================================================================
// settings
// ============================================================================

mod settings_e2e {
    use super::*;

    #[test]
    fn test_show_defaults() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["settings", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("workDurationMinutes = 25"))
            .stdout(predicate::str::contains("timerMode = \"countdown\""));
    }

    #[test]
    fn test_set_persists() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["settings", "set", "workDurationMinutes", "30"])
            .assert()
            .success()
            .stdout(predicate::str::contains("workDurationMinutes = 30"));

        cli(&db)
            .args(["settings", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("workDurationMinutes = 30"));
    }

    #[test]
    fn test_set_string_value() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["settings", "set", "closeBehavior", "minimize"])
            .assert()
            .success();

        cli(&db)
            .args(["settings", "show"])
            .assert()
            .stdout(predicate::str::contains("closeBehavior = \"minimize\""));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["settings", "set", "soundVolume", "0.9"])
            .assert()
            .success();
        cli(&db)
            .args(["settings", "reset"])
            .assert()
            .success()
            .stdout(predicate::str::contains("既定値"));

        cli(&db)
            .args(["settings", "show"])
            .assert()
            .stdout(predicate::str::contains("soundVolume = 0.5"));
    }

    #[test]
    fn test_unknown_key_fails() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["settings", "set", "noSuchSetting", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("エラー"));
    }
}

// ============================================================================
// history
// ============================================================================

mod history_e2e {
    use super::*;

    #[test]
    fn test_empty_history() {
        let (_dir, db) = temp_db();
        cli(&db)
            .arg("history")
            .assert()
            .success()
            .stdout(predicate::str::contains("記録はありません"))
            .stdout(predicate::str::contains("今日: 0件"));
    }

    #[test]
    fn test_limit_out_of_range() {
        let (_dir, db) = temp_db();
        cli(&db).args(["history", "--limit", "0"]).assert().failure();
    }
}

// ============================================================================
// run
// ============================================================================

mod run_e2e {
    use super::*;

    #[test]
    fn test_status_then_quit() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["run", "--no-sound"])
            .write_stdin("status\nquit\n")
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .success()
            .stdout(predicate::str::contains("カウントダウンモードで起動しました"))
            .stdout(predicate::str::contains("ステータス"))
            .stdout(predicate::str::contains("残り時間: 25:00"));
    }

    #[test]
    fn test_mode_override_is_saved() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["run", "--no-sound", "--mode", "stopwatch"])
            .write_stdin("status\n")
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .success()
            .stdout(predicate::str::contains("経過時間: 00:00"));

        cli(&db)
            .args(["settings", "show"])
            .assert()
            .stdout(predicate::str::contains("timerMode = \"stopwatch\""));
    }

    #[test]
    fn test_bad_line_keeps_running() {
        let (_dir, db) = temp_db();
        cli(&db)
            .args(["run", "--no-sound"])
            .write_stdin("launch\nstatus\nquit\n")
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .success()
            .stderr(predicate::str::contains("不明なコマンドです: launch"))
            .stdout(predicate::str::contains("ステータス"));
    }
}

// ============================================================================
// completions
// ============================================================================

#[test]
fn test_bash_completions() {
    let (_dir, db) = temp_db();
    cli(&db)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pomodoro-reminder"));
}
