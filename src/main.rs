//! Pomodoro Reminder CLI
//!
//! Runs the countdown/stopwatch timer headlessly and manages its records and
//! settings:
//! - `run`: start the timer and read commands from stdin
//! - `history`: recent records with today/week totals
//! - `settings`: show, change or reset settings

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser};

use pomodoro_reminder::app::{AppConfig, AppContext, Services, TickMode};
use pomodoro_reminder::bus::LocalEventBus;
use pomodoro_reminder::cli::{
    forward_lines, parse_setting_value, Cli, Commands, Display, RunArgs, SettingsAction,
};
use pomodoro_reminder::clock::SystemClock;
use pomodoro_reminder::history::HistoryStats;
use pomodoro_reminder::listener::AppCommand;
use pomodoro_reminder::notification::DesktopNotifier;
use pomodoro_reminder::settings::SettingsManager;
use pomodoro_reminder::sound::{
    default_sound_dir, try_create_audio_service, AudioService, MutedAudioService,
};
use pomodoro_reminder::store::{default_db_path, RecordStore, SqliteStore};
use pomodoro_reminder::window::HeadlessWindow;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let db_path = cli.db.unwrap_or_else(default_db_path);

    match cli.command {
        Some(Commands::Run(args)) => run(args, &db_path).await?,
        Some(Commands::History { limit }) => {
            let store = open_store(&db_path)?;
            let records = store
                .list(Some(limit as usize))
                .context("記録を読み込めませんでした")?;
            let all = store.list(None).context("記録を読み込めませんでした")?;
            let stats = HistoryStats::compute(&all, &Local::now());
            Display::show_history(&records, &stats);
        }
        Some(Commands::Settings { action }) => {
            let store = open_store(&db_path)?;
            let mut settings = SettingsManager::new(store);
            settings.load().context("設定を読み込めませんでした")?;

            match action {
                SettingsAction::Show => Display::show_settings(settings.get()),
                SettingsAction::Set { key, value } => {
                    settings
                        .set_value(&key, parse_setting_value(&value))
                        .with_context(|| format!("{} を変更できませんでした", key))?;
                    Display::show_setting_updated(&key, settings.get());
                }
                SettingsAction::Reset => {
                    settings
                        .reset_to_default()
                        .context("設定をリセットできませんでした")?;
                    Display::show_settings_reset();
                }
            }
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(path)
        .with_context(|| format!("データベースを開けませんでした: {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Runs the timer until `quit`, EOF on stdin, a tray quit or Ctrl+C.
async fn run(args: RunArgs, db_path: &Path) -> Result<()> {
    let store = open_store(db_path)?;

    let audio: Arc<dyn AudioService> = if args.no_sound {
        Arc::new(MutedAudioService)
    } else {
        match try_create_audio_service(false) {
            Some(service) => service,
            None => Arc::new(MutedAudioService),
        }
    };

    let services = Services {
        settings_store: store.clone(),
        records: store,
        main_window: Arc::new(HeadlessWindow::new("main")),
        floating_window: Arc::new(HeadlessWindow::new("floating")),
        notifier: Arc::new(DesktopNotifier::new()),
        audio,
        bus: Arc::new(LocalEventBus::new()),
        clock: Arc::new(SystemClock),
    };
    let config = AppConfig {
        tick: TickMode::Interval {
            period_ms: args.tick_ms,
        },
        sound_dir: args.sound_dir.unwrap_or_else(default_sound_dir),
        enable_tray: args.tray,
    };

    let mut app = AppContext::init(services, config)?;
    if let Some(mode) = args.mode {
        app.set_mode(mode.into());
    }
    Display::show_run_started(&app.status());

    let commands = app.command_sender();
    let stdin_commands = commands.clone();
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || forward_lines(std::io::stdin().lock(), stdin_commands))
        .context("入力スレッドを起動できませんでした")?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("割り込みを受信しました。終了します");
            let _ = commands.send(AppCommand::Quit);
        }
    });

    app.run().await
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["pomodoro-reminder"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_settings_show() {
        let cli = Cli::parse_from(["pomodoro-reminder", "settings", "show"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Settings {
                action: SettingsAction::Show
            })
        ));
    }

    #[test]
    fn test_open_store_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminder.db");
        let store = open_store(&path).unwrap();
        assert!(store.list(None).unwrap().is_empty());
        assert!(path.exists());
    }
}
