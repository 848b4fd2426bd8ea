use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use chrono::Local;
use console_subscriber::ConsoleLayer;
use tracing::Level;
use tracing_subscriber::{
    filter::Targets, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_ONCE: OnceLock<()> = OnceLock::new();
const LOG_DIR: &str = "logs";
const LOG_DIR_ENV: &str = "LEADERBOARD_LOG_DIR";
const DEFAULT_FILTER: &str = "info,sqlx::query=off,sqlx::postgres::notice=off,sea_orm=warn";

/// Installs the global tracing subscriber. Idempotent.
///
/// Events go to a dated file under `logs/` (or `$LEADERBOARD_LOG_DIR`) and to stderr.
pub fn init_logging() {
    LOGGER_ONCE.get_or_init(|| {
        let build_env_filter =
            || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let file_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .with_writer(prepare_log_writer())
            .with_filter(build_env_filter());
        let stderr_layer = fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(build_env_filter());

        if console_enabled() {
            let console_layer = ConsoleLayer::builder().with_default_env().spawn();
            let console_filter = Targets::new()
                .with_target("tokio", Level::TRACE)
                .with_target("runtime", Level::TRACE);
            tracing_subscriber::registry()
                .with(file_layer)
                .with(stderr_layer)
                .with(console_layer.with_filter(console_filter))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(file_layer)
                .with(stderr_layer)
                .init();
        }
    });
}

fn prepare_log_writer() -> BoxMakeWriter {
    let log_dir = std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(LOG_DIR));
    if let Err(err) = fs::create_dir_all(&log_dir) {
        eprintln!("cannot create log directory {}: {err}", log_dir.display());
        return BoxMakeWriter::new(io::sink);
    }
    let date_prefix = Local::now().format("%Y-%m-%d").to_string();
    let log_path = Arc::new(log_dir.join(format!("{date_prefix}.log")));
    BoxMakeWriter::new(move || -> Box<dyn Write> {
        match OpenOptions::new().create(true).append(true).open(&*log_path) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::sink()),
        }
    })
}

/// tokio-console needs a `--cfg tokio_unstable` build, so it stays opt-in.
fn console_enabled() -> bool {
    std::env::var("TOKIO_CONSOLE")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
