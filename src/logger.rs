use anyhow::{Context, Result};
use bb_classroom::config::LogConfig;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FILE_PREFIX: &str = "bb_classroom";
const CRATE_TARGET: &str = "bb_classroom";

/// Console verbosity from `[log] level`; unknown names fall back to info.
pub fn console_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Everything from this crate goes to the file, dependencies only from warn up.
fn file_targets() -> Targets {
    Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target(CRATE_TARGET, LevelFilter::TRACE)
}

/// Installs the global subscriber. Keep the guard alive until exit or buffered file lines are lost.
pub fn init_logger(config: &LogConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("creating log directory {}", config.dir))?;
    let (file_writer, guard) = non_blocking(rolling::daily(&config.dir, FILE_PREFIX));

    let console = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(console_level(&config.level));

    let file = fmt::layer()
        .with_ansi(false)
        .with_thread_ids(true)
        .with_writer(file_writer)
        .with_filter(file_targets());

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}
