//! Logging setup
//!
//! Console and/or daily-rolled file output through `tracing`, timestamps in
//! JST (UTC+9). `RUST_LOG` overrides the configured filter entirely.

#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, Utc};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "opcg.log";

const JST_OFFSET_SECONDS: i32 = 9 * 3600;

lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());
}

/// Japan Standard Time (UTC+9)
struct JstTimeFormatter;

impl FormatTime for JstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let offset = FixedOffset::east_opt(JST_OFFSET_SECONDS).ok_or(std::fmt::Error)?;
        write!(w, "{}", Utc::now().with_timezone(&offset).format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Targets that flood the log below TRACE
const QUIET_TARGETS: &[&str] = &[
    "sqlx::query=warn",
    "sqlx::sqlite=warn",
    "reqwest=info",
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "rustls=warn",
    "html5ever=warn",
    "selectors=warn",
    "tokio=info",
];

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::new(&config.level);
    if config.level.to_lowercase().contains("trace") {
        return filter;
    }

    let module_directives = config
        .module_filters
        .iter()
        .map(|(target, level)| format!("{}={}", target, level));
    let directives = QUIET_TARGETS
        .iter()
        .map(ToString::to_string)
        .chain(module_directives)
        .chain(std::iter::once(format!("opcg_catalog={}", config.level)));

    for directive in directives {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring log directive {}: {}", directive, e),
        }
    }
    filter
}

fn file_layer<S>(writer: NonBlocking, json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_timer(JstTimeFormatter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_timer(JstTimeFormatter)
            .with_target(false)
            .with_ansi(false)
            .boxed()
    }
}

fn console_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_timer(JstTimeFormatter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(JstTimeFormatter)
            .with_target(false)
            .boxed()
    }
}

/// Install the global subscriber. File output goes to `log_dir`, rolled daily.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let file = if config.file_output {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let (writer, guard) = non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(guard);
        }
        Some(file_layer(writer, config.json_format))
    } else {
        None
    };
    let console = config.console_output.then(|| console_layer(config.json_format));

    Registry::default()
        .with(build_filter(config))
        .with(file)
        .with(console)
        .try_init()
        .context("Logging was already initialized")?;

    if config.file_output && config.auto_cleanup_logs {
        if let Err(e) = cleanup_old_logs(log_dir, config.max_files as usize) {
            warn!("Log cleanup failed: {}", e);
        }
    }

    info!(
        "Logging initialized (level {}, json {}, dir {})",
        config.level,
        config.json_format,
        log_dir.display()
    );
    Ok(())
}

/// Remove all but the `keep` most recently modified log files.
/// Returns how many files were removed.
pub fn cleanup_old_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX));
        if !is_log || !path.is_file() {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
    if removed > 0 {
        info!("Removed {} old log files (keeping {})", removed, keep);
    }
    Ok(removed)
}

pub fn log_system_info() {
    info!("opcg-catalog {}", env!("CARGO_PKG_VERSION"));
    info!("Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
}
