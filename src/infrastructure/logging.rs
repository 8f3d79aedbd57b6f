//! Logging setup.
//!
//! Console logging with an optional non-blocking daily log file. Timestamps
//! are rendered in BRT (UTC-3) because the portal's cycle calendar and the
//! people reading the logs live there.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Utc};
use once_cell::sync::Lazy;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime.
static LOG_GUARDS: Lazy<Mutex<Vec<non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Timestamps in BRT (UTC-3).
struct BrtTimeFormatter;

impl FormatTime for BrtTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let brt = FixedOffset::west_opt(3 * 3600).expect("BRT offset is valid");
        write!(w, "{}", Utc::now().with_timezone(&brt).format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Initialize logging with the default configuration.
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize console logging, plus a daily file when configured.
///
/// `RUST_LOG` overrides the configured filter entirely. Without it, driver
/// and HTTP internals are capped so emoji progress lines stay readable.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);
        if !config.level.eq_ignore_ascii_case("trace") {
            for directive in [
                "thirtyfour=info",
                "reqwest=info",
                "hyper=warn",
                "h2=warn",
                "html5ever=warn",
                "selectors=warn",
                "tokio=info",
            ] {
                filter = filter.add_directive(
                    directive.parse().expect("static filter directive must parse"),
                );
            }
            filter = filter.add_directive(
                format!("revenda_scraper_lib={}", config.level)
                    .parse()
                    .expect("crate filter directive must parse"),
            );
        }
        filter
    });

    let registry = Registry::default().with(env_filter);

    if config.file_output {
        let log_dir = log_directory(config);
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {log_dir:?}"))?;

        let file_appender = rolling::daily(&log_dir, "revenda-scraper.log");
        let (file_writer, guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_timer(BrtTimeFormatter)
            .with_target(false)
            .with_ansi(false);
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(BrtTimeFormatter)
            .with_target(false);

        registry.with(file_layer).with(console_layer).init();
        info!("📁 Logging to {log_dir:?} at level {}", config.level);
    } else {
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(BrtTimeFormatter)
            .with_target(false);

        registry.with(console_layer).init();
        info!("📊 Console logging at level {}", config.level);
    }

    Ok(())
}

fn log_directory(config: &LoggingConfig) -> PathBuf {
    PathBuf::from(&config.log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_a_level() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(!config.file_output);
    }

    #[test]
    fn test_log_directory_follows_config() {
        let config = LoggingConfig {
            log_dir: PathBuf::from("logs"),
            ..LoggingConfig::default()
        };
        assert!(log_directory(&config).ends_with("logs"));
    }

    // Installs the global dispatcher, so it must stay the only test that
    // initializes logging in this binary.
    #[test]
    fn test_file_output_initializes_and_creates_the_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file_output: true,
            log_dir: dir.path().join("logs"),
            ..LoggingConfig::default()
        };

        init_logging_with_config(&config).unwrap();
        assert!(config.log_dir.is_dir());
    }
}
