//! Structured logging for the planet generator.
//!
//! Console output with uptime timestamps and module paths, plus a JSON log
//! file in debug builds. The level comes from `RUST_LOG`, then the config's
//! `debug.log_level`, then `info`. GPU and shader-compiler crates stay at
//! `warn` unless `RUST_LOG` says otherwise.

use nebula_config::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "planetgen.log";

const DEFAULT_LEVEL: &str = "info";
const QUIET_TARGETS: &str = "wgpu=warn,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Initialize the global tracing subscriber.
///
/// `log` records from dependencies are forwarded into tracing. In debug
/// builds with a `log_dir`, records are also written as JSON to
/// [`LOG_FILE_NAME`] inside it. Panics if a global subscriber is already set.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(log_dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Filter directives for the configured level, with noisy GPU crates held at `warn`.
pub fn filter_directives(config: Option<&Config>) -> String {
    let level = config
        .map(|config| config.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_LEVEL);
    format!("{level},{QUIET_TARGETS}")
}

/// Location of the JSON log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// `EnvFilter` used when neither `RUST_LOG` nor a config is available.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(filter_directives(None))
}
