//! File logging through log4rs: a rolling `app.log` for everything and a rolling `audit.log`
//! for the per-step trail written under the `bookstore::audit` target.
use crate::errors::StoreError;
use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use once_cell::sync::OnceCell;
use std::path::Path;

pub const AUDIT_TARGET: &str = "bookstore::audit";
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const KEEP: u32 = 7;

static HANDLE: OnceCell<Handle> = OnceCell::new();

/// Parses `error|warn|info|debug|trace|off`; anything else falls back to `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, stem: &str) -> Result<RollingFileAppender, StoreError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), KEEP)
        .map_err(|e| StoreError::Config(format!("log roller: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the log4rs config for `dir` without installing it.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails to open.
pub fn build_config(dir: &Path, level: LevelFilter) -> Result<Config, StoreError> {
    std::fs::create_dir_all(dir)?;
    Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(dir, "app")?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(dir, "audit")?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, level))
        .build(Root::builder().appender("app").build(level))
        .map_err(|e| StoreError::Config(format!("log config: {e}")))
}

/// Installs (or replaces) the process logger, writing under `dir`.
///
/// # Errors
/// Returns `StoreError::Io` / `StoreError::Config` when the files or config cannot be set up.
pub fn configure(dir: &Path, level: &str) -> Result<(), StoreError> {
    let config = build_config(dir, parse_level(level))?;
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle =
        log4rs::init_config(config).map_err(|e| StoreError::Config(format!("logger: {e}")))?;
    let _ = HANDLE.set(handle);
    log::debug!("logging to {}", dir.display());
    Ok(())
}
