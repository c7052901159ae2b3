//! Programmatic `log4rs` setup: rolling `app.log` and `audit.log`, plus an optional `dev6.log`.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use once_cell::sync::OnceCell;

use crate::errors::DbError;
use crate::query::telemetry::AUDIT_TARGET;

pub const DEV6_TARGET: &str = "racelite::dev6";

const ENC_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

static HANDLE: OnceCell<Handle> = OnceCell::new();

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| DbError::Config(format!("log roller for {stem}: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENC_PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(|e| DbError::Io(format!("cannot open {stem}.log: {e}")))
}

/// Configures process-wide logging. Calling it again replaces the active configuration.
///
/// - `dir`: directory for the log files; the current directory when `None`.
/// - `level`: error|warn|info|debug|trace|off (default info).
/// - `retention`: rolled files kept per log (default 7).
///
/// # Errors
/// `DbError::Io` when a log file cannot be opened; `DbError::Config` for an invalid setup.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<u32>) -> Result<(), DbError> {
    configure_logging_with_dev(dir, level, retention, false)
}

/// Like [`configure_logging`], additionally routing `dev6!` traces to `dev6.log` when
/// `enable_dev6` is set.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_logging_with_dev(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    enable_dev6: bool,
) -> Result<(), DbError> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)
        .map_err(|e| DbError::Io(format!("cannot create log dir {}: {e}", base.display())))?;
    let keep = retention.unwrap_or(7);
    let lvl = parse_level(level);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, LevelFilter::Info));

    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off))
    };

    let config = builder
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| DbError::Config(format!("log config: {e}")))?;
    match HANDLE.get() {
        Some(handle) => handle.set_config(config),
        None => {
            let handle = log4rs::init_config(config)
                .map_err(|e| DbError::Config(format!("logger already installed: {e}")))?;
            let _ = HANDLE.set(handle);
        }
    }
    Ok(())
}

/// Configures logging from `RACELITE_LOG_DIR`, `RACELITE_LOG_LEVEL`,
/// `RACELITE_LOG_RETENTION` and `RACELITE_DEV6`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("RACELITE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("RACELITE_LOG_LEVEL").ok();
    let retention = std::env::var("RACELITE_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    let dev6_enabled = std::env::var("RACELITE_DEV6")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    configure_logging_with_dev(dir.as_deref(), level.as_deref(), retention, dev6_enabled)
}
