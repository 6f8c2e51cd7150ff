//! Process-wide tracing setup.
//!
//! The subscriber is installed once; later calls only swap the level filter
//! through a reload handle, so layers are never registered twice.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

use crate::error::{BslError, BslResult};

/// Ordered verbosity levels, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = BslError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "critical" => Ok(Self::Error),
            other => Err(BslError::InvalidConfig(format!(
                "unknown log level {other:?} (expected trace, debug, info, warn or error)"
            ))),
        }
    }
}

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the stderr subscriber, or just change the level if one is
/// already installed by this module.
///
/// `RUST_LOG`, when set, takes precedence over `level` at first install.
pub fn init(level: LogLevel) -> BslResult<()> {
    if FILTER_HANDLE.get().is_some() {
        return set_level(level);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(level));
    let (filter_layer, handle) = reload::Layer::new(filter);

    // stdout carries the protocol; logs go to stderr only.
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| BslError::InvalidConfig(format!("logging already initialized: {e}")))?;

    // A concurrent init that lost the race above has already returned an error.
    let _ = FILTER_HANDLE.set(handle);
    Ok(())
}

/// Change verbosity of the installed subscriber.
///
/// A no-op before [`init`] has run.
pub fn set_level(level: LogLevel) -> BslResult<()> {
    match FILTER_HANDLE.get() {
        Some(handle) => handle
            .reload(filter_for(level))
            .map_err(|e| BslError::InvalidConfig(format!("failed to change log level: {e}"))),
        None => Ok(()),
    }
}

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::new(level.as_str())
}
