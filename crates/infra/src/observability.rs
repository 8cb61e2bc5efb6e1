//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; hosts that have no subscriber
//! of their own call [`init_tracing`] once at startup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Env var switching output to JSON lines.
pub const LOG_JSON_ENV: &str = "TIDEWIRE_LOG_JSON";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `Json` when `TIDEWIRE_LOG_JSON` is `1`/`true`/`yes`/`on`.
    pub fn from_env() -> Self {
        let json = std::env::var(LOG_JSON_ENV)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        if json {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` overrides `default_filter` (e.g. `"tidewire_infra=debug"`).
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    init_tracing_with(default_filter, LogFormat::from_env())
}

pub fn init_tracing_with(default_filter: &str, format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = Registry::default().with(filter);
    let result = match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };
    result.is_ok()
}
