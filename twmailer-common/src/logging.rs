use std::str::FromStr;

use serde::Deserialize;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

/// Log a line sent from the server to a peer
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

/// Log a line received from a peer
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

/// The `logging` section of the server configuration
///
/// ```ron
/// logging: (level: Some("debug"), ansi: false),
/// ```
///
/// `LOG_LEVEL` in the environment wins over `level`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Most verbose level emitted; defaults to TRACE in debug builds and
    /// INFO otherwise
    pub level: Option<String>,
    /// Colour the output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: None,
            ansi: true,
        }
    }
}

impl LogConfig {
    fn level(&self) -> LevelFilter {
        let default = if cfg!(debug_assertions) {
            LevelFilter::TRACE
        } else {
            LevelFilter::INFO
        };

        let configured = self.level.as_deref().map_or(default, |level| parse_level(level, default));

        std::env::var("LOG_LEVEL").map_or(configured, |level| parse_level(&level, configured))
    }
}

fn parse_level(level: &str, fallback: LevelFilter) -> LevelFilter {
    LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level specified {level}, defaulting to {fallback}");
        fallback
    })
}

/// Install the global subscriber.
///
/// Only events from `twmailer*` targets are emitted. Calling this more than
/// once is a no-op, which keeps tests that spin up a full server happy.
pub fn init(config: &LogConfig) {
    let _ = tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(config.ansi)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(config.level())
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("twmailer")
                })),
        )
        .try_init();
}
