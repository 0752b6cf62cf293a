//! src/telemetry.rs

use crate::configuration::{LogHandler, LogSettings};
use tokio::task::JoinHandle;
use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// tracing target of this crate
pub const APP_TARGET: &str = "miolingo";

/// Map a numeric severity (50 critical ... 10 debug) onto a filter directive.
pub fn level_filter(severity: i64) -> &'static str {
    match severity {
        s if s >= 40 => "error",
        s if s >= 30 => "warn",
        s if s >= 20 => "info",
        s if s >= 10 => "debug",
        _ => "trace",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerEntry {
    pub target: String,
    pub level: i64,
    pub handlers: Vec<LogHandler>,
}

/// Per target logging levels and handlers, rendered into an `EnvFilter`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerConfig {
    pub root_level: i64,
    pub loggers: Vec<LoggerEntry>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let entry = |target: &str| LoggerEntry {
            target: target.to_string(),
            level: 20,
            handlers: vec![LogHandler::Console],
        };
        Self {
            root_level: 20,
            loggers: vec![entry(APP_TARGET), entry("sqlx")],
        }
    }
}

impl LoggerConfig {
    /// Apply configured level to the application logger and configured handlers to every logger.
    pub fn override_with(mut self, settings: &LogSettings) -> Self {
        // settings are validated when loaded
        let level = settings.level.severity().unwrap_or(20);
        for logger in self.loggers.iter_mut() {
            if logger.target == APP_TARGET {
                logger.level = level;
            }
            logger.handlers = settings.handlers.clone();
        }
        self
    }

    pub fn filter_directives(&self) -> String {
        let mut directives = vec![level_filter(self.root_level).to_string()];
        for logger in self.loggers.iter() {
            let level = if logger.handlers.contains(&LogHandler::Console) {
                level_filter(logger.level)
            } else {
                "off"
            };
            directives.push(format!("{}={}", logger.target, level));
        }
        directives.join(",")
    }
}

/// Compose multiple layers into a `tracing`'s subscriber.
///
/// # Implementation Notes
///
/// We are using `impl Subscriber` as return type to avoid having to
/// spell out the actual type of the returned subscriber, which is
/// indeed quite complex.
pub fn get_subscriber<Sink>(
    name: String,
    env_filter: String,
    sink: Sink,
) -> impl Subscriber + Sync + Send
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    let formatting_layer = BunyanFormattingLayer::new(name, sink);
    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Register a subscriber as global default to process span data.
///
/// It should only be called once!
pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send) {
    LogTracer::init().expect("Failed to set logger");
    set_global_default(subscriber).expect("Failed to set subscriber");
}

pub fn spawn_blocking_with_tracing<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let current_span = tracing::Span::current();
    tokio::task::spawn_blocking(move || current_span.in_scope(f))
}
