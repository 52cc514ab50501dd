//! Bridge from `tracing` events to the host's leveled tracing sink.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Minimum severity forwarded to the host sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "LevelRepr")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// `Fatal` has no `tracing` counterpart and gates like `Error`.
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error | Self::Fatal => LevelFilter::ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Info => "Info",
            Self::Warn => "Warn",
            Self::Error => "Error",
            Self::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<LevelRepr> for LogLevel {
    type Error = String;

    fn try_from(repr: LevelRepr) -> Result<Self, String> {
        match repr {
            LevelRepr::Code(code) => Self::ALL
                .into_iter()
                .find(|level| *level as i64 == code)
                .ok_or_else(|| format!("unknown log level code {code}")),
            LevelRepr::Name(name) => {
                let name = name.trim();
                Self::ALL
                    .into_iter()
                    .find(|level| level.as_str().eq_ignore_ascii_case(name))
                    .ok_or_else(|| format!("unknown log level '{name}'"))
            }
        }
    }
}

/// The host's tracing sink. Implementations must not panic.
pub trait TracingService: Send + Sync {
    fn trace(&self, message: &str);
}

/// Sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct RecordingTracingService {
    lines: Mutex<Vec<String>>,
}

impl RecordingTracingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// True when any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl TracingService for RecordingTracingService {
    fn trace(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// Layer that renders each event as `"[<level>]: <message> <fields>"` and
/// hands it to a [`TracingService`].
pub struct TracingServiceLayer {
    sink: Arc<dyn TracingService>,
}

impl TracingServiceLayer {
    pub fn new(sink: Arc<dyn TracingService>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for TracingServiceLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut line = format!("[{}]: {}", level_label(*event.metadata().level()), visitor.message);
        if !visitor.fields.is_empty() {
            line.push(' ');
            line.push_str(&visitor.fields);
        }
        self.sink.trace(&line);
    }
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::TRACE => "Trace",
        Level::DEBUG => "Debug",
        Level::INFO => "Info",
        Level::WARN => "Warn",
        _ => "Error",
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field, format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field, format_args!("{value:?}"));
        }
    }
}

impl LineVisitor {
    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }
}

/// Subscriber forwarding events at or above `level` to `sink`.
pub fn subscriber_for(sink: Arc<dyn TracingService>, level: LogLevel) -> impl Subscriber + Send + Sync {
    tracing_subscriber::registry()
        .with(TracingServiceLayer::new(sink).with_filter(level.to_level_filter()))
}
