use crate::location::CallSite;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::error::Error;

/// Level of a log record as seen by the logging facility.
///
/// Ordered from least to most severe. `Fatal` and `Panic` have no `tracing`
/// counterpart; they are produced by callers building records directly and by
/// the panic hook in [`crate::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Panic,
}

impl Level {
    /// Parse a textual level name, case-insensitively.
    ///
    /// Returns `None` for names that are not a known level.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warning),
            "error" => Some(Level::Error),
            "fatal" | "critical" => Some(Level::Fatal),
            "panic" => Some(Level::Panic),
            _ => None,
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            _ => Level::Error,
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        Level::from(*level)
    }
}

/// A single log entry handed to [`crate::formatter::Formatter`].
///
/// The attached error and the HTTP request description have their own slots
/// instead of living in `fields` under magic keys, so a user field named
/// `error` never triggers the error handling by accident.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Textual description of the attached error, if any.
    pub error: Option<String>,
    /// HTTP request description, passed through to `context.httpRequest`.
    pub http_request: Option<serde_json::Value>,
    /// Where the emitting macro sits, when the record came from a `tracing`
    /// event.
    pub callsite: Option<CallSite>,
}

impl LogRecord {
    /// Create a record stamped with the current time and no fields.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: BTreeMap::new(),
            error: None,
            http_request: None,
            callsite: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach an error; only its `Display` text is kept.
    pub fn with_error(self, error: &dyn Error) -> Self {
        self.with_error_text(error.to_string())
    }

    pub fn with_error_text(mut self, text: impl Into<String>) -> Self {
        self.error = Some(text.into());
        self
    }

    pub fn with_http_request(mut self, request: impl Into<serde_json::Value>) -> Self {
        self.http_request = Some(request.into());
        self
    }

    pub fn with_callsite(mut self, callsite: CallSite) -> Self {
        self.callsite = Some(callsite);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
