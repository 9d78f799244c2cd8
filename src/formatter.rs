use crate::error::FormatError;
use crate::location::{self, SourceLocation};
use crate::record::LogRecord;
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Immutable settings of a [`Formatter`].
///
/// **Fields**
/// - `service`: reported as `serviceContext.service`.
/// - `version`: reported as `serviceContext.version`.
/// - `no_timestamp`: drop the `timestamp` key entirely; mostly useful to get
///   byte-stable output in tests.
/// - `stack_skip`: module-path prefixes whose frames are never attributed as
///   the call site, for logging wrappers built on top of `tracing`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatterConfig {
    pub service: String,
    pub version: String,
    pub no_timestamp: bool,
    pub stack_skip: Vec<String>,
}

/// Renders [`LogRecord`]s as Cloud Logging JSON lines.
///
/// The formatter holds no mutable state, so one instance can be shared by any
/// number of threads. Besides [`Formatter::format`] it implements
/// `tracing_subscriber`'s `FormatEvent`, see [`crate::layer`].
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatterConfig,
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: FormatterConfig) -> Self {
        Formatter { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.config.service = service.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn with_no_timestamp(mut self) -> Self {
        self.config.no_timestamp = true;
        self
    }

    /// Add one module-path prefix to skip during call-site attribution.
    ///
    /// Can be called repeatedly; prefixes accumulate.
    pub fn with_stack_skip(mut self, prefix: impl Into<String>) -> Self {
        self.config.stack_skip.push(prefix.into());
        self
    }

    /// Format `record` as one newline-terminated JSON document.
    ///
    /// The source location is attributed from the current call stack, so this
    /// should be called on the thread and below the frame that logged.
    ///
    /// **Returns**
    /// - `Ok(bytes)` with the full line, including the trailing `\n`.
    /// - `Err(FormatError)` if the document could not be serialized; nothing
    ///   is produced in that case.
    pub fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        let location = location::locate(&self.config.stack_skip, record.callsite.as_ref());
        self.render_at(record, location).map(String::into_bytes)
    }

    /// Same as [`Formatter::format`], returning the line as a `String`.
    pub fn render(&self, record: &LogRecord) -> Result<String, FormatError> {
        let location = location::locate(&self.config.stack_skip, record.callsite.as_ref());
        self.render_at(record, location)
    }

    fn render_at(&self, record: &LogRecord, location: SourceLocation) -> Result<String, FormatError> {
        let entry = self.entry(record, location);
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        Ok(line)
    }

    fn entry<'a>(&'a self, record: &'a LogRecord, location: SourceLocation) -> Entry<'a> {
        let severity = Severity::from(record.level);

        let message = match &record.error {
            Some(error) => format!("{}: {}", record.message, error),
            None => record.message.clone(),
        };

        let mut data: Map<String, Value> = record
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(error) = &record.error {
            data.insert("error".to_string(), Value::String(error.clone()));
        }

        let report_location = severity.is_error_report().then(|| location.clone());

        Entry {
            severity,
            message,
            timestamp: (!self.config.no_timestamp).then_some(record.timestamp),
            service_context: ServiceContext {
                service: &self.config.service,
                version: &self.config.version,
            },
            context: Context {
                data,
                http_request: record.http_request.as_ref(),
                report_location,
            },
            source_location: location,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Entry<'a> {
    severity: Severity,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    service_context: ServiceContext<'a>,
    #[serde(skip_serializing_if = "Context::is_empty")]
    context: Context<'a>,
    source_location: SourceLocation,
}

#[derive(Serialize)]
struct ServiceContext<'a> {
    service: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Context<'a> {
    #[serde(skip_serializing_if = "Map::is_empty")]
    data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_request: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_location: Option<SourceLocation>,
}

impl Context<'_> {
    fn is_empty(&self) -> bool {
        self.data.is_empty() && self.http_request.is_none() && self.report_location.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use chrono::TimeZone;
    use serde_json::json;

    fn site() -> SourceLocation {
        SourceLocation {
            file: "src/handlers.rs".into(),
            line: 42,
            function: "create_order".into(),
        }
    }

    fn render(formatter: &Formatter, record: &LogRecord) -> Value {
        let line = formatter.render_at(record, site()).unwrap();
        assert!(line.ends_with('\n'));
        serde_json::from_str(&line).unwrap()
    }

    fn formatter() -> Formatter {
        Formatter::new()
            .with_service("test")
            .with_version("0.1")
            .with_no_timestamp()
    }

    #[test]
    fn info_without_fields_has_no_context() {
        let got = render(&formatter(), &LogRecord::new(Level::Info, "my log entry"));
        assert_eq!(
            got,
            json!({
                "severity": "INFO",
                "message": "my log entry",
                "serviceContext": {"service": "test", "version": "0.1"},
                "sourceLocation": {"file": "src/handlers.rs", "line": 42, "function": "create_order"},
            })
        );
    }

    #[test]
    fn error_slot_extends_message_and_data() {
        let record = LogRecord::new(Level::Info, "my log entry")
            .with_field("foo", "bar")
            .with_error_text("test error");
        let got = render(&formatter(), &record);
        assert_eq!(got["message"], "my log entry: test error");
        assert_eq!(got["context"]["data"], json!({"foo": "bar", "error": "test error"}));
        assert!(got["context"].get("reportLocation").is_none());
    }

    #[test]
    fn error_severity_reports_location() {
        let record = LogRecord::new(Level::Error, "my log entry").with_field("foo", "bar");
        let got = render(&formatter(), &record);
        assert_eq!(got["severity"], "ERROR");
        assert_eq!(got["context"]["reportLocation"], got["sourceLocation"]);
    }

    #[test]
    fn http_request_is_promoted_out_of_data() {
        let record = LogRecord::new(Level::Error, "my log entry")
            .with_field("foo", "bar")
            .with_http_request(json!({"requestMethod": "GET"}));
        let got = render(&formatter(), &record);
        assert_eq!(got["context"]["httpRequest"], json!({"requestMethod": "GET"}));
        assert_eq!(got["context"]["data"], json!({"foo": "bar"}));
    }

    #[test]
    fn timestamp_is_rfc3339_unless_suppressed() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let record = LogRecord::new(Level::Warning, "slow").with_timestamp(at);

        let with_time = render(&Formatter::new(), &record);
        assert_eq!(with_time["timestamp"], "2024-05-01T12:30:00Z");

        let without = render(&formatter(), &record);
        assert!(without.get("timestamp").is_none());
    }

    #[test]
    fn fatal_and_panic_keep_their_severities() {
        let fatal = render(&formatter(), &LogRecord::new(Level::Fatal, "down"));
        let panic = render(&formatter(), &LogRecord::new(Level::Panic, "boom"));
        assert_eq!(fatal["severity"], "CRITICAL");
        assert_eq!(panic["severity"], "ALERT");
        assert!(panic["context"].get("reportLocation").is_some());
    }

    #[test]
    fn same_record_renders_identically() {
        let record = LogRecord::new(Level::Error, "again").with_field("n", 1);
        let f = formatter();
        assert_eq!(
            f.render_at(&record, site()).unwrap(),
            f.render_at(&record, site()).unwrap()
        );
    }

    #[test]
    fn stack_skip_prefixes_accumulate() {
        let f = Formatter::new().with_stack_skip("a::log").with_stack_skip("b::log");
        assert_eq!(f.config().stack_skip, vec!["a::log", "b::log"]);
    }
}
