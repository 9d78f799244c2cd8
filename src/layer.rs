use crate::formatter::Formatter;
use crate::location::CallSite;
use crate::record::{Level, LogRecord};
use chrono::Utc;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Event field that fills [`LogRecord::error`].
pub const ERROR_FIELD: &str = "error";

/// Event field that fills [`LogRecord::http_request`].
///
/// The value is expected to be a JSON object rendered as a string, e.g.
/// `http_request = %serde_json::json!({"requestMethod": "GET"})`.
pub const HTTP_REQUEST_FIELD: &str = "http_request";

/// Accepted spelling of [`HTTP_REQUEST_FIELD`] matching the wire key.
pub const HTTP_REQUEST_FIELD_ALIAS: &str = "httpRequest";

/// `tracing_subscriber` event formatter.
///
/// Plug it into the `fmt` layer with `.event_format(formatter)`; every event
/// becomes one Cloud Logging JSON line on the layer's writer. Attribution runs
/// inside this call, which sits below the `tracing` macro on the same stack.
impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let record = record_from_event(event);
        match self.render(&record) {
            Ok(line) => writer.write_str(&line),
            Err(e) => {
                eprintln!("error formatting log event: {}", e);
                Err(fmt::Error)
            }
        }
    }
}

/// Build a [`LogRecord`] from a `tracing` event, stamped with the current time.
///
/// The `message` field becomes the record message; [`ERROR_FIELD`] and
/// [`HTTP_REQUEST_FIELD`] go to their slots; everything else lands in
/// `fields`.
pub fn record_from_event(event: &Event<'_>) -> LogRecord {
    let mut fields = BTreeMap::new();
    let mut message: Option<String> = None;
    let mut error: Option<String> = None;
    let mut http_request: Option<serde_json::Value> = None;

    let mut visitor = FieldVisitor {
        fields: &mut fields,
        message: &mut message,
        error: &mut error,
        http_request: &mut http_request,
    };
    event.record(&mut visitor);

    let meta = event.metadata();
    let callsite = match (meta.module_path(), meta.file(), meta.line()) {
        (Some(module_path), Some(file), Some(line)) => Some(CallSite {
            module_path,
            file,
            line,
        }),
        _ => None,
    };

    LogRecord {
        timestamp: Utc::now(),
        level: Level::from(meta.level()),
        message: message.unwrap_or_default(),
        fields,
        error,
        http_request,
        callsite,
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
    pub error: &'a mut Option<String>,
    pub http_request: &'a mut Option<serde_json::Value>,
}

impl FieldVisitor<'_> {
    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => *self.message = Some(value),
            ERROR_FIELD => *self.error = Some(value),
            HTTP_REQUEST_FIELD | HTTP_REQUEST_FIELD_ALIAS => {
                *self.http_request = Some(parse_http_request(value));
            }
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

/// Keep a JSON object as structured data, anything else as the raw string.
fn parse_http_request(value: String) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(&value) {
        Ok(parsed @ serde_json::Value::Object(_)) => parsed,
        _ => serde_json::Value::String(value),
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}
