#![allow(dead_code)]

use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_stackdriver_fmt::Formatter;

/// In-memory writer shared between the subscriber and the test.
#[derive(Clone, Default)]
pub struct TestWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl TestWriter {
    pub fn output(&self) -> String {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer).to_string()
    }

    /// Every written line parsed as JSON.
    pub fn entries(&self) -> Vec<Value> {
        self.output()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "mutex poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for TestWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

pub fn test_formatter() -> Formatter {
    Formatter::new()
        .with_service("test")
        .with_version("0.1")
        .with_no_timestamp()
}

/// Run `f` with a subscriber that formats through `formatter`, returning what
/// was written.
pub fn capture(formatter: Formatter, f: impl FnOnce()) -> TestWriter {
    let writer = TestWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .event_format(formatter)
        .with_writer(writer.clone())
        .with_max_level(tracing::Level::TRACE)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    writer
}

pub fn single_entry(writer: &TestWriter) -> Value {
    let mut entries = writer.entries();
    assert_eq!(entries.len(), 1, "output: {}", writer.output());
    entries.remove(0)
}
