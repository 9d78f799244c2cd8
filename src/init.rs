use crate::error::InitError;
use crate::formatter::Formatter;
use crate::record::{Level, LogRecord};
use std::io::Write;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::fmt::MakeWriter;

/// Where the installed subscriber writes its lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Stdout,
    Stderr,
}

/// Configuration of the subscriber installed by [`init_tracing_with_config`].
///
/// **Fields**
/// - `max_level`: events above this verbosity are filtered out before they
///   reach the formatter.
/// - `target`: stream the JSON lines are written to. Cloud Run and GKE pick
///   up both; stdout is the default.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub max_level: LevelFilter,
    pub target: Target,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            max_level: LevelFilter::INFO,
            target: Target::Stdout,
        }
    }
}

/// A `fmt` layer that renders every event with `formatter`.
///
/// Use this to compose the formatter with other layers on a registry; pair it
/// with `.with_writer(..)` to choose the output.
pub fn layer<S>(formatter: Formatter) -> tracing_subscriber::fmt::Layer<S, DefaultFields, Formatter>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer().event_format(formatter)
}

/// Install a global `tracing` subscriber that writes Cloud Logging JSON.
///
/// **Parameters**
/// - `formatter`: configured [`Formatter`] used for every event.
/// - `config`: [`LayerConfig`] with the level filter and output stream.
///
/// **Returns**
/// - `Err(InitError::AlreadyInstalled)` if a global subscriber was set
///   before.
pub fn init_tracing_with_config(formatter: Formatter, config: LayerConfig) -> Result<(), InitError> {
    let builder = tracing_subscriber::fmt()
        .event_format(formatter)
        .with_max_level(config.max_level);

    // The writer is part of the subscriber type, so build one per target.
    match config.target {
        Target::Stdout => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stdout).finish())?
        }
        Target::Stderr => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())?
        }
    }
    Ok(())
}

/// Install the formatter with [`LayerConfig::default`].
pub fn init_tracing(formatter: Formatter) -> Result<(), InitError> {
    init_tracing_with_config(formatter, LayerConfig::default())
}

/// Replace the process panic hook with one that logs panics as
/// [`Level::Panic`] records (severity `ALERT`) on stderr.
pub fn install_panic_hook(formatter: Formatter) {
    install_panic_hook_with_writer(formatter, std::io::stderr);
}

/// Like [`install_panic_hook`], writing to `make_writer` instead of stderr.
///
/// The panic location reported by the runtime is added as `panic.file` and
/// `panic.line` fields; the call site itself is attributed from the stack
/// like any other record.
pub fn install_panic_hook_with_writer<W>(formatter: Formatter, make_writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    std::panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        let mut record = LogRecord::new(Level::Panic, message);
        if let Some(location) = info.location() {
            record = record
                .with_field("panic.file", location.file())
                .with_field("panic.line", location.line());
        }
        if let Some(name) = std::thread::current().name() {
            record = record.with_field("thread", name);
        }

        match formatter.format(&record) {
            Ok(bytes) => {
                if let Err(e) = make_writer.make_writer().write_all(&bytes) {
                    eprintln!("error writing panic log: {}", e);
                }
            }
            Err(e) => eprintln!("error formatting panic log: {}", e),
        }
    }));
}
