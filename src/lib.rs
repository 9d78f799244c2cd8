pub mod record;
pub mod severity;
pub mod location;
pub mod formatter;
pub mod layer;
pub mod error;

pub mod env;
pub mod init;

pub use error::{FormatError, InitError};
pub use formatter::{Formatter, FormatterConfig};
pub use location::{CallSite, SourceLocation};
pub use record::{Level, LogRecord};
pub use severity::Severity;
