use crate::record::Level;
use serde::Serialize;
use std::fmt;

/// Cloud Logging severity vocabulary.
///
/// Ordered the same way Cloud Logging orders it, so `>=` comparisons such as
/// "is this an error report" work directly on the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }

    /// Map a textual level name through the level table.
    ///
    /// Unknown names map to [`Severity::Default`].
    pub fn from_level_name(name: &str) -> Self {
        Level::from_name(name).map(Severity::from).unwrap_or_default()
    }

    /// Whether entries of this severity carry an Error Reporting location.
    pub fn is_error_report(&self) -> bool {
        *self >= Severity::Error
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace | Level::Debug => Severity::Debug,
            Level::Info => Severity::Info,
            Level::Warning => Severity::Warning,
            Level::Error => Severity::Error,
            Level::Fatal => Severity::Critical,
            Level::Panic => Severity::Alert,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_table() {
        let table = [
            (Level::Trace, "DEBUG"),
            (Level::Debug, "DEBUG"),
            (Level::Info, "INFO"),
            (Level::Warning, "WARNING"),
            (Level::Error, "ERROR"),
            (Level::Fatal, "CRITICAL"),
            (Level::Panic, "ALERT"),
        ];
        for (level, expected) in table {
            assert_eq!(Severity::from(level).as_str(), expected, "{level:?}");
        }
    }

    #[test]
    fn unknown_level_names_fall_back_to_default() {
        assert_eq!(Severity::from_level_name("nonsense"), Severity::Default);
        assert_eq!(Severity::from_level_name(""), Severity::Default);
        assert_eq!(Severity::from_level_name("panic"), Severity::Alert);
    }

    #[test]
    fn only_error_and_above_report() {
        assert!(!Severity::Default.is_error_report());
        assert!(!Severity::Warning.is_error_report());
        assert!(Severity::Error.is_error_report());
        assert!(Severity::Alert.is_error_report());
    }

    #[test]
    fn serializes_upper_case() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}
