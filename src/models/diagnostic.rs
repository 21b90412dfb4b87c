//! Severity-tagged diagnostics.
//!
//! The validator reports every check it performs as a [`Diagnostic`] instead
//! of failing on the first problem it can correct. Callers inspect the
//! collected [`Diagnostics`] and abort only when a fatal entry is present.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Diagnostic severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    /// Aborts startup of the dependent subsystem.
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    /// Forward this diagnostic to `tracing` at the matching level.
    pub fn emit(&self) {
        match self.severity {
            Severity::Trace => tracing::trace!("{}", self.message),
            Severity::Debug => tracing::debug!("{}", self.message),
            Severity::Info => tracing::info!("{}", self.message),
            Severity::Warning => tracing::warn!("{}", self.message),
            Severity::Error => tracing::error!("{}", self.message),
            Severity::Fatal => tracing::error!(fatal = true, "{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// An ordered collection of diagnostics.
///
/// Every pushed entry is also emitted through `tracing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(severity, message);
        diagnostic.emit();
        self.entries.push(diagnostic);
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(Severity::Debug, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn fatal(&mut self, message: impl Into<String>) {
        self.push(Severity::Fatal, message);
    }

    /// Highest severity recorded so far.
    pub fn max_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|d| d.severity).max()
    }

    pub fn has_fatal(&self) -> bool {
        self.at_least(Severity::Fatal).next().is_some()
    }

    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Warning)
    }

    /// Entries at or above `severity`.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity >= severity)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("FATAL".parse::<Severity>().unwrap(), Severity::Fatal);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("panic".parse::<Severity>().is_err());
    }

    #[test]
    fn test_diagnostics_max_and_fatal() {
        let mut diags = Diagnostics::new();
        assert_eq!(diags.max_severity(), None);
        assert!(!diags.has_fatal());

        diags.debug("checking");
        diags.warning("sslmode downgraded");
        assert_eq!(diags.max_severity(), Some(Severity::Warning));
        assert!(diags.has_warnings());
        assert!(!diags.has_fatal());

        diags.fatal("port out of range");
        assert!(diags.has_fatal());
        assert_eq!(diags.at_least(Severity::Warning).count(), 2);
        assert_eq!(diags.len(), 3);
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new(Severity::Warning, "pool too small");
        assert_eq!(d.to_string(), "[warning] pool too small");
    }
}
