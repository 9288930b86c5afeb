//! Structured error types shared across QSE crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`QseError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the QSE engine.
///
/// Only [`QseError::Configuration`] aborts a sweep before work starts.
/// Backend failures are contained at the triple level and numerical trouble
/// in noise correction is recovered where it happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum QseError {
    /// Invalid observables, budgets, confidence levels or task parameters.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Acquisition failed, timed out, or returned malformed data.
    #[error("backend error: {0}")]
    Backend(ErrorInfo),
    /// Numerical failures that could not be recovered locally.
    #[error("numerical error: {0}")]
    Numerical(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl QseError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            QseError::Configuration(info)
            | QseError::Backend(info)
            | QseError::Numerical(info)
            | QseError::Serde(info) => info,
        }
    }

    /// Shorthand for a configuration error with the given code and message.
    pub fn config(code: &str, message: impl Into<String>) -> Self {
        QseError::Configuration(ErrorInfo::new(code, message.into()))
    }

    /// Shorthand for a backend error with the given code and message.
    pub fn backend(code: &str, message: impl Into<String>) -> Self {
        QseError::Backend(ErrorInfo::new(code, message.into()))
    }

    /// Returns true for errors that must abort before any acquisition.
    pub fn is_configuration(&self) -> bool {
        matches!(self, QseError::Configuration(_))
    }
}
