// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the brbc binary.
//!
//! Controller failures exit with their exception code (1-40). Failures of
//! the tool itself use the `sysexits` range so the two never overlap.

use brbc_modbus::{BcError, ExceptionKind};
use thiserror::Error;

/// Result type alias for brbc-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the brbc binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid or unconfirmed command-line usage.
    #[error("Usage error: {0}")]
    Usage(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Bus controller error.
    #[error("Controller error [{}]: {0}", .0.code())]
    Controller(#[from] BcError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exception kind for controller errors.
    pub fn kind(&self) -> Option<ExceptionKind> {
        match self {
            Self::Controller(e) => Some(e.kind()),
            Self::WithContext { source, .. } => source.kind(),
            _ => None,
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 64,
            Self::Runtime(_) => 70,
            Self::Io(_) => 74,
            Self::Configuration(_) | Self::Controller(BcError::Configuration { .. }) => 78,
            Self::Controller(e) => i32::from(e.code()),
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::Runtime(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Runtime(format!("cannot render output: {err}"))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with appropriate formatting.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let BinError::Controller(e) = error {
        for hint in e.recovery_hints() {
            eprintln!("  Hint: {}", hint);
        }
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use brbc_modbus::ChannelKind;

    #[test]
    fn test_error_creation() {
        let err = BinError::config("test error");
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_error_with_context() {
        let err = BinError::config("inner error").with_context("outer context");
        assert_eq!(err.to_string(), "outer context: Configuration error: inner error");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::usage("test").exit_code(), 64);
        assert_eq!(BinError::runtime("test").exit_code(), 70);
        assert_eq!(BinError::io("test").exit_code(), 74);
        assert_eq!(BinError::config("test").exit_code(), 78);
    }

    #[test]
    fn test_controller_exit_codes() {
        let err = BinError::from(BcError::no_module(7, 3));
        assert_eq!(err.exit_code(), 10);
        assert_eq!(err.kind(), Some(ExceptionKind::NoModule));

        let err = BinError::from(BcError::no_data(2, ChannelKind::AnalogOut)).with_context("write-ao");
        assert_eq!(err.exit_code(), 14);

        let err = BinError::from(BcError::configuration("port", "must be between 1 and 65535"));
        assert_eq!(err.exit_code(), 78);
    }
}
