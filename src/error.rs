//! Error types for palletizer-motion.
//!
//! Provides unified error handling across script compilation, motion planning,
//! command dispatch, device feedback and configuration.

use core::fmt;

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all palletizer-motion operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Script failed to compile
    #[error("Compile error: {0}")]
    Compile(#[from] CompileErrors),
    /// Planner rejected its input
    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),
    /// Command could not be handed to the device link
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    /// Device reported an explicit error
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    /// Device did not answer in time
    #[error("Timeout: {0}")]
    Timeout(#[from] TimeoutError),
    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Category of a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    /// Statement or keyword not recognised
    UnknownToken,
    /// Numeric literal could not be parsed or is out of range
    MalformedNumber,
    /// Statement arguments have the wrong shape
    MalformedStatement,
    /// `FUNC` header, name or placement is invalid
    MalformedFunction,
    /// `{` or legacy block opener without its terminator
    UnterminatedBlock,
    /// `CALL` to a function that is not defined before the call site
    UndefinedFunction,
    /// `CALL` chain that re-enters itself or nests too deep
    RecursiveCall,
    /// Loop unrolling / call expansion grew past the configured limit
    ExpansionLimit,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompileErrorKind::UnknownToken => "unknown token",
            CompileErrorKind::MalformedNumber => "malformed number",
            CompileErrorKind::MalformedStatement => "malformed statement",
            CompileErrorKind::MalformedFunction => "malformed function",
            CompileErrorKind::UnterminatedBlock => "unterminated block",
            CompileErrorKind::UndefinedFunction => "undefined function",
            CompileErrorKind::RecursiveCall => "recursive call",
            CompileErrorKind::ExpansionLimit => "expansion limit",
        };
        f.write_str(name)
    }
}

/// A single line-numbered diagnostic produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("line {line}: {message}")]
pub struct CompileError {
    /// 1-based source line
    pub line: usize,
    /// Error category
    pub kind: CompileErrorKind,
    /// Human readable description
    pub message: String,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(line: usize, kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
        }
    }
}

/// All diagnostics from one `compile()` call, ordered by source line.
///
/// Never empty when returned from the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(Vec<CompileError>);

impl CompileErrors {
    /// Wrap a list of errors, sorting them by line (stable).
    pub fn new(mut errors: Vec<CompileError>) -> Self {
        errors.sort_by_key(|e| e.line);
        Self(errors)
    }

    /// The first error, reported as the failure reason.
    pub fn headline(&self) -> Option<&CompileError> {
        self.0.first()
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all errors.
    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.0.iter()
    }

    /// Check whether any error has the given kind.
    pub fn contains_kind(&self, kind: CompileErrorKind) -> bool {
        self.0.iter().any(|e| e.kind == kind)
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<CompileError> {
        self.0
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_first() {
            None => f.write_str("no errors"),
            Some((first, [])) => write!(f, "{}", first),
            Some((first, rest)) => write!(f, "{} (and {} more)", first, rest.len()),
        }
    }
}

impl std::error::Error for CompileErrors {}

/// Motion planning errors.
///
/// The planner itself is total over well-formed input; these come from
/// [`Planner::validate`](crate::motion::Planner::validate).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    /// `CALL`/`LOOP` survived expansion
    #[error("line {line}: unexpanded {construct} reached the planner")]
    UnexpandedControlFlow {
        /// Source line
        line: usize,
        /// `CALL` or `LOOP`
        construct: &'static str,
    },
    /// Speed or acceleration override is not a positive finite number
    #[error("line {line}: invalid {field} override {value}")]
    InvalidOverride {
        /// Source line
        line: usize,
        /// `speed` or `accel`
        field: &'static str,
        /// Offending value
        value: f64,
    },
}

/// Errors raised while handing a command to the device link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Link is down; the command stays queued
    #[error("device link is not connected")]
    NotConnected,
    /// Transport failure while writing
    #[error("link failure: {0}")]
    Link(String),
    /// Command has no wire representation
    #[error("{0} cannot be sent to the device")]
    Unserializable(&'static str),
    /// JSON encoding failed
    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// Explicit error payload reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", .code.map(|c| format!(" (code {})", c)).unwrap_or_default())]
pub struct DeviceError {
    /// Device supplied message
    pub message: String,
    /// Optional firmware error code
    pub code: Option<i32>,
}

/// No acknowledgement arrived within the command's timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command {command} not acknowledged within {timeout_ms} ms")]
pub struct TimeoutError {
    /// Queue id of the command
    pub command: u64,
    /// Timeout that elapsed
    pub timeout_ms: u64,
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    #[error("Parse error: {0}")]
    ParseError(String),
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(String),
    /// Default speed must be positive
    #[error("Invalid default speed: {0}. Must be > 0")]
    InvalidDefaultSpeed(f64),
    /// Default acceleration must be positive
    #[error("Invalid default acceleration: {0}. Must be > 0")]
    InvalidDefaultAccel(f64),
    /// Retry budget out of range
    #[error("Invalid max retries: {0}. Must be 0-16")]
    InvalidMaxRetries(u32),
    /// Timeout must be positive
    #[error("Invalid command timeout: {0} ms. Must be > 0")]
    InvalidTimeout(u64),
    /// Duration factor must be non-negative
    #[error("Invalid timeout duration factor: {0}. Must be >= 0")]
    InvalidDurationFactor(f64),
    /// Call depth must allow at least one level
    #[error("Invalid max call depth: 0. Must be > 0")]
    InvalidCallDepth,
    /// Broadcast channel needs capacity
    #[error("Invalid event capacity: 0. Must be > 0")]
    InvalidEventCapacity,
    /// Interval must be positive
    #[error("Invalid interval for {0}: must be > 0 ms")]
    InvalidInterval(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headline_is_earliest_line() {
        let errors = CompileErrors::new(vec![
            CompileError::new(7, CompileErrorKind::UnknownToken, "unknown statement 'FOO'"),
            CompileError::new(2, CompileErrorKind::MalformedNumber, "bad number 'x1'"),
        ]);

        assert_eq!(errors.headline().unwrap().line, 2);
        assert_eq!(errors.to_string(), "line 2: bad number 'x1' (and 1 more)");
    }

    #[test]
    fn test_device_error_display() {
        let err = DeviceError {
            message: "limit switch".into(),
            code: Some(12),
        };
        assert_eq!(err.to_string(), "limit switch (code 12)");

        let err = DeviceError {
            message: "stall".into(),
            code: None,
        };
        assert_eq!(err.to_string(), "stall");
    }

    #[test]
    fn test_conversion_into_error() {
        let err: Error = DispatchError::NotConnected.into();
        assert!(matches!(err, Error::Dispatch(DispatchError::NotConnected)));
    }
}
