//! Unified error handling for tileforge
//!
//! Every planning stage fails fast with a [`TilingError`]. The variants form a
//! small closed set, each carrying the offending field and the observed versus
//! expected values so callers can log or surface the failure without
//! re-deriving it:
//! - Config errors (bad or incomplete platform description)
//! - Invocation errors (shapes, dtypes or attributes violate the operator contract)
//! - Unsupported configurations (no registered strategy accepts the inputs)
//! - Capacity errors (the computation cannot fit the hardware budget)
//! - Internal errors (bugs, broken invariants)

use std::fmt;

/// Unified error type for the tiling engine
#[derive(Debug, thiserror::Error)]
pub enum TilingError {
    // ========== Platform Errors ==========
    /// Platform description is malformed or misses a required key
    #[error("Config error: {field}: expected {expected}, got {actual}")]
    Config {
        field: String,
        expected: String,
        actual: String,
    },

    // ========== Invocation Errors ==========
    /// Operand shape violates the operator contract
    #[error("Shape error: {operand}: {constraint} (expected {expected}, got {actual})")]
    Shape {
        operand: String,
        constraint: String,
        expected: String,
        actual: String,
    },

    /// Operand dtype is outside the supported set
    #[error("Dtype error: {operand}: expected one of {expected}, got {actual}")]
    Dtype {
        operand: String,
        expected: String,
        actual: String,
    },

    /// Operator attribute is missing, mistyped or out of range
    #[error("Invalid attribute: {attribute}: expected {expected}, got {actual}")]
    InvalidAttribute {
        attribute: String,
        expected: String,
        actual: String,
    },

    // ========== Planning Errors ==========
    /// No registered strategy can service the inputs
    #[error("Unsupported configuration for {op}: {detail}")]
    UnsupportedConfiguration { op: String, detail: String },

    /// Computation cannot fit the hardware budget even with maximal splitting
    #[error("Capacity exceeded: {field} needs {required} bytes, {available} available")]
    Capacity {
        field: String,
        required: u64,
        available: u64,
    },

    // ========== I/O Errors ==========
    /// Reading a platform description from disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Internal Errors ==========
    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TilingError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            TilingError::Config { .. } | TilingError::Io(_) => ErrorCategory::Config,
            TilingError::Shape { .. }
            | TilingError::Dtype { .. }
            | TilingError::InvalidAttribute { .. } => ErrorCategory::Invocation,
            TilingError::UnsupportedConfiguration { .. } => ErrorCategory::Unsupported,
            TilingError::Capacity { .. } => ErrorCategory::Capacity,
            TilingError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// The caller handed in tensors or attributes the operator rejects
    pub fn is_invocation_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Invocation)
    }

    /// The caller may try an alternative operator path
    ///
    /// The engine itself never retries; this only tells the caller whether a
    /// different implementation could plausibly accept the same tensors.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Unsupported | ErrorCategory::Capacity
        )
    }

    /// Platform-level failure that affects every invocation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Config | ErrorCategory::Internal
        )
    }

    /// Short tag used in logs and in the `Failed` pipeline state
    pub fn kind(&self) -> &'static str {
        match self {
            TilingError::Config { .. } => "ConfigError",
            TilingError::Shape { .. } => "ShapeError",
            TilingError::Dtype { .. } => "DtypeError",
            TilingError::InvalidAttribute { .. } => "AttributeError",
            TilingError::UnsupportedConfiguration { .. } => "UnsupportedConfigurationError",
            TilingError::Capacity { .. } => "CapacityError",
            TilingError::Io(_) => "ConfigError",
            TilingError::Internal(_) => "InternalError",
        }
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Platform description problem
    Config,
    /// Rejected invocation (shape, dtype, attribute)
    Invocation,
    /// No strategy services the inputs
    Unsupported,
    /// Hardware budget exceeded
    Capacity,
    /// Indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "Config"),
            ErrorCategory::Invocation => write!(f, "Invocation"),
            ErrorCategory::Unsupported => write!(f, "Unsupported"),
            ErrorCategory::Capacity => write!(f, "Capacity"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Result alias used throughout the crate
pub type TilingResult<T> = std::result::Result<T, TilingError>;

// ========== Helper Constructors ==========

/// Build a config error for a platform key
pub fn config_err(
    field: impl Into<String>,
    expected: impl fmt::Display,
    actual: impl fmt::Display,
) -> TilingError {
    TilingError::Config {
        field: field.into(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// Build an attribute error
pub fn attr_err(
    attribute: impl Into<String>,
    expected: impl fmt::Display,
    actual: impl fmt::Display,
) -> TilingError {
    TilingError::InvalidAttribute {
        attribute: attribute.into(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// Create a shape error
///
/// # Examples
/// ```ignore
/// return Err(shape_error!("x", "rank <= 8", 8, 9));
/// ```
#[macro_export]
macro_rules! shape_error {
    ($operand:expr, $constraint:expr, $expected:expr, $actual:expr) => {
        $crate::error::TilingError::Shape {
            operand: $operand.to_string(),
            constraint: $constraint.to_string(),
            expected: format!("{:?}", $expected),
            actual: format!("{:?}", $actual),
        }
    };
}

/// Create an internal error with context
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::TilingError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TilingError::Internal(format!($fmt, $($arg)*))
    };
}

/// Create a capacity error
#[macro_export]
macro_rules! capacity_error {
    ($field:expr, $required:expr, $available:expr) => {
        $crate::error::TilingError::Capacity {
            field: $field.to_string(),
            required: $required as u64,
            available: $available as u64,
        }
    };
}
