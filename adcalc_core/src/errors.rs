//! # Error Types
//!
//! Structured error types for adcalc_core. Every failure a calculator can
//! raise is deterministic: the same inputs fail the same way every time, so
//! callers should surface the message instead of retrying.
//!
//! Soft data-quality issues (atypical ratios, interpolated cost tiers,
//! assumed defaults) are never errors. They travel inside the result as
//! [`CalcWarning`] entries.
//!
//! ## Example
//!
//! ```rust
//! use adcalc_core::errors::{CalcError, CalcResult};
//!
//! fn validate_distance(miles: f64) -> CalcResult<()> {
//!     if miles < 0.0 {
//!         return Err(CalcError::invalid_input(
//!             "interconnect_distance_miles",
//!             miles.to_string(),
//!             "Distance cannot be negative",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for adcalc_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for calculation operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// An input value is invalid (out of range, wrong type, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A required field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A quantity or unit string could not be interpreted
    #[error("Could not parse '{input}': {reason}")]
    ParseError { input: String, reason: String },

    /// Named profile is not in the reference library
    #[error("Profile not found: {name}")]
    ProfileNotFound { name: String },

    /// The calculator does not handle this project type
    #[error("{calculator} does not support project type {project_type}; use {alternative} instead")]
    UnsupportedProjectType {
        calculator: String,
        project_type: String,
        alternative: String,
    },

    /// The sizing driver is above the top of the cost table
    #[error("Capacity exceeded: {driver} of {value} {unit} is above the supported maximum of {max} {unit}")]
    CapacityExceeded {
        driver: String,
        value: f64,
        unit: String,
        max: f64,
    },

    /// No usable sizing driver in the upstream summary
    #[error("Sizing driver not found in mass balance summary (searched: {searched})")]
    SizingDriverNotFound { searched: String },

    /// A dotted override path does not address a field in the document
    #[error("Invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        CalcError::MissingField {
            field: field.into(),
        }
    }

    /// Create a ParseError
    pub fn parse_error(input: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::ParseError {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a ProfileNotFound error
    pub fn profile_not_found(name: impl Into<String>) -> Self {
        CalcError::ProfileNotFound { name: name.into() }
    }

    /// Create an UnsupportedProjectType error
    pub fn unsupported_project_type(
        calculator: impl Into<String>,
        project_type: impl Into<String>,
        alternative: impl Into<String>,
    ) -> Self {
        CalcError::UnsupportedProjectType {
            calculator: calculator.into(),
            project_type: project_type.into(),
            alternative: alternative.into(),
        }
    }

    /// Create a CapacityExceeded error
    pub fn capacity_exceeded(driver: impl Into<String>, value: f64, unit: impl Into<String>, max: f64) -> Self {
        CalcError::CapacityExceeded {
            driver: driver.into(),
            value,
            unit: unit.into(),
            max,
        }
    }

    /// Create an InvalidFieldPath error
    pub fn invalid_field_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidFieldPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SerializationError from any displayable error
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        CalcError::SerializationError {
            reason: err.to_string(),
        }
    }

    /// Engine failures are deterministic; retrying with the same input
    /// yields the same error. Only serialization of caller-supplied
    /// documents can depend on something outside the inputs.
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, CalcError::SerializationError { .. } | CalcError::Internal { .. })
    }

    /// Whether the caller should fall back to the AI estimation path
    pub fn suggests_alternative_path(&self) -> bool {
        matches!(self, CalcError::UnsupportedProjectType { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::MissingField { .. } => "MISSING_FIELD",
            CalcError::ParseError { .. } => "PARSE_ERROR",
            CalcError::ProfileNotFound { .. } => "PROFILE_NOT_FOUND",
            CalcError::UnsupportedProjectType { .. } => "UNSUPPORTED_PROJECT_TYPE",
            CalcError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            CalcError::SizingDriverNotFound { .. } => "SIZING_DRIVER_NOT_FOUND",
            CalcError::InvalidFieldPath { .. } => "INVALID_FIELD_PATH",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// Soft issues
// ============================================================================

/// Severity of a warning embedded in a result document.
///
/// `Error` marks a degraded result (e.g. zero usable feed): the document
/// is well-formed but empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A non-fatal data-quality note attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcWarning {
    /// Field or area the warning refers to
    pub field: String,
    /// Human-readable explanation
    pub message: String,
    pub severity: Severity,
}

impl CalcWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        CalcWarning {
            field: field.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, Severity::Error)
    }

    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, Severity::Warning)
    }

    pub fn info(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, Severity::Info)
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}
