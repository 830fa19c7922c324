//! Error taxonomy shared by every crate in the workspace.
//!
//! Validation and domain rule violations are raised before any I/O. Storage
//! and queue variants wrap transport failures and are surfaced after the
//! surrounding transaction has been rolled back.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Boxed transport error from a queue backend.
pub type QueueSendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single failed input check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Dotted path of the offending field (e.g. `constituents[3].ticker`).
    pub field: String,
    pub message: String,
}

/// Every violation found while validating one input, collected in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    /// Returns true if any violation was recorded against `field`.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    /// Converts the collected violations into a result.
    ///
    /// # Errors
    /// Returns [`RefDataError::Validation`] when at least one violation was recorded.
    pub fn into_result(self) -> Result<(), RefDataError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RefDataError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors raised by snapshot construction, persistence, job enqueue and queries.
#[derive(Debug, Error)]
pub enum RefDataError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A universe snapshot did not carry the required number of constituents.
    #[error("universe snapshot must contain exactly {expected} constituents, got {actual}")]
    Cardinality {
        /// Required constituent count.
        expected: usize,
        /// Count supplied by the caller.
        actual: usize,
    },

    /// A weighting input was zero or negative.
    #[error("free float market cap for {ticker} must be > 0")]
    InvalidWeightInput {
        /// Ticker whose weighting input was rejected.
        ticker: String,
    },

    /// The weighting denominator was not strictly positive (or overflowed).
    #[error("aggregated free float market cap must be > 0")]
    DegenerateAggregate,

    /// Candidate constituent rows repeat an id, position or ticker.
    #[error("duplicate constituent {field}: {value}")]
    DuplicateConstituent {
        /// Which column repeated: `constituent_id`, `position` or `ticker`.
        field: &'static str,
        value: String,
    },

    /// Candidate price or factor rows repeat their natural key.
    #[error("duplicate {table} row: {key}")]
    DuplicatePriceRow {
        /// `prices` or `factors`.
        table: &'static str,
        key: String,
    },

    /// A queued or running job already exists for the dedup key.
    #[error("rebalance job already queued or running for this tenant and effective date")]
    DuplicateJob,

    /// No snapshot matched the request.
    #[error("snapshot not found")]
    SnapshotNotFound,

    /// A requested job does not exist for the tenant.
    #[error("rebalance job not found")]
    JobNotFound,

    /// A pagination cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Relational store failure.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row read back from storage could not be mapped to a domain value.
    #[error("corrupt row in {table}: {message}")]
    CorruptRow {
        table: &'static str,
        message: String,
    },

    /// Queue publish failure.
    #[error("queue send failed: {0}")]
    Queue(#[source] QueueSendError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RefDataError {
    /// Wraps any transport error raised by a queue backend.
    pub fn queue(err: impl Into<QueueSendError>) -> Self {
        Self::Queue(err.into())
    }

    /// Returns true for errors detected before any I/O was attempted.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Cardinality { .. }
                | Self::InvalidWeightInput { .. }
                | Self::DegenerateAggregate
                | Self::DuplicateConstituent { .. }
                | Self::DuplicatePriceRow { .. }
                | Self::InvalidCursor(_)
        )
    }
}
