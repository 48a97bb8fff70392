// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error taxonomy for the capture pipeline
//!
//! Validation errors are local and block submission until the user fixes
//! the draft. Submission errors come from the remote creation services and
//! leave the draft intact for a manual retry. A block that cannot be
//! resolved from the location is not an error at all; it shows up as `None`.

use rust_decimal::Decimal;
use thiserror::Error;

/// Local, blocking problem with a draft
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is empty or unset
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// At least one file in an attachment batch is over the size ceiling
    #[error("{name} is {size} bytes, over the {limit} byte attachment limit; no files were added")]
    SizeLimitExceeded {
        /// First offending file
        name: String,
        /// Its size in bytes
        size: u64,
        /// Ceiling in bytes
        limit: u64,
    },

    /// Subtracting would take stock below zero
    #[error("insufficient stock: {current} on hand, adjustment {requested} would leave {resulting}")]
    InsufficientStock {
        /// Stock on hand
        current: Decimal,
        /// Signed adjustment
        requested: Decimal,
        /// Stock after the adjustment
        resulting: Decimal,
    },

    /// The adjustment would take stock past the representable range
    #[error("quantity is out of range: {current} adjusted by {requested} cannot be represented")]
    QuantityOutOfRange {
        /// Stock on hand
        current: Decimal,
        /// Signed adjustment
        requested: Decimal,
    },

    /// The adjustment quantity is zero
    #[error("quantity must be non-zero")]
    ZeroQuantity,

    /// The adjustment magnitude is negative
    #[error("quantity must not be negative, got {0}")]
    NegativeMagnitude(Decimal),

    /// No asset picked, or the asset is not in the snapshot
    #[error("unknown asset: {0}")]
    UnresolvedAsset(String),
}

/// Failure reported by a remote creation service
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The record creation service rejected or failed the request
    #[error("could not create record: {0:#}")]
    Record(anyhow::Error),

    /// The movement creation service rejected or failed the request
    #[error("could not record stock movement: {0:#}")]
    Movement(anyhow::Error),
}

/// Any error surfaced at the capture boundary
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Draft is not submittable yet
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Remote creation failed
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl CaptureError {
    /// Text shown inline (validation) or in a dismissible banner (submission)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::MissingRequiredField(field)) => {
                format!("Please fill in the {field} before saving.")
            }
            Self::Validation(ValidationError::InsufficientStock { current, .. }) => {
                format!("Not enough stock: only {} on hand.", current.round_dp(2))
            }
            Self::Validation(e) => {
                let mut msg = e.to_string();
                if let Some(first) = msg.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                msg
            }
            Self::Submission(e) => format!("Saving failed: {e}. Your draft was kept; try again."),
        }
    }

    /// Whether the same draft may simply be resent
    #[must_use]
    pub fn is_retryable_by_user(&self) -> bool {
        matches!(self, Self::Submission(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message_names_the_field() {
        let err = CaptureError::from(ValidationError::MissingRequiredField("block"));
        assert!(err.user_message().contains("block"));
        assert!(!err.is_retryable_by_user());
    }

    #[test]
    fn submission_errors_are_retryable() {
        let err = CaptureError::from(SubmissionError::Record(anyhow::anyhow!("503 Service Unavailable")));
        assert!(err.is_retryable_by_user());
        let msg = err.user_message();
        assert!(msg.contains("503"));
        assert!(msg.contains("draft was kept"));
    }

    #[test]
    fn validation_message_is_capitalised() {
        let err = CaptureError::from(ValidationError::ZeroQuantity);
        assert_eq!(err.user_message(), "Quantity must be non-zero");
    }
}
