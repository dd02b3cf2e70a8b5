//! Error types for join identifier operations.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum JoinIdentifierError {
    #[error("Malformed join identifier `{0}`: the root identifier has no parent")]
    MalformedIdentifier(String),

    #[error("Invalid join segment `{segment}`: {reason}")]
    InvalidSegment { segment: String, reason: String },

    #[error("Invalid join type `{0}` (expected `inner` or `left`)")]
    InvalidJoinType(String),

    #[error("Invalid join condition type `{0}` (expected `WITH` or `ON`)")]
    InvalidConditionType(String),
}

impl JoinIdentifierError {
    pub(crate) fn invalid_segment(segment: impl Into<String>, reason: impl Into<String>) -> Self {
        JoinIdentifierError::InvalidSegment {
            segment: segment.into(),
            reason: reason.into(),
        }
    }
}
