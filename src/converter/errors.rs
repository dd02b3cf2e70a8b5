//! Error types for query conversion.

use thiserror::Error;

use crate::definition::DefinitionError;
use crate::join_identifier::JoinIdentifierError;
use crate::providers::ProviderError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConvertError {
    #[error("The \"columns\" definition does not exist.")]
    MissingColumnsDefinition,

    #[error("The \"columns\" definition must not be empty.")]
    EmptyColumnsDefinition,

    #[error("Invalid filters definition: {reason}. Token: {token}")]
    InvalidFilterGrammar { reason: String, token: String },

    #[error("The grouping column \"{0}\" must be declared in SELECT clause.")]
    UngroupedSelectColumn(String),

    #[error(
        "Could not reorder joins correctly after {iterations} iterations; unresolved aliases: {}",
        .unresolved.join(", ")
    )]
    JoinOrderingFailure {
        iterations: u32,
        unresolved: Vec<String>,
    },

    #[error("Malformed join identifier `{0}`")]
    MalformedIdentifier(String),

    #[error("Invalid function expression: {0}")]
    InvalidFunctionExpression(String),

    #[error("Unknown table alias `{0}`")]
    UnknownTableAlias(String),

    #[error("Column `{0}` was not prepared for this conversion")]
    UnknownColumn(String),

    #[error(transparent)]
    JoinIdentifier(JoinIdentifierError),

    #[error(transparent)]
    Definition(DefinitionError),

    #[error(transparent)]
    Provider(ProviderError),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<JoinIdentifierError> for ConvertError {
    fn from(err: JoinIdentifierError) -> Self {
        match err {
            JoinIdentifierError::MalformedIdentifier(id) => ConvertError::MalformedIdentifier(id),
            other => ConvertError::JoinIdentifier(other),
        }
    }
}

impl From<DefinitionError> for ConvertError {
    fn from(err: DefinitionError) -> Self {
        match err {
            DefinitionError::MissingColumnsDefinition => ConvertError::MissingColumnsDefinition,
            DefinitionError::EmptyColumnsDefinition => ConvertError::EmptyColumnsDefinition,
            DefinitionError::InvalidFilterGrammar { reason, token } => {
                ConvertError::InvalidFilterGrammar { reason, token }
            }
            other => ConvertError::Definition(other),
        }
    }
}

impl From<ProviderError> for ConvertError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidFunctionExpression(reason) => {
                ConvertError::InvalidFunctionExpression(reason)
            }
            other => ConvertError::Provider(other),
        }
    }
}

impl ConvertError {
    pub(crate) fn grammar(reason: impl Into<String>, token: impl Into<String>) -> Self {
        ConvertError::InvalidFilterGrammar {
            reason: reason.into(),
            token: token.into(),
        }
    }
}
