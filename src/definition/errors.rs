use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("The \"columns\" definition does not exist.")]
    MissingColumnsDefinition,

    #[error("The \"columns\" definition must not be empty.")]
    EmptyColumnsDefinition,

    #[error("The query definition has no root entity")]
    MissingRootEntity,

    #[error("Invalid query definition JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid \"{section}\" definition: {reason}")]
    InvalidSection { section: String, reason: String },

    #[error("Invalid column #{index}: {reason}")]
    InvalidColumn { index: usize, reason: String },

    #[error("Invalid filters definition: {reason}. Token: {token}")]
    InvalidFilterGrammar { reason: String, token: String },
}

impl DefinitionError {
    pub(crate) fn invalid_section(section: &str, reason: impl Into<String>) -> Self {
        DefinitionError::InvalidSection {
            section: section.to_string(),
            reason: reason.into(),
        }
    }
}
