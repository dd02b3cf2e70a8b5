use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("`{entity_class}::{field_name}` is not a virtual field")]
    UnknownVirtualField {
        entity_class: String,
        field_name: String,
    },

    #[error("`{entity_class}::{field_name}` is not a virtual relation")]
    UnknownVirtualRelation {
        entity_class: String,
        field_name: String,
    },

    #[error("Unknown function `{name}` in group `{group_name}` ({group_type})")]
    UnknownFunction {
        name: String,
        group_name: String,
        group_type: String,
    },

    #[error("Invalid function expression: {0}")]
    InvalidFunctionExpression(String),

    #[error("Invalid recipe for `{key}`: {reason}")]
    InvalidRecipe { key: String, reason: String },
}

/// Errors raised while loading a provider catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Catalog validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
