use thiserror::Error;

use crate::converter::ConvertError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlGeneratorError {
    #[error("Unsupported filter `{0}` (allowed: string, number, integer, decimal, date, datetime, boolean)")]
    UnsupportedFilter(String),
    #[error("Unsupported comparison `{kind}` for filter `{filter}`")]
    UnsupportedComparison { filter: String, kind: String },
    #[error("Filter `{filter}` with comparison `{kind}` needs a value")]
    MissingFilterValue { filter: String, kind: String },
    #[error("No FROM statement was added to the query")]
    MissingFromStatement,
}

impl From<SqlGeneratorError> for ConvertError {
    fn from(err: SqlGeneratorError) -> Self {
        ConvertError::Backend(err.to_string())
    }
}
