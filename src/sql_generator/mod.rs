//! SQL rendering backend
//!
//! [`SqlQueryBackend`] collects conversion events into an [`SqlQuery`] and
//! renders it clause by clause. Filter values are bound as named parameters.
//! It is one possible backend; how it reads filter data is its own affair.

pub mod errors;
pub mod filters;
pub mod query;

pub use errors::SqlGeneratorError;
pub use filters::{render_condition, Parameters};
pub use query::{SqlQuery, SqlQueryBackend};

pub trait ToSql {
    fn to_sql(&self) -> String;
}
