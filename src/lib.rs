//! Query designer conversion
//!
//! This crate turns JSON query designer definitions into ordered statement
//! builder calls:
//! - Join identifiers naming every table a column path reaches
//! - Stable table and column aliases per conversion
//! - Virtual fields and relations expanded from provider recipes
//! - Filter trees checked and emitted as grouped WHERE conditions
//! - An SQL backend rendering the result with bound parameters

pub mod config;
pub mod converter;
pub mod definition;
pub mod join_identifier;
pub mod providers;
pub mod sql_generator;

pub use converter::{ConversionSummary, ConvertError, QueryBackend, QueryConverter};
pub use definition::QueryDefinition;
