//! Integration tests - Full conversions through catalogs and backends
//!
//! These tests verify that definition parsing, providers, the converter and
//! the backends work together correctly.

mod catalog_conversion_tests;
mod conversion_contract_tests;
mod sql_backend_tests;
