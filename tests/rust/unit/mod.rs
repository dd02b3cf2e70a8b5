//! Unit tests - Tests of single components through the public API
//!
//! No catalog files or backends beyond the in-memory ones are involved.

mod alias_rewriter_tests;
mod filter_grammar_tests;
mod join_identifier_tests;
