//! Converter tests against mocked providers

use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::ConverterConfig;
use crate::definition::QueryDefinition;
use crate::providers::{
    MockFunctionProvider, MockVirtualFieldProvider, MockVirtualRelationProvider, VirtualJoin,
    VirtualJoins, VirtualQuery,
};

use super::{ConversionSummary, ConvertResult, QueryConverter, RecordingBackend};


fn no_virtual_fields() -> MockVirtualFieldProvider {
    let mut provider = MockVirtualFieldProvider::new();
    provider.expect_is_virtual_field().returning(|_, _| false);
    provider
}

fn no_virtual_relations() -> MockVirtualRelationProvider {
    let mut provider = MockVirtualRelationProvider::new();
    provider.expect_is_virtual_relation().returning(|_, _| false);
    provider
}

fn converter(fields: MockVirtualFieldProvider) -> QueryConverter {
    QueryConverter::new(Arc::new(MockFunctionProvider::new()), Arc::new(fields))
}

fn definition(value: Value) -> QueryDefinition {
    QueryDefinition::from_value(&value, Some("Order")).expect("valid definition")
}

fn run(
    converter: &QueryConverter,
    value: Value,
) -> (ConvertResult<ConversionSummary>, RecordingBackend) {
    let mut backend = RecordingBackend::new();
    let result = converter.convert(&definition(value), &mut backend);
    (result, backend)
}

fn recipe(expr: &str, inner: Vec<VirtualJoin>, left: Vec<VirtualJoin>) -> VirtualQuery {
    VirtualQuery {
        join: VirtualJoins { inner, left },
        ..VirtualQuery::with_expr(expr)
    }
}

fn columns(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|name| json!({"name": name})).collect())
}

fn strict_config(max_join_iterations: u32) -> ConverterConfig {
    ConverterConfig {
        max_join_iterations,
        ..ConverterConfig::default()
    }
}
