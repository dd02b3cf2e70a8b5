//! Query conversion
//!
//! [`QueryConverter`] turns a [`QueryDefinition`] into the ordered statement
//! calls of a [`QueryBackend`]. The converter holds configuration and
//! providers only; the state of a conversion lives in a
//! [`ConversionContext`] created per call.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ConverterConfig;
use crate::definition::QueryDefinition;
use crate::providers::{
    FunctionProvider, ProviderCatalog, VirtualFieldProvider, VirtualRelationProvider,
};

pub mod alias_rewriter;
mod assembler;
pub mod backend;
pub mod context;
mod errors;
pub mod filter_parser;
mod virtual_joins;
mod virtual_resolver;

#[cfg(test)]
mod tests;

pub use alias_rewriter::AliasScope;
pub use backend::{
    JoinStatement, QueryBackend, RecordingBackend, SelectColumn, StatementEvent, WhereCondition,
};
pub use context::{
    AliasMap, ColumnBinding, ConversionContext, PreparedFunction, RelationExpansion,
    VirtualColumnOptions,
};
pub use errors::ConvertError;
pub use filter_parser::{validate_filters, FilterParser, FilterVisitor};
pub use virtual_joins::MaterializedJoin;

pub type ConvertResult<T> = Result<T, ConvertError>;

/// What a conversion registered, handed back to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub table_aliases: AliasMap,
    pub column_aliases: AliasMap,
    pub virtual_column_expressions: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct QueryConverter {
    config: ConverterConfig,
    function_provider: Arc<dyn FunctionProvider>,
    virtual_field_provider: Arc<dyn VirtualFieldProvider>,
    virtual_relation_provider: Option<Arc<dyn VirtualRelationProvider>>,
}

impl QueryConverter {
    pub fn new(
        function_provider: Arc<dyn FunctionProvider>,
        virtual_field_provider: Arc<dyn VirtualFieldProvider>,
    ) -> Self {
        Self {
            config: ConverterConfig::default(),
            function_provider,
            virtual_field_provider,
            virtual_relation_provider: None,
        }
    }

    /// Converter backed by one catalog for all three providers
    pub fn from_catalog(catalog: Arc<ProviderCatalog>) -> Self {
        let relations = catalog.clone() as Arc<dyn VirtualRelationProvider>;
        Self::new(catalog.clone(), catalog).with_virtual_relation_provider(relations)
    }

    pub fn with_config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_virtual_relation_provider(
        mut self,
        provider: Arc<dyn VirtualRelationProvider>,
    ) -> Self {
        self.virtual_relation_provider = Some(provider);
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Emits the statements of `definition` to `backend`.
    ///
    /// On error the backend may hold a partial query and should be discarded.
    pub fn convert<B: QueryBackend + ?Sized>(
        &self,
        definition: &QueryDefinition,
        backend: &mut B,
    ) -> ConvertResult<ConversionSummary> {
        if definition.columns.is_empty() {
            return Err(ConvertError::EmptyColumnsDefinition);
        }

        let mut ctx = ConversionContext::new(
            &self.config,
            &definition.root_entity,
            self.virtual_field_provider.as_ref(),
            self.virtual_relation_provider.as_deref(),
            self.function_provider.as_ref(),
        );

        if let Err(e) = assembler::assemble(&mut ctx, definition, backend) {
            log::warn!(
                "Conversion of a {} query failed: {}",
                definition.root_entity,
                e
            );
            return Err(e);
        }

        let summary = ConversionSummary {
            table_aliases: ctx.table_aliases(),
            column_aliases: ctx.column_aliases().clone(),
            virtual_column_expressions: ctx
                .virtual_column_expressions()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        log::info!(
            "Converted {} query: {} columns, {} tables, {} virtual columns",
            definition.root_entity,
            summary.column_aliases.len(),
            summary.table_aliases.len(),
            summary.virtual_column_expressions.len()
        );
        Ok(summary)
    }

    /// Parses a JSON definition and converts it
    pub fn convert_value<B: QueryBackend + ?Sized>(
        &self,
        value: &Value,
        root_entity: Option<&str>,
        backend: &mut B,
    ) -> ConvertResult<ConversionSummary> {
        let definition = QueryDefinition::from_value(value, root_entity)?;
        self.convert(&definition, backend)
    }
}
