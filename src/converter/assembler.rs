//! Statement assembly.
//!
//! Drives one conversion: every column and filter path is registered first,
//! and function expressions are rendered next, so all table aliases exist
//! before anything is emitted. Statements then go to the backend in a fixed
//! order.

use crate::definition::{
    column_alias_key, ColumnFunction, FilterCondition, FilterNode, LogicalOperator,
    QueryDefinition,
};
use crate::join_identifier::{ConditionType, JoinHandle, JoinTarget};
use crate::providers::FunctionArgs;

use super::backend::{JoinStatement, QueryBackend, SelectColumn, WhereCondition};
use super::context::{ConversionContext, PreparedFunction};
use super::errors::ConvertError;
use super::filter_parser::{FilterParser, FilterVisitor};
use super::ConvertResult;

pub(crate) fn assemble<B: QueryBackend + ?Sized>(
    ctx: &mut ConversionContext<'_>,
    definition: &QueryDefinition,
    backend: &mut B,
) -> ConvertResult<()> {
    prepare_table_aliases(ctx, definition)?;
    prepare_column_aliases(ctx, definition);
    prepare_functions(ctx, definition)?;

    add_select_statement(ctx, definition, backend)?;
    add_from_statement(ctx, backend)?;
    add_join_statements(ctx, backend)?;
    add_where_statement(ctx, definition, backend)?;
    add_group_by_statement(ctx, definition, backend)?;
    add_order_by_statement(ctx, definition, backend)?;

    backend.save_table_aliases(&ctx.table_aliases())?;
    backend.save_column_aliases(ctx.column_aliases())?;
    Ok(())
}

/// Root first, then filter, SELECT and GROUP BY columns
fn prepare_table_aliases(
    ctx: &mut ConversionContext<'_>,
    definition: &QueryDefinition,
) -> ConvertResult<()> {
    ctx.ensure_root_joined();

    if let Some(filters) = &definition.filters {
        for node in filters {
            for column_name in node.column_names() {
                ctx.ensure_column_joined(column_name)?;
            }
        }
    }
    for column in &definition.columns {
        ctx.ensure_column_joined(&column.name)?;
    }
    for column in &definition.grouping_columns {
        ctx.ensure_column_joined(&column.name)?;
    }

    log::debug!("Prepared {} table aliases", ctx.graph().len());
    Ok(())
}

fn prepare_column_aliases(ctx: &mut ConversionContext<'_>, definition: &QueryDefinition) {
    for column in &definition.columns {
        ctx.declare_column_alias(&column.alias_key());
    }
}

/// Renders SELECT and filter functions ahead of emission. Expression
/// functions may join tables, which must happen before the JOIN statements.
fn prepare_functions(
    ctx: &mut ConversionContext<'_>,
    definition: &QueryDefinition,
) -> ConvertResult<()> {
    for column in &definition.columns {
        let Some(func) = &column.func else {
            continue;
        };
        let key = column.alias_key();
        let column_alias = ctx
            .column_alias_for(&key)
            .map(str::to_string)
            .ok_or_else(|| ConvertError::UnknownColumn(key.clone()))?;
        prepare_function(ctx, key, &column.name, func, Some(column_alias))?;
    }

    if let Some(filters) = &definition.filters {
        for node in filters {
            prepare_filter_functions(ctx, node)?;
        }
    }
    Ok(())
}

fn prepare_filter_functions(
    ctx: &mut ConversionContext<'_>,
    node: &FilterNode,
) -> ConvertResult<()> {
    match node {
        FilterNode::Operator(_) => Ok(()),
        FilterNode::Condition(condition) => {
            let Some(func) = &condition.func else {
                return Ok(());
            };
            let column_alias = ctx
                .column_alias_for(&column_alias_key(&condition.column_name, None))
                .map(str::to_string);
            let key = column_alias_key(&condition.column_name, Some(func));
            prepare_function(ctx, key, &condition.column_name, func, column_alias)
        }
        FilterNode::Group(children) => children
            .iter()
            .try_for_each(|child| prepare_filter_functions(ctx, child)),
    }
}

fn prepare_function(
    ctx: &mut ConversionContext<'_>,
    key: String,
    column_name: &str,
    func: &ColumnFunction,
    column_alias: Option<String>,
) -> ConvertResult<()> {
    if ctx.prepared_function(&key).is_some() {
        return Ok(());
    }
    let binding = ctx.ensure_column_joined(column_name)?;
    let definition = ctx.column_function(func)?;
    let args = FunctionArgs {
        table_alias: binding.table_alias.clone(),
        field_name: binding.field_name().to_string(),
        column: binding.expression.clone(),
        column_alias,
    };
    let expression = ctx.prepare_function_expression(&definition.expr, &args)?;
    log::debug!("Function `{}` of {} renders as {}", func.name, column_name, expression);
    ctx.cache_function(
        key,
        PreparedFunction {
            expression,
            return_type: definition.return_type,
        },
    );
    Ok(())
}

fn add_select_statement<B: QueryBackend + ?Sized>(
    ctx: &mut ConversionContext<'_>,
    definition: &QueryDefinition,
    backend: &mut B,
) -> ConvertResult<()> {
    for column in &definition.columns {
        let binding = ctx.ensure_column_joined(&column.name)?;
        let key = column.alias_key();
        let alias = ctx
            .column_alias_for(&key)
            .map(str::to_string)
            .ok_or_else(|| ConvertError::UnknownColumn(key.clone()))?;

        let (function, function_return_type) = match &column.func {
            Some(_) => {
                let prepared = ctx
                    .prepared_function(&key)
                    .cloned()
                    .ok_or_else(|| ConvertError::UnknownColumn(key.clone()))?;
                (Some(prepared.expression), prepared.return_type)
            }
            None => (None, None),
        };

        let field_name = binding.field_name().to_string();
        let select = SelectColumn {
            entity_class: binding.entity_class().to_string(),
            table_alias: binding.table_alias.clone(),
            label: column.label.clone().unwrap_or_else(|| field_name.clone()),
            field_name,
            expression: binding.expression.clone(),
            column_name: column.name.clone(),
            alias,
            function,
            function_return_type,
            distinct: column.distinct,
        };
        backend.add_select_column(&select)?;
    }
    Ok(())
}

fn add_from_statement<B: QueryBackend + ?Sized>(
    ctx: &mut ConversionContext<'_>,
    backend: &mut B,
) -> ConvertResult<()> {
    let root_alias = ctx.ensure_root_joined();
    backend.add_from_statement(ctx.root_entity(), &root_alias)
}

fn add_join_statements<B: QueryBackend + ?Sized>(
    ctx: &mut ConversionContext<'_>,
    backend: &mut B,
) -> ConvertResult<()> {
    let joins: Vec<(JoinHandle, String)> = ctx
        .registered_joins()
        .filter(|(handle, _)| !handle.is_root())
        .map(|(handle, alias)| (handle, alias.to_string()))
        .collect();

    for (handle, alias) in joins {
        let statement = join_statement(ctx, handle, alias)?;
        log::debug!(
            "JOIN {} AS {} {:?} {:?}",
            statement.join,
            statement.alias,
            statement.condition_type,
            statement.condition
        );
        backend.add_join_statement(&statement)?;
    }
    Ok(())
}

fn join_statement(
    ctx: &ConversionContext<'_>,
    handle: JoinHandle,
    alias: String,
) -> ConvertResult<JoinStatement> {
    let segment = ctx
        .graph()
        .segment(handle)
        .ok_or_else(|| ConvertError::MalformedIdentifier(ctx.graph().path(handle).to_string()))?;
    let parent = ctx.graph().parent(handle).unwrap_or(JoinHandle::ROOT);

    let statement = match &segment.target {
        JoinTarget::Unidirectional { target, field, .. } => {
            let parent_alias = ctx.parent_table_alias(parent, field)?;
            JoinStatement {
                join_type: segment.join_type,
                join: target.clone(),
                condition_type: Some(ConditionType::With),
                condition: Some(format!("{alias}.{field} = {parent_alias}")),
                alias,
            }
        }
        JoinTarget::Entity { entity } => JoinStatement {
            join_type: segment.join_type,
            join: entity.clone(),
            alias,
            condition_type: segment.condition_type,
            condition: segment.condition.clone(),
        },
        JoinTarget::Relation { field, .. } => {
            let parent_alias = ctx.parent_table_alias(parent, field)?;
            JoinStatement {
                join_type: segment.join_type,
                join: format!("{parent_alias}.{field}"),
                alias,
                condition_type: segment.condition_type,
                condition: segment.condition.clone(),
            }
        }
        JoinTarget::AliasField { .. } => JoinStatement {
            join_type: segment.join_type,
            join: segment.join_expr(),
            alias,
            condition_type: segment.condition_type,
            condition: segment.condition.clone(),
        },
    };
    Ok(statement)
}

fn add_where_statement<B: QueryBackend + ?Sized>(
    ctx: &mut ConversionContext<'_>,
    definition: &QueryDefinition,
    backend: &mut B,
) -> ConvertResult<()> {
    let Some(filters) = definition.filters.as_deref().filter(|f| !f.is_empty()) else {
        return Ok(());
    };

    let mut emitter = WhereEmitter { ctx, backend };
    FilterParser::new().parse(filters, &mut emitter)
}

/// Forwards filter tree events to the backend as WHERE statements
struct WhereEmitter<'c, 'a, B: QueryBackend + ?Sized> {
    ctx: &'c mut ConversionContext<'a>,
    backend: &'c mut B,
}

impl<B: QueryBackend + ?Sized> FilterVisitor for WhereEmitter<'_, '_, B> {
    fn begin_group(&mut self) -> ConvertResult<()> {
        self.backend.begin_where_group()
    }

    fn end_group(&mut self) -> ConvertResult<()> {
        self.backend.end_where_group()
    }

    fn operator(&mut self, operator: LogicalOperator) -> ConvertResult<()> {
        self.backend.add_where_operator(operator)
    }

    fn condition(&mut self, condition: &FilterCondition) -> ConvertResult<()> {
        let binding = self.ctx.ensure_column_joined(&condition.column_name)?;
        let field_name = binding.field_name().to_string();

        let function = match &condition.func {
            Some(func) => {
                let key = column_alias_key(&condition.column_name, Some(func));
                let prepared = self
                    .ctx
                    .prepared_function(&key)
                    .ok_or_else(|| ConvertError::UnknownColumn(key.clone()))?;
                Some(prepared.expression.clone())
            }
            None => None,
        };

        let statement = WhereCondition {
            entity_class: binding.entity_class().to_string(),
            table_alias: binding.table_alias.clone(),
            column_alias: self
                .ctx
                .column_alias_for(&column_alias_key(&condition.column_name, None))
                .map(str::to_string),
            field_name,
            expression: binding.expression.clone(),
            filter_name: condition.criterion.filter.clone(),
            filter_data: condition.criterion.data.clone(),
            function,
        };
        self.backend.add_where_condition(&statement)
    }
}

fn add_group_by_statement<B: QueryBackend + ?Sized>(
    ctx: &ConversionContext<'_>,
    definition: &QueryDefinition,
    backend: &mut B,
) -> ConvertResult<()> {
    for column in &definition.grouping_columns {
        let Some(alias) = ctx.column_alias_for(&column.alias_key()) else {
            log::warn!(
                "Grouping column `{}` is not part of the SELECT clause",
                column.name
            );
            return Err(ConvertError::UngroupedSelectColumn(column.name.clone()));
        };
        backend.add_group_by_column(alias)?;
    }
    Ok(())
}

fn add_order_by_statement<B: QueryBackend + ?Sized>(
    ctx: &ConversionContext<'_>,
    definition: &QueryDefinition,
    backend: &mut B,
) -> ConvertResult<()> {
    for column in &definition.columns {
        let Some(direction) = column.sorting else {
            continue;
        };
        let key = column.alias_key();
        let alias = ctx
            .column_alias_for(&key)
            .ok_or_else(|| ConvertError::UnknownColumn(key.clone()))?;
        backend.add_order_by_column(alias, direction)?;
    }
    Ok(())
}
