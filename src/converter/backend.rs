//! Backend interface receiving the statement events of a conversion.
//!
//! Events arrive in a fixed order: SELECT columns, FROM, JOINs, the WHERE
//! tree, GROUP BY, ORDER BY, then the two alias tables. Function expressions
//! arrive already rendered.

use serde::Serialize;
use serde_json::Value;

use crate::definition::{LogicalOperator, SortDirection};
use crate::join_identifier::{ConditionType, JoinType};

use super::context::AliasMap;
use super::ConvertResult;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub entity_class: String,
    pub table_alias: String,
    pub field_name: String,
    /// `t2.name`, or the expression of a virtual field
    pub expression: String,
    pub column_name: String,
    pub alias: String,
    pub label: String,
    /// Rendered function expression, e.g. `COUNT(t1.id)`
    pub function: Option<String>,
    pub function_return_type: Option<String>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinStatement {
    /// `None` lets the backend pick its default join type
    pub join_type: Option<JoinType>,
    /// `t1.customer`, or an entity class for unidirectional joins
    pub join: String,
    pub alias: String,
    pub condition_type: Option<ConditionType>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub entity_class: String,
    pub table_alias: String,
    pub field_name: String,
    pub expression: String,
    /// Alias of the same column in SELECT, if it is selected
    pub column_alias: Option<String>,
    pub filter_name: String,
    pub filter_data: Value,
    pub function: Option<String>,
}

/// Query representation built from conversion events
///
/// Every join a statement refers to, including joins made by function
/// expressions, is emitted before SELECT columns reach the backend.
pub trait QueryBackend {
    fn add_select_column(&mut self, column: &SelectColumn) -> ConvertResult<()>;

    fn add_from_statement(&mut self, entity_class: &str, table_alias: &str) -> ConvertResult<()>;

    fn add_join_statement(&mut self, join: &JoinStatement) -> ConvertResult<()>;

    fn begin_where_group(&mut self) -> ConvertResult<()>;

    fn end_where_group(&mut self) -> ConvertResult<()>;

    fn add_where_operator(&mut self, operator: LogicalOperator) -> ConvertResult<()>;

    fn add_where_condition(&mut self, condition: &WhereCondition) -> ConvertResult<()>;

    fn add_group_by_column(&mut self, column_alias: &str) -> ConvertResult<()>;

    fn add_order_by_column(
        &mut self,
        column_alias: &str,
        direction: SortDirection,
    ) -> ConvertResult<()>;

    fn save_table_aliases(&mut self, aliases: &AliasMap) -> ConvertResult<()>;

    fn save_column_aliases(&mut self, aliases: &AliasMap) -> ConvertResult<()>;
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatementEvent {
    Select {
        entity_class: String,
        table_alias: String,
        field_name: String,
        expression: String,
        alias: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        function: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        function_return_type: Option<String>,
        distinct: bool,
    },
    From {
        entity_class: String,
        table_alias: String,
    },
    Join(JoinStatement),
    BeginGroup,
    EndGroup,
    Operator {
        operator: LogicalOperator,
    },
    Condition {
        entity_class: String,
        table_alias: String,
        field_name: String,
        expression: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        column_alias: Option<String>,
        filter: String,
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        function: Option<String>,
    },
    GroupBy {
        column_alias: String,
    },
    OrderBy {
        column_alias: String,
        direction: SortDirection,
    },
    TableAliases {
        aliases: AliasMap,
    },
    ColumnAliases {
        aliases: AliasMap,
    },
}

/// Backend that keeps the ordered list of events
#[derive(Debug, Default, Clone, Serialize)]
pub struct RecordingBackend {
    events: Vec<StatementEvent>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[StatementEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<StatementEvent> {
        self.events
    }

    pub fn joins(&self) -> impl Iterator<Item = &JoinStatement> {
        self.events.iter().filter_map(|event| match event {
            StatementEvent::Join(join) => Some(join),
            _ => None,
        })
    }

    /// Event names only, e.g. `["select", "from", "join", ...]`
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .map(|event| match event {
                StatementEvent::Select { .. } => "select",
                StatementEvent::From { .. } => "from",
                StatementEvent::Join(_) => "join",
                StatementEvent::BeginGroup => "begin_group",
                StatementEvent::EndGroup => "end_group",
                StatementEvent::Operator { .. } => "operator",
                StatementEvent::Condition { .. } => "condition",
                StatementEvent::GroupBy { .. } => "group_by",
                StatementEvent::OrderBy { .. } => "order_by",
                StatementEvent::TableAliases { .. } => "table_aliases",
                StatementEvent::ColumnAliases { .. } => "column_aliases",
            })
            .collect()
    }
}

impl QueryBackend for RecordingBackend {
    fn add_select_column(&mut self, column: &SelectColumn) -> ConvertResult<()> {
        self.events.push(StatementEvent::Select {
            entity_class: column.entity_class.clone(),
            table_alias: column.table_alias.clone(),
            field_name: column.field_name.clone(),
            expression: column.expression.clone(),
            alias: column.alias.clone(),
            label: column.label.clone(),
            function: column.function.clone(),
            function_return_type: column.function_return_type.clone(),
            distinct: column.distinct,
        });
        Ok(())
    }

    fn add_from_statement(&mut self, entity_class: &str, table_alias: &str) -> ConvertResult<()> {
        self.events.push(StatementEvent::From {
            entity_class: entity_class.to_string(),
            table_alias: table_alias.to_string(),
        });
        Ok(())
    }

    fn add_join_statement(&mut self, join: &JoinStatement) -> ConvertResult<()> {
        self.events.push(StatementEvent::Join(join.clone()));
        Ok(())
    }

    fn begin_where_group(&mut self) -> ConvertResult<()> {
        self.events.push(StatementEvent::BeginGroup);
        Ok(())
    }

    fn end_where_group(&mut self) -> ConvertResult<()> {
        self.events.push(StatementEvent::EndGroup);
        Ok(())
    }

    fn add_where_operator(&mut self, operator: LogicalOperator) -> ConvertResult<()> {
        self.events.push(StatementEvent::Operator { operator });
        Ok(())
    }

    fn add_where_condition(&mut self, condition: &WhereCondition) -> ConvertResult<()> {
        self.events.push(StatementEvent::Condition {
            entity_class: condition.entity_class.clone(),
            table_alias: condition.table_alias.clone(),
            field_name: condition.field_name.clone(),
            expression: condition.expression.clone(),
            column_alias: condition.column_alias.clone(),
            filter: condition.filter_name.clone(),
            data: condition.filter_data.clone(),
            function: condition.function.clone(),
        });
        Ok(())
    }

    fn add_group_by_column(&mut self, column_alias: &str) -> ConvertResult<()> {
        self.events.push(StatementEvent::GroupBy {
            column_alias: column_alias.to_string(),
        });
        Ok(())
    }

    fn add_order_by_column(
        &mut self,
        column_alias: &str,
        direction: SortDirection,
    ) -> ConvertResult<()> {
        self.events.push(StatementEvent::OrderBy {
            column_alias: column_alias.to_string(),
            direction,
        });
        Ok(())
    }

    fn save_table_aliases(&mut self, aliases: &AliasMap) -> ConvertResult<()> {
        self.events.push(StatementEvent::TableAliases {
            aliases: aliases.clone(),
        });
        Ok(())
    }

    fn save_column_aliases(&mut self, aliases: &AliasMap) -> ConvertResult<()> {
        self.events.push(StatementEvent::ColumnAliases {
            aliases: aliases.clone(),
        });
        Ok(())
    }
}
