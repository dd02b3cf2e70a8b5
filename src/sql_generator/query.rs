use serde::Serialize;

use crate::converter::{
    AliasMap, ConvertResult, JoinStatement, QueryBackend, SelectColumn, WhereCondition,
};
use crate::definition::{LogicalOperator, SortDirection};
use crate::join_identifier::JoinType;

use super::errors::SqlGeneratorError;
use super::filters::{render_condition, Parameters};
use super::ToSql;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectItem {
    pub expression: String,
    pub alias: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectItems {
    pub items: Vec<SelectItem>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FromItem {
    pub entity_class: String,
    pub alias: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinItems(pub Vec<JoinStatement>);

/// WHERE text, built token by token; the outermost group is not parenthesized
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterItems {
    sql: String,
    #[serde(skip)]
    depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupByItems(pub Vec<String>);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderByItems(pub Vec<(String, SortDirection)>);

/// SQL query assembled from conversion events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlQuery {
    pub select: SelectItems,
    pub from: Option<FromItem>,
    pub joins: JoinItems,
    pub filters: FilterItems,
    pub group_by: GroupByItems,
    pub order_by: OrderByItems,
    pub parameters: Parameters,
    pub table_aliases: AliasMap,
    pub column_aliases: AliasMap,
}

impl ToSql for SelectItems {
    fn to_sql(&self) -> String {
        let mut sql = String::new();
        if self.items.is_empty() {
            return sql;
        }

        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }
        for (i, item) in self.items.iter().enumerate() {
            sql.push_str(&item.expression);
            sql.push_str(" AS ");
            sql.push_str(&item.alias);
            if i + 1 < self.items.len() {
                sql.push_str(", ");
            }
        }
        sql.push('\n');
        sql
    }
}

impl ToSql for FromItem {
    fn to_sql(&self) -> String {
        format!("FROM {} {}\n", self.entity_class, self.alias)
    }
}

impl ToSql for JoinStatement {
    fn to_sql(&self) -> String {
        // backends default to LEFT, so an optional relation never drops rows
        let join_type = self.join_type.unwrap_or(JoinType::Left);
        let mut sql = format!("{} JOIN {} {}", join_type.keyword(), self.join, self.alias);
        if let Some(condition) = &self.condition {
            let keyword = self.condition_type.map(|c| c.as_str()).unwrap_or("WITH");
            sql.push(' ');
            sql.push_str(keyword);
            sql.push(' ');
            sql.push_str(condition);
        }
        sql.push('\n');
        sql
    }
}

impl ToSql for JoinItems {
    fn to_sql(&self) -> String {
        self.0.iter().map(ToSql::to_sql).collect()
    }
}

impl ToSql for FilterItems {
    fn to_sql(&self) -> String {
        if self.sql.is_empty() {
            "".into()
        } else {
            format!("WHERE {}\n", self.sql)
        }
    }
}

impl ToSql for GroupByItems {
    fn to_sql(&self) -> String {
        let mut sql = String::new();
        if self.0.is_empty() {
            return sql;
        }
        sql.push_str("GROUP BY ");
        sql.push_str(&self.0.join(", "));
        sql.push('\n');
        sql
    }
}

impl ToSql for OrderByItems {
    fn to_sql(&self) -> String {
        let mut sql = String::new();
        if self.0.is_empty() {
            return sql;
        }
        sql.push_str("ORDER BY ");
        for (i, (alias, direction)) in self.0.iter().enumerate() {
            sql.push_str(alias);
            sql.push(' ');
            sql.push_str(&direction.to_string());
            if i + 1 < self.0.len() {
                sql.push_str(", ");
            }
        }
        sql.push('\n');
        sql
    }
}

impl ToSql for SqlQuery {
    fn to_sql(&self) -> String {
        let mut sql = String::new();
        sql.push_str(&self.select.to_sql());
        if let Some(from) = &self.from {
            sql.push_str(&from.to_sql());
        }
        sql.push_str(&self.joins.to_sql());
        sql.push_str(&self.filters.to_sql());
        sql.push_str(&self.group_by.to_sql());
        sql.push_str(&self.order_by.to_sql());
        sql
    }
}

impl SqlQuery {
    /// Label of every selected alias, for naming result columns
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.select
            .items
            .iter()
            .map(|item| (item.alias.as_str(), item.label.as_str()))
    }
}

/// [`QueryBackend`] building an [`SqlQuery`] with bound filter values
#[derive(Debug, Default, Clone)]
pub struct SqlQueryBackend {
    query: SqlQuery,
}

impl SqlQueryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &SqlQuery {
        &self.query
    }

    pub fn into_query(self) -> SqlQuery {
        self.query
    }

    /// SQL text of the finished query
    pub fn sql(&self) -> Result<String, SqlGeneratorError> {
        if self.query.from.is_none() {
            return Err(SqlGeneratorError::MissingFromStatement);
        }
        Ok(self.query.to_sql())
    }
}

impl QueryBackend for SqlQueryBackend {
    fn add_select_column(&mut self, column: &SelectColumn) -> ConvertResult<()> {
        let expression = column
            .function
            .clone()
            .unwrap_or_else(|| column.expression.clone());
        self.query.select.distinct |= column.distinct;
        self.query.select.items.push(SelectItem {
            expression,
            alias: column.alias.clone(),
            label: column.label.clone(),
        });
        Ok(())
    }

    fn add_from_statement(&mut self, entity_class: &str, table_alias: &str) -> ConvertResult<()> {
        self.query.from = Some(FromItem {
            entity_class: entity_class.to_string(),
            alias: table_alias.to_string(),
        });
        Ok(())
    }

    fn add_join_statement(&mut self, join: &JoinStatement) -> ConvertResult<()> {
        self.query.joins.0.push(join.clone());
        Ok(())
    }

    fn begin_where_group(&mut self) -> ConvertResult<()> {
        let filters = &mut self.query.filters;
        if filters.depth > 0 {
            filters.sql.push('(');
        }
        filters.depth += 1;
        Ok(())
    }

    fn end_where_group(&mut self) -> ConvertResult<()> {
        let filters = &mut self.query.filters;
        filters.depth = filters.depth.saturating_sub(1);
        if filters.depth > 0 {
            filters.sql.push(')');
        }
        Ok(())
    }

    fn add_where_operator(&mut self, operator: LogicalOperator) -> ConvertResult<()> {
        self.query.filters.sql.push_str(&format!(" {operator} "));
        Ok(())
    }

    fn add_where_condition(&mut self, condition: &WhereCondition) -> ConvertResult<()> {
        let column = condition.function.as_deref().unwrap_or(&condition.expression);
        let sql = render_condition(
            column,
            &condition.filter_name,
            &condition.filter_data,
            &mut self.query.parameters,
        )?;
        self.query.filters.sql.push_str(&sql);
        Ok(())
    }

    fn add_group_by_column(&mut self, column_alias: &str) -> ConvertResult<()> {
        self.query.group_by.0.push(column_alias.to_string());
        Ok(())
    }

    fn add_order_by_column(
        &mut self,
        column_alias: &str,
        direction: SortDirection,
    ) -> ConvertResult<()> {
        self.query
            .order_by
            .0
            .push((column_alias.to_string(), direction));
        Ok(())
    }

    fn save_table_aliases(&mut self, aliases: &AliasMap) -> ConvertResult<()> {
        self.query.table_aliases = aliases.clone();
        Ok(())
    }

    fn save_column_aliases(&mut self, aliases: &AliasMap) -> ConvertResult<()> {
        self.query.column_aliases = aliases.clone();
        Ok(())
    }
}
