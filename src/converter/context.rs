//! Conversion Context
//!
//! Mutable workspace of a single conversion: the interned join graph, the
//! join <-> table alias bijection, column aliases and the caches of virtual
//! field and relation expansions. A context is created at the start of
//! [`QueryConverter::convert`](super::QueryConverter::convert) and dropped at
//! the end; nothing in it outlives the call.
//!
//! Table aliases are handed out sequentially and never renumbered. A join
//! identifier is registered at most once.

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::config::ConverterConfig;
use crate::definition::ColumnFunction;
use crate::join_identifier::{
    ConditionType, JoinGraph, JoinHandle, JoinPath, JoinSegment, JoinTarget, JoinType,
};
use crate::providers::{
    FunctionArgs, FunctionDefinition, FunctionExpr, FunctionProvider, VirtualFieldProvider,
    VirtualRelationProvider,
};

use super::alias_rewriter::AliasScope;
use super::errors::ConvertError;
use super::ConvertResult;

/// Template variables: `$column`, `$column_name`, `$column_alias`, `$table_alias`
static TEMPLATE_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\w+)").expect("template variable pattern is valid"));

/// Ordered key -> alias table, serialized as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: Vec<(String, String)>,
}

impl AliasMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, alias)| alias.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, a)| (k.as_str(), a.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, a)| a.as_str())
    }

    /// Inserts `key` unless present; returns the alias stored for `key`
    pub(crate) fn insert_if_absent(&mut self, key: &str, alias: impl FnOnce() -> String) -> &str {
        let index = match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => index,
            None => {
                self.entries.push((key.to_string(), alias()));
                self.entries.len() - 1
            }
        };
        &self.entries[index].1
    }
}

impl Serialize for AliasMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, alias) in &self.entries {
            map.serialize_entry(key, alias)?;
        }
        map.end()
    }
}

/// A column resolved to the table it is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    pub column: JoinPath,
    /// Join the column's table was reached through
    pub parent: JoinHandle,
    pub table_alias: String,
    /// `t2.name`, or the rewritten expression of a virtual field
    pub expression: String,
}

impl ColumnBinding {
    pub fn entity_class(&self) -> &str {
        self.column.entity_class().unwrap_or_default()
    }

    pub fn field_name(&self) -> &str {
        self.column.field_name().unwrap_or_default()
    }
}

/// Metadata of a virtual field besides its expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualColumnOptions {
    pub return_type: Option<String>,
    pub label: Option<String>,
}

/// Function of a column, rendered before any statement is emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedFunction {
    pub expression: String,
    pub return_type: Option<String>,
}

/// How a virtual relation was spliced into the join graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationExpansion {
    pub entity_class: String,
    pub field_name: String,
    /// Local -> real aliases of the relation recipe
    pub scope: AliasScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RelationKey {
    pub parent: JoinHandle,
    pub entity_class: String,
    pub field_name: String,
}

/// Structural identity of a recipe join, before its own alias is known
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RecipeJoinKey {
    pub parent: JoinHandle,
    pub join_type: JoinType,
    pub target: JoinTarget,
    pub condition_type: Option<ConditionType>,
    pub local_alias: String,
    pub condition: Option<String>,
}

pub struct ConversionContext<'a> {
    pub(crate) config: &'a ConverterConfig,
    pub(crate) root_entity: String,
    pub(crate) virtual_fields: &'a dyn VirtualFieldProvider,
    pub(crate) virtual_relations: Option<&'a dyn VirtualRelationProvider>,
    functions: &'a dyn FunctionProvider,

    pub(crate) graph: JoinGraph,
    aliases_by_join: HashMap<JoinHandle, String>,
    joins_by_alias: HashMap<String, JoinHandle>,
    join_order: Vec<JoinHandle>,
    table_alias_count: usize,

    column_aliases: AliasMap,
    pub(crate) columns: HashMap<String, ColumnBinding>,

    pub(crate) virtual_column_expressions: HashMap<String, String>,
    pub(crate) virtual_column_options: HashMap<String, VirtualColumnOptions>,
    pub(crate) virtual_relation_joins: HashMap<RelationKey, JoinHandle>,
    pub(crate) relation_expansions: HashMap<JoinHandle, RelationExpansion>,
    pub(crate) recipe_joins: HashMap<RecipeJoinKey, JoinHandle>,

    prepared_functions: HashMap<String, PreparedFunction>,
}

impl<'a> ConversionContext<'a> {
    pub fn new(
        config: &'a ConverterConfig,
        root_entity: &str,
        virtual_fields: &'a dyn VirtualFieldProvider,
        virtual_relations: Option<&'a dyn VirtualRelationProvider>,
        functions: &'a dyn FunctionProvider,
    ) -> Self {
        Self {
            config,
            root_entity: root_entity.to_string(),
            virtual_fields,
            virtual_relations,
            functions,
            graph: JoinGraph::new(),
            aliases_by_join: HashMap::new(),
            joins_by_alias: HashMap::new(),
            join_order: Vec::new(),
            table_alias_count: 0,
            column_aliases: AliasMap::default(),
            columns: HashMap::new(),
            virtual_column_expressions: HashMap::new(),
            virtual_column_options: HashMap::new(),
            virtual_relation_joins: HashMap::new(),
            relation_expansions: HashMap::new(),
            recipe_joins: HashMap::new(),
            prepared_functions: HashMap::new(),
        }
    }

    pub fn root_entity(&self) -> &str {
        &self.root_entity
    }

    pub fn config(&self) -> &ConverterConfig {
        self.config
    }

    pub fn graph(&self) -> &JoinGraph {
        &self.graph
    }

    // ---------------------------------------------------------------
    // Table aliases
    // ---------------------------------------------------------------

    /// Registers the root entity; it always receives the first table alias.
    pub fn ensure_root_joined(&mut self) -> String {
        self.register_alias(JoinHandle::ROOT, None)
    }

    pub fn root_alias(&self) -> Option<&str> {
        self.alias_of(JoinHandle::ROOT)
    }

    /// Alias of the join `path`, registering it (and every join above it) on first use.
    pub fn ensure_table_joined(&mut self, path: &JoinPath) -> ConvertResult<String> {
        let handle = self.register_path(path)?;
        self.required_alias(handle)
    }

    /// Joins `field_name` on the same level as the table `table_alias`.
    ///
    /// For `t2` registered as `Order::customer`, `ensure_sibling_joined("t2", "owner")`
    /// makes sure `Order::owner` is joined.
    pub fn ensure_sibling_joined(
        &mut self,
        table_alias: &str,
        field_name: &str,
    ) -> ConvertResult<String> {
        let handle = self.join_for_alias(table_alias)?;
        let segment = self
            .graph
            .segment(handle)
            .ok_or_else(|| ConvertError::MalformedIdentifier(table_alias.to_string()))?
            .sibling(field_name);
        let parent = self.graph.parent(handle).unwrap_or(JoinHandle::ROOT);

        let sibling = self.register_segment(parent, &segment)?;
        self.required_alias(sibling)
    }

    /// Joins `table_alias.field_name` below the table `table_alias`.
    pub fn ensure_child_joined(
        &mut self,
        table_alias: &str,
        field_name: &str,
        join_type: Option<JoinType>,
    ) -> ConvertResult<String> {
        let parent = self.join_for_alias(table_alias)?;
        let segment = JoinSegment::alias_field(table_alias, field_name).with_join_type(join_type);

        let child = self.register_segment(parent, &segment)?;
        self.required_alias(child)
    }

    pub fn join_identifier_for_alias(&self, table_alias: &str) -> Option<JoinPath> {
        self.joins_by_alias
            .get(table_alias)
            .map(|handle| self.graph.path(*handle))
    }

    /// Alias of an already registered join; never registers anything
    pub fn table_alias_for(&self, path: &JoinPath) -> Option<&str> {
        self.graph
            .find(path)
            .and_then(|handle| self.alias_of(handle))
    }

    pub fn alias_of(&self, handle: JoinHandle) -> Option<&str> {
        self.aliases_by_join.get(&handle).map(String::as_str)
    }

    /// Registered joins with their aliases, in registration order (root first)
    pub fn registered_joins(&self) -> impl Iterator<Item = (JoinHandle, &str)> {
        self.join_order
            .iter()
            .filter_map(|handle| self.alias_of(*handle).map(|alias| (*handle, alias)))
    }

    /// Join identifier text -> table alias, in registration order
    pub fn table_aliases(&self) -> AliasMap {
        let mut aliases = AliasMap::default();
        for (handle, alias) in self.registered_joins() {
            aliases.insert_if_absent(&self.graph.path(handle).to_string(), || alias.to_string());
        }
        aliases
    }

    pub fn relation_expansion(&self, handle: JoinHandle) -> Option<&RelationExpansion> {
        self.relation_expansions.get(&handle)
    }

    pub(crate) fn join_for_alias(&self, table_alias: &str) -> ConvertResult<JoinHandle> {
        self.joins_by_alias
            .get(table_alias)
            .copied()
            .ok_or_else(|| ConvertError::UnknownTableAlias(table_alias.to_string()))
    }

    pub(crate) fn required_alias(&self, handle: JoinHandle) -> ConvertResult<String> {
        self.alias_of(handle)
            .map(str::to_string)
            .ok_or_else(|| ConvertError::UnknownTableAlias(self.graph.path(handle).to_string()))
    }

    pub(crate) fn next_table_alias(&mut self) -> String {
        self.table_alias_count += 1;
        format!("{}{}", self.config.table_alias_prefix, self.table_alias_count)
    }

    /// The alias [`Self::next_table_alias`] would hand out, without consuming it.
    pub(crate) fn peek_table_alias(&self) -> String {
        format!("{}{}", self.config.table_alias_prefix, self.table_alias_count + 1)
    }

    /// Records the alias of `handle` unless it already has one and returns the stored alias.
    ///
    /// A requested alias owned by another join is replaced with a fresh one.
    /// Requesting the peeked alias claims it from the sequence.
    pub(crate) fn register_alias(&mut self, handle: JoinHandle, alias: Option<String>) -> String {
        if let Some(existing) = self.aliases_by_join.get(&handle) {
            return existing.clone();
        }
        let alias = match alias {
            Some(alias) if !self.joins_by_alias.contains_key(&alias) => {
                if alias == self.peek_table_alias() {
                    self.table_alias_count += 1;
                }
                alias
            }
            _ => self.next_table_alias(),
        };

        log::debug!("Registered join `{}` as {}", self.graph.path(handle), alias);
        self.aliases_by_join.insert(handle, alias.clone());
        self.joins_by_alias.insert(alias.clone(), handle);
        self.join_order.push(handle);
        alias
    }

    // ---------------------------------------------------------------
    // Column aliases
    // ---------------------------------------------------------------

    /// Assigns the next column alias to `key` unless it already has one
    pub(crate) fn declare_column_alias(&mut self, key: &str) -> String {
        let prefix = &self.config.column_alias_prefix;
        let next = self.column_aliases.len() + 1;
        self.column_aliases
            .insert_if_absent(key, || format!("{prefix}{next}"))
            .to_string()
    }

    /// Column alias declared in SELECT for `key`, if any
    pub fn column_alias_for(&self, key: &str) -> Option<&str> {
        self.column_aliases.get(key)
    }

    pub fn column_aliases(&self) -> &AliasMap {
        &self.column_aliases
    }

    pub fn column_binding(&self, column_name: &str) -> Option<&ColumnBinding> {
        self.columns.get(column_name)
    }

    // ---------------------------------------------------------------
    // Virtual columns
    // ---------------------------------------------------------------

    pub fn virtual_column_expression(&self, column_name: &str) -> Option<&str> {
        let key = JoinPath::parse_column(&self.root_entity, column_name)
            .map(|path| path.to_string())
            .unwrap_or_else(|_| column_name.to_string());
        self.virtual_column_expressions.get(&key).map(String::as_str)
    }

    pub fn virtual_column_expressions(&self) -> &HashMap<String, String> {
        &self.virtual_column_expressions
    }

    /// Declared return type of a virtual field that was expanded in this conversion
    pub fn virtual_field_type(&self, entity_class: &str, field_name: &str) -> Option<&str> {
        if !self.virtual_fields.is_virtual_field(entity_class, field_name) {
            return None;
        }
        self.virtual_column_options
            .get(&format!("{entity_class}::{field_name}"))
            .and_then(|options| options.return_type.as_deref())
    }

    pub fn virtual_column_options(
        &self,
        entity_class: &str,
        field_name: &str,
    ) -> Option<&VirtualColumnOptions> {
        self.virtual_column_options
            .get(&format!("{entity_class}::{field_name}"))
    }

    // ---------------------------------------------------------------
    // Functions
    // ---------------------------------------------------------------

    pub fn column_function(&self, func: &ColumnFunction) -> ConvertResult<FunctionDefinition> {
        self.functions
            .function(&func.name, &func.group_name, &func.group_type)
            .map_err(ConvertError::from)
    }

    /// Rendered function of a SELECT column or filter, keyed like column aliases
    pub fn prepared_function(&self, key: &str) -> Option<&PreparedFunction> {
        self.prepared_functions.get(key)
    }

    pub(crate) fn cache_function(&mut self, key: String, function: PreparedFunction) {
        self.prepared_functions.insert(key, function);
    }

    /// Renders a function expression for one column.
    ///
    /// Templates may use `$column`, `$column_name`, `$column_alias` and
    /// `$table_alias`. Expression objects get the context and may join tables.
    pub fn prepare_function_expression(
        &mut self,
        expr: &FunctionExpr,
        args: &FunctionArgs,
    ) -> ConvertResult<String> {
        match expr {
            FunctionExpr::Expression(expression) => expression.expression(self, args),
            FunctionExpr::Template(template) => render_template(template, args),
        }
    }
}

fn render_template(template: &str, args: &FunctionArgs) -> ConvertResult<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for captures in TEMPLATE_VARIABLE.captures_iter(template) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let value = match &captures[1] {
            "column" => args.column.as_str(),
            "column_name" => args.field_name.as_str(),
            "column_alias" => args.column_alias.as_deref().unwrap_or_default(),
            "table_alias" => args.table_alias.as_str(),
            other => {
                return Err(ConvertError::InvalidFunctionExpression(format!(
                    "unknown variable `${other}` in `{template}`"
                )))
            }
        };
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}
