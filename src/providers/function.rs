/// Function expressions applied to columns
///
/// A function is either a text template (`COUNT($column)`) rendered by the
/// conversion context, or a [`FunctionExpression`] object that builds the
/// expression itself and may join extra tables while doing so.
///
/// Catalogs refer to expression objects with an `@tag` string. Tags are
/// resolved through a [`FunctionRegistry`] when the catalog is loaded.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::converter::{ConversionContext, ConvertError};
use crate::join_identifier::JoinType;

use super::errors::ProviderError;

/// Values a function expression is rendered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionArgs {
    pub table_alias: String,
    pub field_name: String,
    /// Column expression, e.g. `t2.name`
    pub column: String,
    pub column_alias: Option<String>,
}

pub trait FunctionExpression: Send + Sync {
    /// Tag the expression is registered under (without the leading `@`)
    fn name(&self) -> &str;

    fn expression(
        &self,
        ctx: &mut ConversionContext<'_>,
        args: &FunctionArgs,
    ) -> Result<String, ConvertError>;
}

#[derive(Clone)]
pub enum FunctionExpr {
    Template(String),
    Expression(Arc<dyn FunctionExpression>),
}

impl fmt::Debug for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionExpr::Template(template) => f.debug_tuple("Template").field(template).finish(),
            FunctionExpr::Expression(expr) => {
                f.debug_tuple("Expression").field(&expr.name()).finish()
            }
        }
    }
}

impl PartialEq for FunctionExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FunctionExpr::Template(a), FunctionExpr::Template(b)) => a == b,
            (FunctionExpr::Expression(a), FunctionExpr::Expression(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

impl fmt::Display for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionExpr::Template(template) => f.write_str(template),
            FunctionExpr::Expression(expr) => write!(f, "@{}", expr.name()),
        }
    }
}

/// Answer of a function provider
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub expr: FunctionExpr,
    pub return_type: Option<String>,
}

impl FunctionDefinition {
    pub fn template(expr: impl Into<String>) -> Self {
        Self {
            expr: FunctionExpr::Template(expr.into()),
            return_type: None,
        }
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }
}

/// Maps `@tag` names to expression objects
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    expressions: HashMap<String, Arc<dyn FunctionExpression>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in expressions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CountDistinct);
        registry.register(EnumOptionName);
        registry
    }

    pub fn register(&mut self, expression: impl FunctionExpression + 'static) {
        self.expressions
            .insert(expression.name().to_string(), Arc::new(expression));
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn FunctionExpression>> {
        self.expressions.get(tag.trim_start_matches('@')).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.expressions.contains_key(tag.trim_start_matches('@'))
    }

    /// Turns catalog text into a function expression: `@tag` is looked up,
    /// anything else is a template.
    pub fn resolve(&self, expr: &str) -> Result<FunctionExpr, ProviderError> {
        match expr.strip_prefix('@') {
            Some(tag) => self.get(tag).map(FunctionExpr::Expression).ok_or_else(|| {
                ProviderError::InvalidFunctionExpression(format!(
                    "no function expression is registered as `@{tag}`"
                ))
            }),
            None if expr.trim().is_empty() => Err(ProviderError::InvalidFunctionExpression(
                "the function expression must not be empty".to_string(),
            )),
            None => Ok(FunctionExpr::Template(expr.to_string())),
        }
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.expressions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("expressions", &names)
            .finish()
    }
}

lazy_static::lazy_static! {
    static ref BUILTIN_FUNCTIONS: FunctionRegistry = FunctionRegistry::with_builtins();
}

pub fn builtin_functions() -> &'static FunctionRegistry {
    &BUILTIN_FUNCTIONS
}

/// `@count_distinct`: `COUNT(DISTINCT <column>)`
pub struct CountDistinct;

impl FunctionExpression for CountDistinct {
    fn name(&self) -> &str {
        "count_distinct"
    }

    fn expression(
        &self,
        _ctx: &mut ConversionContext<'_>,
        args: &FunctionArgs,
    ) -> Result<String, ConvertError> {
        Ok(format!("COUNT(DISTINCT {})", args.column))
    }
}

/// `@enum_name`: joins the option entity behind an enum relation and selects its name
pub struct EnumOptionName;

impl FunctionExpression for EnumOptionName {
    fn name(&self) -> &str {
        "enum_name"
    }

    fn expression(
        &self,
        ctx: &mut ConversionContext<'_>,
        args: &FunctionArgs,
    ) -> Result<String, ConvertError> {
        let option_alias =
            ctx.ensure_child_joined(&args.table_alias, &args.field_name, Some(JoinType::Left))?;
        Ok(format!("{option_alias}.name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_template() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            registry.resolve("SUM($column)").unwrap(),
            FunctionExpr::Template("SUM($column)".to_string())
        );
    }

    #[test]
    fn test_resolve_registered_tag() {
        let expr = builtin_functions().resolve("@count_distinct").unwrap();
        assert_eq!(expr.to_string(), "@count_distinct");
    }

    #[test]
    fn test_resolve_unknown_tag() {
        let err = FunctionRegistry::new().resolve("@nope").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidFunctionExpression(_)));
    }

    #[test]
    fn test_resolve_empty_expression() {
        let err = FunctionRegistry::new().resolve("  ").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidFunctionExpression(_)));
    }
}
