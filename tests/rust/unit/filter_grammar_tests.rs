//! Grammar checks of filter trees: which token sequences are accepted

use querydesigner::converter::{validate_filters, ConvertError, FilterParser, FilterVisitor};
use querydesigner::definition::{FilterCondition, FilterNode, LogicalOperator};
use serde_json::{json, Value};
use test_case::test_case;

fn filters(value: Value) -> Vec<FilterNode> {
    value
        .as_array()
        .expect("filters must be a list")
        .iter()
        .map(|token| FilterNode::try_from(token).unwrap())
        .collect()
}

fn condition(column: &str) -> Value {
    json!({"columnName": column, "criterion": {"filter": "string", "data": {"value": "x"}}})
}

#[test_case(json!([condition("a")]); "single filter")]
#[test_case(json!([condition("a"), "AND", condition("b")]); "two filters")]
#[test_case(json!([[condition("a"), "OR", condition("b")], "AND", condition("c")]); "group then filter")]
#[test_case(json!([[[condition("a")]]]); "nested groups")]
fn test_valid_trees(tree: Value) {
    assert!(validate_filters(&filters(tree)).is_ok());
}

#[test_case(json!([[]]), "a group must not be empty"; "empty group")]
#[test_case(json!(["AND", condition("a")]), "a group must not start with an operator"; "leading operator")]
#[test_case(json!([condition("a"), "OR"]), "a group must not end with an operator"; "trailing operator")]
#[test_case(json!([condition("a"), "AND", "OR", condition("b")]), "two operators must not follow each other"; "double operator")]
#[test_case(json!([condition("a"), condition("b")]), "separated from the previous filter"; "adjacent filters")]
#[test_case(json!([condition("a"), [condition("b")]]), "a group must be separated"; "filter then group")]
#[test_case(json!([[condition("a")], condition("b")]), "separated from the previous filter or group"; "group then filter")]
fn test_invalid_trees(tree: Value, expected: &str) {
    match validate_filters(&filters(tree)) {
        Err(ConvertError::InvalidFilterGrammar { reason, .. }) => {
            assert!(reason.contains(expected), "unexpected reason `{reason}`")
        }
        other => panic!("expected a grammar error, got {other:?}"),
    }
}

#[derive(Default)]
struct Printer {
    out: String,
}

impl FilterVisitor for Printer {
    fn begin_group(&mut self) -> Result<(), ConvertError> {
        self.out.push('(');
        Ok(())
    }

    fn end_group(&mut self) -> Result<(), ConvertError> {
        self.out.push(')');
        Ok(())
    }

    fn operator(&mut self, operator: LogicalOperator) -> Result<(), ConvertError> {
        self.out.push_str(&format!(" {operator} "));
        Ok(())
    }

    fn condition(&mut self, condition: &FilterCondition) -> Result<(), ConvertError> {
        self.out.push_str(&condition.column_name);
        Ok(())
    }
}

#[test]
fn test_events_follow_tree_order() {
    let tree = filters(json!([
        condition("a"),
        "OR",
        [condition("b"), "AND", condition("c")]
    ]));
    let mut printer = Printer::default();
    FilterParser::new().parse(&tree, &mut printer).unwrap();
    assert_eq!(printer.out, "(a OR (b AND c))");
}

#[test]
fn test_parser_is_reusable_after_error() {
    let mut parser = FilterParser::new();
    let mut printer = Printer::default();
    assert!(parser
        .parse(&filters(json!([condition("a"), "AND"])), &mut printer)
        .is_err());

    let mut printer = Printer::default();
    parser
        .parse(&filters(json!([condition("z")])), &mut printer)
        .unwrap();
    assert_eq!(printer.out, "(z)");
}
