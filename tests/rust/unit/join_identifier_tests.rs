use querydesigner::join_identifier::{
    explode_column_name, ConditionType, JoinIdentifierError, JoinPath, JoinSegment, JoinTarget,
    JoinType,
};
use test_case::test_case;

#[test_case("Order::customer", "Order", Some("customer"); "relation")]
#[test_case("Account::Call::account", "Call", Some("account"); "unidirectional")]
#[test_case("Address", "Address", None; "bare entity")]
fn test_target_entity_and_field(text: &str, entity: &str, field: Option<&str>) {
    let target: JoinTarget = text.parse().unwrap();
    assert_eq!(target.field_name(), field);
    assert_eq!(target.entity_class(), Some(entity));
    assert_eq!(target.to_string(), text);
}

#[test_case("t1.items|inner", Some(JoinType::Inner), None, None; "join type only")]
#[test_case("Address|left|WITH|t2.owner = t1", Some(JoinType::Left), Some(ConditionType::With), Some("t2.owner = t1"); "full metadata")]
#[test_case("Address||ON|a = b", None, Some(ConditionType::On), Some("a = b"); "condition without join type")]
fn test_segment_metadata(
    text: &str,
    join_type: Option<JoinType>,
    condition_type: Option<ConditionType>,
    condition: Option<&str>,
) {
    let segment: JoinSegment = text.parse().unwrap();
    assert_eq!(segment.join_type, join_type);
    assert_eq!(segment.condition_type, condition_type);
    assert_eq!(segment.condition.as_deref(), condition);
    assert_eq!(segment.to_string(), text);
}

#[test]
fn test_metadata_tells_identical_targets_apart() {
    let plain: JoinPath = "Order::customer".parse().unwrap();
    let left: JoinPath = "Order::customer|left".parse().unwrap();
    assert_ne!(plain, left);
    assert_eq!(plain.field_name(), left.field_name());
}

#[test]
fn test_explode_relative_and_absolute_names_agree() {
    let absolute = explode_column_name("Order", "Order::items+Item::product+Product::name").unwrap();
    let relative = explode_column_name("Order", "items+Item::product+Product::name").unwrap();
    assert_eq!(absolute, relative);
    assert_eq!(
        absolute.iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["Order::items", "Order::items+Item::product"]
    );
}

#[test]
fn test_root_has_no_parent() {
    assert!(JoinPath::root().is_root());
    assert!(matches!(
        JoinPath::root().parent(),
        Err(JoinIdentifierError::MalformedIdentifier(_))
    ));
}

#[test_case("Order::customer|sideways"; "bad join type")]
#[test_case("Order::customer|left|BESIDE|x = y"; "bad condition type")]
#[test_case("Order::"; "missing field")]
fn test_malformed_segments(text: &str) {
    assert!(text.parse::<JoinPath>().is_err());
}
