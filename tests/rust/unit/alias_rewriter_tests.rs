use querydesigner::converter::alias_rewriter::{referenced_aliases, rewrite};
use querydesigner::converter::AliasScope;
use test_case::test_case;

fn scope(bindings: &[(&str, &str)]) -> AliasScope {
    let mut scope = AliasScope::default();
    for (local, real) in bindings {
        scope.bind(local, real);
    }
    scope
}

#[test_case("a.x = b.y", &[("a", "b"), ("b", "a")], "b.x = a.y"; "swapped aliases")]
#[test_case("a.x = b.y", &[("a", "t2"), ("b", "t1")], "t2.x = t1.y"; "plain binding")]
#[test_case("COALESCE(a.city, entity.city)", &[("entity", "t1"), ("a", "t3")], "COALESCE(t3.city, t1.city)"; "inside function call")]
#[test_case("a.owner = entity", &[("entity", "t2"), ("a", "t5")], "t5.owner = t2"; "standalone operand")]
#[test_case("a.name LIKE 'a.%'", &[("a", "t4")], "t4.name LIKE 'a.%'"; "quoted literal")]
#[test_case("x.id = 1", &[("a", "t4")], "x.id = 1"; "unknown alias kept")]
fn test_rewrite(text: &str, bindings: &[(&str, &str)], expected: &str) {
    assert_eq!(rewrite(text, &scope(bindings)), expected);
}

#[test]
fn test_referenced_aliases_skip_fields_and_literals() {
    let found = referenced_aliases("p.brand = b AND p.b = 'c'", |alias| {
        ["b", "c", "p"].contains(&alias)
    });
    assert_eq!(found, vec!["p", "b"]);
}
