mod eval;
mod property;

use crate::{
    db::predicate::{FieldFilter, FilterExpr, FilterNode, FilterOp, Predicate, PredicateCompiler},
    db::query::Dialect,
    error::CompileError,
    test_support::user_model,
    value::Value,
};
use serde_json::json;

fn parse(json: &serde_json::Value) -> FilterExpr {
    FilterExpr::from_json(json).expect("filter parses")
}

fn lower(expr: &FilterExpr) -> Result<Predicate, CompileError> {
    let model = user_model();

    PredicateCompiler::new(Dialect::Sqlite)
        .with_model(&model)
        .lower(Some(expr))
}

// --- Parsing ---

#[test]
fn json_keys_keep_caller_order() {
    let expr = parse(&json!({ "name": "Bob", "age": { "gte": 30, "lt": 40 } }));

    let fields: Vec<&str> = expr
        .nodes()
        .iter()
        .filter_map(|node| match node {
            FilterNode::Field { field, .. } => Some(field.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fields, ["name", "age"]);

    let FilterNode::Field { filter, .. } = &expr.nodes()[1] else {
        panic!("expected a field node");
    };
    assert_eq!(
        filter,
        &FieldFilter::Ops(vec![
            (FilterOp::Gte, Value::Int(30)),
            (FilterOp::Lt, Value::Int(40)),
        ])
    );
}

#[test]
fn unknown_operator_is_rejected() {
    let err = FilterExpr::from_json(&json!({ "age": { "greaterThan": 3 } })).unwrap_err();

    assert_eq!(
        err,
        CompileError::InvalidOperator {
            field: "age".to_string(),
            operator: "greaterThan".to_string(),
        }
    );
}

#[test]
fn non_object_filters_are_malformed() {
    assert!(matches!(
        FilterExpr::from_json(&json!([1, 2])),
        Err(CompileError::MalformedFilter { .. })
    ));
    assert!(matches!(
        FilterExpr::from_json(&json!({ "OR": { "age": 1 } })),
        Err(CompileError::MalformedFilter { .. })
    ));
    assert!(matches!(
        FilterExpr::from_json(&json!({ "NOT": [] })),
        Err(CompileError::MalformedFilter { .. })
    ));
}

#[test]
fn and_accepts_a_single_object() {
    let single = parse(&json!({ "AND": { "age": 30 } }));
    let listed = parse(&json!({ "AND": [{ "age": 30 }] }));

    assert_eq!(single, listed);
}

#[test]
fn duplicate_combinators_are_rejected_when_built_from_nodes() {
    let err = FilterExpr::from_nodes(vec![
        FilterNode::Or(Vec::new()),
        FilterNode::Or(Vec::new()),
    ])
    .unwrap_err();

    assert_eq!(
        err,
        CompileError::DuplicateCombinator {
            combinator: "OR".to_string()
        }
    );
}

#[test]
fn builder_matches_json_shape() {
    let built = FilterExpr::new()
        .eq("isActive", true)
        .gte("age", 30)
        .not(FilterExpr::new().starts_with("name", "J"));
    let parsed = parse(&json!({
        "isActive": true,
        "age": { "gte": 30 },
        "NOT": { "name": { "startsWith": "J" } },
    }));

    assert_eq!(built, parsed);
}

#[test]
fn and_where_keeps_both_levels_visible() {
    let merged = FilterExpr::new()
        .eq("id", 3)
        .and_where(FilterExpr::new().is_null("deletedAt"));
    assert_eq!(merged.nodes().len(), 2);

    let colliding = FilterExpr::new()
        .or([FilterExpr::new().eq("id", 1)])
        .and_where(FilterExpr::new().or([FilterExpr::new().eq("id", 2)]));
    assert!(matches!(colliding.nodes(), [FilterNode::And(children)] if children.len() == 2));

    let empty = FilterExpr::new().and_where(FilterExpr::new().eq("id", 1));
    assert_eq!(empty, FilterExpr::new().eq("id", 1));
}

#[test]
fn colliding_combinators_leave_fields_on_top() {
    let merged = parse(&json!({ "id": 3, "NOT": { "age": 99 }, "AND": [{ "isActive": true }] }))
        .and_where(FilterExpr::negate(FilterExpr::new().eq("name", "Zed")));

    let expected = parse(&json!({
        "id": 3,
        "AND": [
            { "NOT": { "age": 99 } },
            { "isActive": true },
            { "NOT": { "name": "Zed" } },
        ],
    }));
    assert_eq!(merged, expected);
}

// --- Lowering ---

#[test]
fn null_equality_lowers_to_null_tests() {
    let expr = FilterExpr::new()
        .is_null("deletedAt")
        .is_not_null("email");

    assert_eq!(
        lower(&expr).expect("lowers"),
        Predicate::And(vec![
            Predicate::IsNull {
                field: "deletedAt".to_string()
            },
            Predicate::IsNotNull {
                field: "email".to_string()
            },
        ])
    );
}

#[test]
fn empty_membership_lowers_to_constants() {
    let empty_in = FilterExpr::new().in_list("id", Vec::<i64>::new());
    let empty_not_in = FilterExpr::new().not_in_list("id", Vec::<i64>::new());

    assert_eq!(lower(&empty_in).expect("lowers"), Predicate::False);
    assert_eq!(lower(&empty_not_in).expect("lowers"), Predicate::True);
}

#[test]
fn empty_combinators_follow_identity_elements() {
    assert_eq!(lower(&FilterExpr::all([])).expect("lowers"), Predicate::True);
    assert_eq!(lower(&FilterExpr::any([])).expect("lowers"), Predicate::False);
    assert_eq!(lower(&FilterExpr::new()).expect("lowers"), Predicate::True);
}

#[test]
fn unknown_field_is_rejected() {
    let err = lower(&FilterExpr::new().eq("nickname", "B")).unwrap_err();

    assert_eq!(
        err,
        CompileError::UnknownField {
            model: "user".to_string(),
            field: "nickname".to_string(),
        }
    );
}

#[test]
fn operator_legality_follows_field_kind() {
    let err = lower(&FilterExpr::new().gt("isActive", true)).unwrap_err();
    assert!(matches!(err, CompileError::OperatorNotSupported { field, .. } if field == "isActive"));

    let err = lower(&FilterExpr::new().contains("age", "3")).unwrap_err();
    assert!(matches!(err, CompileError::OperatorNotSupported { field, .. } if field == "age"));

    let err = lower(&FilterExpr::new().eq("posts", 1)).unwrap_err();
    assert!(matches!(err, CompileError::OperatorNotSupported { field, .. } if field == "posts"));
}

#[test]
fn literal_shapes_are_checked() {
    let err = lower(&FilterExpr::new().eq("age", "thirty")).unwrap_err();
    assert!(matches!(
        err,
        CompileError::TypeMismatch { field, found, .. } if field == "age" && found == "text"
    ));

    let err = lower(&FilterExpr::new().op("age", FilterOp::In, 3)).unwrap_err();
    assert!(matches!(err, CompileError::TypeMismatch { expected, .. } if expected == "a list"));

    let err = lower(&FilterExpr::new().gt("age", Value::Null)).unwrap_err();
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn depth_guard_rejects_deep_nesting() {
    let mut expr = FilterExpr::new().eq("age", 1);
    for _ in 0..6 {
        expr = FilterExpr::negate(expr);
    }
    let model = user_model();
    let compiler = PredicateCompiler::new(Dialect::Sqlite)
        .with_model(&model)
        .max_depth(4);

    assert_eq!(
        compiler.lower(Some(&expr)).unwrap_err(),
        CompileError::DepthExceeded { max: 4 }
    );
    assert!(
        PredicateCompiler::new(Dialect::Sqlite)
            .with_model(&model)
            .lower(Some(&expr))
            .is_ok()
    );
}

#[test]
fn schemaless_compile_still_checks_identifiers() {
    let compiler = PredicateCompiler::new(Dialect::Sqlite);

    let err = compiler
        .lower(Some(&FilterExpr::new().eq("name; DROP", 1)))
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidIdentifier { ident } if ident == "name; DROP"));
    assert!(compiler.lower(Some(&FilterExpr::new().eq("anything", 1))).is_ok());
}
