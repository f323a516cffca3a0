use crate::{
    db::predicate::{CompareOp, ParamRef, Predicate, TextOp, Truth, eval_row, eval_with},
    value::{Row, Value},
};

fn cmp(field: &str, op: CompareOp, value: impl Into<Value>) -> Predicate {
    Predicate::Compare {
        field: field.to_string(),
        op,
        value: value.into(),
    }
}

fn truth(row: &Row, predicate: &Predicate) -> Truth {
    eval_with(row, predicate, &|value: &Value| value)
}

#[test]
fn comparisons_with_null_are_unknown() {
    let row = Row::new().with("age", Value::Null);

    assert_eq!(truth(&row, &cmp("age", CompareOp::Eq, 3)), Truth::Unknown);
    assert_eq!(truth(&row, &cmp("age", CompareOp::Ne, 3)), Truth::Unknown);
    assert_eq!(truth(&row, &cmp("missing", CompareOp::Gt, 3)), Truth::Unknown);
}

#[test]
fn not_of_unknown_stays_unknown() {
    let row = Row::new().with("age", Value::Null);
    let negated = Predicate::Not(Box::new(cmp("age", CompareOp::Eq, 3)));

    assert_eq!(truth(&row, &negated), Truth::Unknown);
    assert!(!eval_row(&row, &negated));
}

#[test]
fn and_or_follow_kleene_tables() {
    let row = Row::new().with("a", 1).with("b", Value::Null);
    let t = cmp("a", CompareOp::Eq, 1);
    let f = cmp("a", CompareOp::Eq, 2);
    let u = cmp("b", CompareOp::Eq, 1);

    assert_eq!(truth(&row, &Predicate::And(vec![t.clone(), u.clone()])), Truth::Unknown);
    assert_eq!(truth(&row, &Predicate::And(vec![f.clone(), u.clone()])), Truth::False);
    assert_eq!(truth(&row, &Predicate::Or(vec![t, u.clone()])), Truth::True);
    assert_eq!(truth(&row, &Predicate::Or(vec![f, u])), Truth::Unknown);
}

#[test]
fn membership_with_null_candidates() {
    let row = Row::new().with("id", 3).with("none", Value::Null);
    let in_list = |field: &str, values: Vec<Value>| Predicate::In {
        field: field.to_string(),
        values,
    };

    assert!(eval_row(&row, &in_list("id", vec![Value::Int(1), Value::Int(3)])));
    assert_eq!(truth(&row, &in_list("id", Vec::new())), Truth::False);
    assert_eq!(truth(&row, &in_list("none", vec![Value::Int(1)])), Truth::Unknown);

    let not_in = Predicate::NotIn {
        field: "none".to_string(),
        values: vec![Value::Int(1)],
    };
    assert_eq!(truth(&row, &not_in), Truth::Unknown);
}

#[test]
fn text_operators_match_substrings() {
    let row = Row::new().with("name", "Jane").with("age", 40);
    let text = |field: &str, op: TextOp, needle: &str| Predicate::Text {
        field: field.to_string(),
        op,
        value: Value::from(needle),
    };

    assert!(eval_row(&row, &text("name", TextOp::StartsWith, "J")));
    assert!(eval_row(&row, &text("name", TextOp::Contains, "an")));
    assert!(eval_row(&row, &text("name", TextOp::EndsWith, "ne")));
    assert!(!eval_row(&row, &text("name", TextOp::EndsWith, "J")));
    assert!(!eval_row(&row, &text("age", TextOp::Contains, "4")));
}

#[test]
fn int_and_float_compare_numerically() {
    let row = Row::new().with("score", 2.5);

    assert!(eval_row(&row, &cmp("score", CompareOp::Gt, 2)));
    assert!(eval_row(&row, &cmp("score", CompareOp::Lte, 2.5)));
}

#[test]
fn param_refs_resolve_through_the_resolver() {
    let row = Row::new().with("age", 30);
    let params = [Value::Int(25), Value::Int(35)];
    let predicate: Predicate<ParamRef> = Predicate::And(vec![
        Predicate::Compare {
            field: "age".to_string(),
            op: CompareOp::Gte,
            value: ParamRef(0),
        },
        Predicate::Compare {
            field: "age".to_string(),
            op: CompareOp::Lt,
            value: ParamRef(1),
        },
    ]);

    let resolved = eval_with(&row, &predicate, &|param: &ParamRef| &params[param.0]);

    assert_eq!(resolved, Truth::True);
}
