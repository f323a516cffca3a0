use crate::{
    db::{
        predicate::{FilterExpr, PredicateCompiler, eval_row},
        query::Dialect,
    },
    test_support::user_model,
    value::{Row, Value},
};
use proptest::prelude::*;
use std::collections::BTreeSet;

// Leaf filters over non-null rows, so two-valued set algebra applies.
fn arb_leaf() -> impl Strategy<Value = FilterExpr> {
    prop_oneof![
        (0i64..50).prop_map(|age| FilterExpr::new().gte("age", age)),
        (0i64..50).prop_map(|age| FilterExpr::new().lt("age", age)),
        any::<bool>().prop_map(|active| FilterExpr::new().eq("isActive", active)),
        "[A-D]".prop_map(|prefix| FilterExpr::new().starts_with("name", prefix)),
        prop::collection::vec(1i64..8, 0..4).prop_map(|ids| FilterExpr::new().in_list("id", ids)),
        prop::collection::vec(1i64..8, 0..4)
            .prop_map(|ids| FilterExpr::new().not_in_list("id", ids)),
    ]
}

fn arb_filter() -> impl Strategy<Value = FilterExpr> {
    arb_leaf().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(|exprs| FilterExpr::all(exprs)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(|exprs| FilterExpr::any(exprs)),
            inner.prop_map(FilterExpr::negate),
        ]
    })
}

fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec((0i64..50, any::<bool>(), "[A-E][a-z]{0,3}"), 0..8).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(index, (age, active, name))| {
                Row::new()
                    .with("id", i64::try_from(index).unwrap_or_default() + 1)
                    .with("age", age)
                    .with("isActive", active)
                    .with("name", name)
            })
            .collect()
    })
}

fn results_of(rows: &[Row], expr: &FilterExpr) -> BTreeSet<usize> {
    let model = user_model();
    let predicate = PredicateCompiler::new(Dialect::Document)
        .with_model(&model)
        .lower(Some(expr))
        .expect("generated filters are valid");

    rows.iter()
        .enumerate()
        .filter(|(_, row)| eval_row(*row, &predicate))
        .map(|(index, _)| index)
        .collect()
}

// Substitute each `?` with the next parameter, in order.
fn replay(clause: &str, params: &[Value]) -> Option<String> {
    let mut params = params.iter();
    let mut out = String::new();
    for ch in clause.chars() {
        if ch == '?' {
            out.push_str(&format!("<{:?}>", params.next()?));
        } else {
            out.push(ch);
        }
    }

    params.next().is_none().then_some(out)
}

proptest! {
    #[test]
    fn and_is_intersection(rows in arb_rows(), a in arb_filter(), b in arb_filter()) {
        let both = results_of(&rows, &FilterExpr::all([a.clone(), b.clone()]));
        let expected: BTreeSet<usize> =
            results_of(&rows, &a).intersection(&results_of(&rows, &b)).copied().collect();

        prop_assert_eq!(both, expected);
    }

    #[test]
    fn or_is_union(rows in arb_rows(), a in arb_filter(), b in arb_filter()) {
        let either = results_of(&rows, &FilterExpr::any([a.clone(), b.clone()]));
        let expected: BTreeSet<usize> =
            results_of(&rows, &a).union(&results_of(&rows, &b)).copied().collect();

        prop_assert_eq!(either, expected);
    }

    #[test]
    fn not_is_complement(rows in arb_rows(), a in arb_filter()) {
        let negated = results_of(&rows, &FilterExpr::negate(a.clone()));
        let all: BTreeSet<usize> = (0..rows.len()).collect();
        let expected: BTreeSet<usize> = all.difference(&results_of(&rows, &a)).copied().collect();

        prop_assert_eq!(negated, expected);
    }

    #[test]
    fn empty_membership_bounds(rows in arb_rows()) {
        let none = results_of(&rows, &FilterExpr::new().in_list("id", Vec::<i64>::new()));
        let all = results_of(&rows, &FilterExpr::new().not_in_list("id", Vec::<i64>::new()));

        prop_assert!(none.is_empty());
        prop_assert_eq!(all.len(), rows.len());
    }

    #[test]
    fn params_replay_in_placeholder_order(a in arb_filter(), b in arb_filter()) {
        let expr = FilterExpr::any([a, b]);
        let model = user_model();
        let compiled = PredicateCompiler::new(Dialect::Sqlite)
            .with_model(&model)
            .compile(Some(&expr))
            .expect("generated filters are valid");

        let clause = compiled.clause.unwrap_or_default();
        prop_assert_eq!(clause.matches('?').count(), compiled.params.len());
        prop_assert!(replay(&clause, &compiled.params).is_some());

        let mut document_params = Vec::new();
        PredicateCompiler::new(Dialect::Document)
            .with_model(&model)
            .compile_document(Some(&expr), &mut document_params)
            .expect("generated filters are valid");
        let relational: Vec<Value> = compiled
            .params
            .iter()
            .filter(|value| !matches!(value, Value::Text(_)))
            .cloned()
            .collect();
        let document: Vec<Value> = document_params
            .into_iter()
            .filter(|value| !matches!(value, Value::Text(_)))
            .collect();
        prop_assert_eq!(relational, document);
    }
}
