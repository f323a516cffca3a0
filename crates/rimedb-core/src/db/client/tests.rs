use super::*;
use crate::{
    db::{
        extension::{MiddlewareParams, ModelScope, Next},
        predicate::FilterExpr,
        query::{Operation, OrderDirection, QueryArgs},
    },
    error::ErrorClass,
    obs::CounterSink,
    test_support::{
        RecordingAdapter, USERS, data_model, ids, memory_adapter, memory_client, user, users,
    },
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn args(json: serde_json::Value) -> QueryArgs {
    QueryArgs::from_json(&json).expect("valid arguments")
}

fn by_id(id: i64) -> QueryArgs {
    QueryArgs::new().filter(FilterExpr::new().eq("id", id))
}

fn recording_client(dialect: Dialect) -> (RecordingAdapter, Client) {
    let adapter = RecordingAdapter::connected(dialect);
    let client = Client::new(Arc::new(adapter.clone()), data_model());

    (adapter, client)
}

//
// Base operations
//

#[tokio::test]
async fn three_valued_scenario_selects_expected_users() {
    let client = memory_client().await;

    let rows = client
        .model("user")
        .unwrap()
        .find_many(args(json!({
            "where": {
                "OR": [
                    { "AND": [{ "age": { "gte": 30 } }, { "isActive": true }] },
                    { "NOT": { "name": { "startsWith": "J" } }, "isActive": false },
                ]
            }
        })))
        .await
        .unwrap();

    assert_eq!(ids(&rows), vec![1, 3, 4, 5]);
}

#[tokio::test]
async fn finds_return_expected_shapes() {
    let users_model = memory_client().await.model("user").unwrap();

    let first = users_model
        .find_first(QueryArgs::new().order_by("age", OrderDirection::Desc))
        .await
        .unwrap();
    assert_eq!(first, Some(user(5, "Jane", 40, true)));

    let unique = users_model
        .find_unique(FilterExpr::new().eq("email", "bob@example.com"))
        .await
        .unwrap();
    assert_eq!(unique.and_then(|row| row.get("id").cloned()), Some(Value::Int(3)));

    let missing = users_model.find_unique(by_id(99)).await.unwrap();
    assert_eq!(missing, None);

    let err = users_model
        .find_unique(QueryArgs::new().filter(FilterExpr::new().eq("name", "Bob")))
        .await
        .unwrap_err();
    assert!(err.is_compile());
}

#[tokio::test]
async fn create_update_delete_round() {
    let client = memory_client().await;
    let users_model = client.model("user").unwrap();

    let created = users_model
        .create(
            Row::new()
                .with("name", "Dave")
                .with("age", 28)
                .with("isActive", true),
        )
        .await
        .unwrap();
    assert_eq!(created.get("id"), Some(&Value::Int(6)));

    let updated = users_model
        .update(by_id(6).set("age", 29).select(["id", "age"]))
        .await
        .unwrap();
    assert_eq!(updated, Row::new().with("id", 6).with("age", 29));

    let deleted = users_model.delete(by_id(6)).await.unwrap();
    assert_eq!(deleted.get("name"), Some(&Value::from("Dave")));
    assert_eq!(users_model.count(QueryArgs::new()).await.unwrap(), 5);
}

#[tokio::test]
async fn single_row_writes_report_missing_records() {
    let users_model = memory_client().await.model("user").unwrap();

    let err = users_model
        .update(by_id(99).set("age", 1))
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::RecordNotFound { model } if model == "user"));
    assert_eq!(err.class(), ErrorClass::NotFound);

    let err = users_model.delete(by_id(99)).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[tokio::test]
async fn bulk_writes_return_counts() {
    let client = memory_client().await;
    let users_model = client.model("user").unwrap();

    let touched = users_model
        .update_many(
            QueryArgs::new()
                .filter(FilterExpr::new().lt("age", 30))
                .set("isActive", true),
        )
        .await
        .unwrap();
    assert_eq!(touched, 2);

    let removed = users_model
        .delete_many(QueryArgs::new().filter(FilterExpr::new().gte("age", 35)))
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let active = users_model
        .count(QueryArgs::new().filter(FilterExpr::new().eq("isActive", true)))
        .await
        .unwrap();
    assert_eq!(active, 3);
}

#[tokio::test]
async fn count_ignores_paging() {
    let users_model = memory_client().await.model("user").unwrap();

    let count = users_model
        .count(QueryArgs::new().take(1).skip(1))
        .await
        .unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn aggregates_are_nested_by_function() {
    let users_model = memory_client().await.model("user").unwrap();

    let row = users_model
        .aggregate(args(json!({ "_count": true, "_sum": ["age"], "_max": ["age"] })))
        .await
        .unwrap();
    assert_eq!(row.get("_count"), Some(&Value::Int(5)));
    assert_eq!(
        row.get("_sum"),
        Some(&Value::Object(Row::new().with("age", 152)))
    );
    assert_eq!(
        row.get("_max"),
        Some(&Value::Object(Row::new().with("age", 40)))
    );

    let groups = users_model
        .group_by(QueryArgs::new().by(["isActive"]).count().min("age"))
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(
        groups[1],
        Row::new()
            .with("isActive", true)
            .with("_count", 3)
            .with("_min", Row::new().with("age", 30))
    );
}

#[tokio::test]
async fn unknown_model_is_a_compile_error() {
    let client = memory_client().await;

    let err = client.model("comment").unwrap_err();
    assert!(matches!(
        err,
        Error::Compile(CompileError::UnknownModel { ref model }) if model == "comment"
    ));
}

#[tokio::test]
async fn compile_errors_never_reach_the_adapter() {
    let (adapter, client) = recording_client(Dialect::Postgres);

    let err = client
        .model("user")
        .unwrap()
        .find_many(args(json!({ "where": { "age": { "contains": "x" } } })))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Compile);
    assert!(adapter.log().is_empty());
}

#[tokio::test]
async fn disconnected_client_fails_without_connecting() {
    let adapter = memory_adapter().await;
    let client = Client::new(adapter, data_model());
    client.disconnect().await.unwrap();

    let err = client
        .model("user")
        .unwrap()
        .find_many(QueryArgs::new())
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Connection);

    client.connect().await.unwrap();
    assert!(client.is_connected());
}

//
// Raw commands
//

#[tokio::test]
async fn raw_commands_bypass_the_pipeline() {
    let (adapter, client) = recording_client(Dialect::Postgres);
    let client = client
        .extends(
            ExtensionDescriptor::new("guard").middleware(
                |_params: MiddlewareParams, _next: Next| async {
                    Err(Error::extension("guard", "blocked"))
                },
            ),
        )
        .unwrap();

    adapter.respond(QueryResult::affected(3));
    adapter.respond(QueryResult::from_rows(vec![Row::new().with("n", 1)]));

    let affected = client
        .execute_raw(CompiledCommand::raw(
            "UPDATE users SET age = age + 1 WHERE age > $1",
            [Value::Int(20)],
        ))
        .await
        .unwrap();
    assert_eq!(affected, 3);

    let rows = client
        .query_raw(CompiledCommand::raw("SELECT 1 AS n", []))
        .await
        .unwrap();
    assert_eq!(rows, vec![Row::new().with("n", 1)]);

    // The same guard does stop model operations.
    let err = client
        .model("user")
        .unwrap()
        .find_many(QueryArgs::new())
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Extension);
    assert_eq!(adapter.sql().len(), 2);
}

//
// Transactions
//

#[tokio::test]
async fn failed_transaction_leaves_no_trace() {
    let adapter = memory_adapter().await;
    let client = Client::new(adapter.clone(), data_model());

    let err = client
        .transaction(|tx| async move {
            assert!(tx.is_transaction());
            let users_model = tx.model("user")?;
            users_model
                .create(Row::new().with("name", "Dave").with("age", 28).with("isActive", true))
                .await?;
            users_model.delete(by_id(1)).await?;

            // Duplicate email: the whole unit rolls back.
            users_model
                .create(
                    Row::new()
                        .with("name", "Copy")
                        .with("email", "bob@example.com")
                        .with("age", 50)
                        .with("isActive", false),
                )
                .await
        })
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Constraint);
    assert_eq!(adapter.rows(USERS).await, users());
}

#[tokio::test]
async fn successful_transaction_commits_every_write() {
    let adapter = memory_adapter().await;
    let sink = Arc::new(CounterSink::new());
    let client =
        Client::new(adapter.clone(), data_model()).with_metrics_sink(sink.clone() as SharedSink);

    let count = client
        .transaction(|tx| async move {
            let users_model = tx.model("user")?;
            users_model.delete(by_id(1)).await?;
            users_model.delete(by_id(2)).await?;

            // Joins the open transaction instead of beginning another.
            tx.transaction(|inner| async move {
                inner.model("user")?.count(QueryArgs::new()).await
            })
            .await
        })
        .await
        .unwrap();

    assert_eq!(count, 3);
    assert_eq!(ids(&adapter.rows(USERS).await), vec![3, 4, 5]);

    let snapshot = sink.snapshot();
    assert_eq!(snapshot.commits, 1);
    assert_eq!(snapshot.joined_transactions, 1);
    assert_eq!(snapshot.exec_calls, 3);
}

//
// Extensions
//

#[tokio::test]
async fn extends_returns_a_new_client() {
    let base = memory_client().await;
    let extended = base
        .extends(
            ExtensionDescriptor::new("greeter")
                .client_method("greet", |_client, args| async move {
                    let name = args.as_text().unwrap_or("nobody").to_string();
                    Ok(Value::from(format!("hello {name}")))
                }),
        )
        .unwrap();

    assert_eq!(
        extended.call("greet", Value::from("ada")).await.unwrap(),
        Value::from("hello ada")
    );

    let err = base.call("greet", Value::Null).await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownMethod { ref target, ref method } if target == "client" && method == "greet"
    ));
}

#[tokio::test]
async fn transaction_methods_shadow_client_methods() {
    let client = memory_client()
        .await
        .extends(
            ExtensionDescriptor::new("scope")
                .client_method("where", |_c, _a| async { Ok(Value::from("outside")) })
                .transaction_method("where", |_c, _a| async { Ok(Value::from("inside")) }),
        )
        .unwrap();

    assert_eq!(
        client.call("where", Value::Null).await.unwrap(),
        Value::from("outside")
    );
    let inside = client
        .transaction(|tx| async move { tx.call("where", Value::Null).await })
        .await
        .unwrap();
    assert_eq!(inside, Value::from("inside"));
}

#[tokio::test]
async fn model_methods_see_this_and_next() {
    let client = memory_client()
        .await
        .extends(
            ExtensionDescriptor::new("active")
                .query_rewriter(ModelScope::model("user"), Operation::FindMany, |args| {
                    Ok(args.and_filter(FilterExpr::new().eq("isActive", true)))
                })
                .model_method(ModelScope::AllModels, "countAll", |ctx, _args| async move {
                    let rows = ctx.next().find_many(QueryArgs::new()).await?;
                    Ok(Value::from(rows.len() as i64))
                })
                .model_method(ModelScope::AllModels, "countVisible", |ctx, _args| async move {
                    let rows = ctx.this().find_many(QueryArgs::new()).await?;
                    Ok(Value::from(rows.len() as i64))
                }),
        )
        .unwrap();
    let users_model = client.model("user").unwrap();

    assert_eq!(users_model.call("countVisible", Value::Null).await.unwrap(), Value::Int(3));
    assert_eq!(users_model.call("countAll", Value::Null).await.unwrap(), Value::Int(5));
}

#[tokio::test]
async fn rewriters_keep_unique_filters_usable() {
    let client = memory_client()
        .await
        .extends(ExtensionDescriptor::new("hideZed").query_rewriter_for(
            &ModelScope::model("user"),
            &[Operation::FindUnique, Operation::Update],
            |args| {
                let not_zed = FilterExpr::negate(FilterExpr::new().eq("name", "Zed"));
                Ok(args.and_filter(not_zed))
            },
        ))
        .unwrap();
    let users_model = client.model("user").unwrap();
    let where_bob = json!({ "id": 3, "NOT": { "age": 99 } });

    let found = users_model
        .find_unique(args(json!({ "where": where_bob.clone() })))
        .await
        .unwrap();
    assert_eq!(found.and_then(|row| row.get("id").cloned()), Some(Value::Int(3)));

    let updated = users_model
        .update(args(json!({ "where": where_bob, "data": { "name": "Robert" } })))
        .await
        .unwrap();
    assert_eq!(updated.get("name"), Some(&Value::from("Robert")));
}

#[tokio::test]
async fn specific_model_method_beats_wildcard_in_same_extension() {
    let client = memory_client()
        .await
        .extends(
            ExtensionDescriptor::new("labels")
                .model_method(ModelScope::AllModels, "label", |ctx, _| async move {
                    Ok(Value::from(format!("any:{}", ctx.model())))
                })
                .model_method(ModelScope::model("user"), "label", |_, _| async {
                    Ok(Value::from("user-only"))
                }),
        )
        .unwrap();

    let user_label = client.model("user").unwrap().call("label", Value::Null).await;
    let post_label = client.model("post").unwrap().call("label", Value::Null).await;
    assert_eq!(user_label.unwrap(), Value::from("user-only"));
    assert_eq!(post_label.unwrap(), Value::from("any:post"));
}

#[tokio::test]
async fn call_falls_back_to_base_operations() {
    let users_model = memory_client().await.model("user").unwrap();

    let count = users_model
        .call("count", Value::from(json!({ "where": { "age": { "lt": 30 } } })))
        .await
        .unwrap();
    assert_eq!(count, Value::Int(2));

    let err = users_model.call("explode", Value::Null).await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownMethod { ref target, .. } if target == "model 'user'"
    ));
}

#[tokio::test]
async fn middleware_runs_once_per_operation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let client = memory_client()
        .await
        .extends(
            ExtensionDescriptor::new("counter")
                .middleware(move |params: MiddlewareParams, next: Next| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    next.run(params)
                })
                .model_method(ModelScope::AllModels, "twoReads", |ctx, _| async move {
                    ctx.this().count(QueryArgs::new()).await?;
                    ctx.this().count(QueryArgs::new()).await?;
                    Ok(Value::Null)
                }),
        )
        .unwrap();
    let users_model = client.model("user").unwrap();

    users_model.find_many(QueryArgs::new()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    users_model.call("twoReads", Value::Null).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn middleware_may_rewrite_arguments() {
    let client = memory_client()
        .await
        .extends(ExtensionDescriptor::new("firstTwo").middleware(
            |mut params: MiddlewareParams, next: Next| {
                if params.operation == Operation::FindMany {
                    params.args = params.args.order_by("id", OrderDirection::Asc).take(2);
                }
                next.run(params)
            },
        ))
        .unwrap();

    let rows = client
        .model("user")
        .unwrap()
        .find_many(QueryArgs::new())
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 2]);
}

#[tokio::test]
async fn computed_fields_follow_select() {
    let client = memory_client()
        .await
        .extends(ExtensionDescriptor::new("display").result_field(
            ModelScope::model("user"),
            "display",
            &["name", "age"],
            |row| {
                let name = row.get("name").and_then(Value::as_text).unwrap_or_default();
                let age = row.get("age").and_then(Value::as_i64).unwrap_or_default();
                Ok(Value::from(format!("{name} ({age})")))
            },
        ))
        .unwrap();
    let users_model = client.model("user").unwrap();

    let row = users_model
        .find_unique(by_id(3).select(["id", "display"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row, Row::new().with("id", 3).with("display", "Bob (30)"));

    // Without a select every stored field is kept alongside the computed one.
    let full = users_model.find_unique(by_id(3)).await.unwrap().unwrap();
    assert_eq!(full.get("display"), Some(&Value::from("Bob (30)")));
    assert_eq!(full.get("email"), Some(&Value::from("bob@example.com")));

    // Counts and aggregates are left alone.
    assert_eq!(users_model.count(QueryArgs::new()).await.unwrap(), 5);
}

#[tokio::test]
async fn strict_config_rejects_conflicting_extensions() {
    let client = memory_client()
        .await
        .config(ClientConfig::new().strict_extensions().debug());
    let ext = |name: &str| {
        ExtensionDescriptor::new(name).client_method("stats", |_c, _a| async { Ok(Value::Null) })
    };

    let client = client.extends(ext("first")).unwrap();
    let err = client.extends(ext("second")).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Extension);

    // Debug logging does not change results.
    let rows = client
        .model("user")
        .unwrap()
        .find_many(QueryArgs::new())
        .await
        .unwrap();
    assert_eq!(rows.len(), 5);
}

//
// Dialects without RETURNING
//

#[tokio::test]
async fn mysql_create_reads_back_inserted_row() {
    let (adapter, client) = recording_client(Dialect::MySql);
    adapter.respond(QueryResult::affected(1));
    adapter.respond(QueryResult::from_rows(vec![user(6, "Dave", 28, true)]));

    let created = client
        .model("user")
        .unwrap()
        .create(Row::new().with("name", "Dave").with("age", 28).with("isActive", true))
        .await
        .unwrap();

    assert_eq!(created, user(6, "Dave", 28, true));
    assert_eq!(adapter.log(), vec!["begin", "execute", "execute", "commit"]);
    let sql = adapter.sql();
    assert!(sql[0].starts_with("INSERT INTO `users`"));
    assert!(sql[1].ends_with("WHERE `id` = LAST_INSERT_ID()"));
}

#[tokio::test]
async fn mysql_update_probes_then_reads() {
    let (adapter, client) = recording_client(Dialect::MySql);
    adapter.respond(QueryResult::from_rows(vec![Row::new().with("id", 2)]));
    adapter.respond(QueryResult::affected(1));
    adapter.respond(QueryResult::from_rows(vec![user(2, "John", 26, false)]));

    let updated = client
        .model("user")
        .unwrap()
        .update(
            QueryArgs::new()
                .filter(FilterExpr::new().eq("email", "john@example.com"))
                .set("age", 26),
        )
        .await
        .unwrap();

    assert_eq!(updated.get("age"), Some(&Value::Int(26)));
    let sql = adapter.sql();
    assert_eq!(sql.len(), 3);
    assert!(sql[1].starts_with("UPDATE `users`"));
    assert!(sql[2].contains("WHERE `id` = ?"));
    assert_eq!(adapter.script().commands[2].params, vec![Value::Int(2)]);
}

#[tokio::test]
async fn mysql_delete_of_missing_row_rolls_back() {
    let (adapter, client) = recording_client(Dialect::MySql);

    let err = client
        .model("user")
        .unwrap()
        .delete(by_id(42))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(adapter.log(), vec!["begin", "execute", "rollback"]);
}

#[tokio::test]
async fn postgres_writes_use_returning() {
    let (adapter, client) = recording_client(Dialect::Postgres);
    adapter.respond(QueryResult::from_rows(vec![user(1, "Alice", 23, false)]));

    let updated = client
        .model("user")
        .unwrap()
        .update(by_id(1).set("age", 23))
        .await
        .unwrap();

    assert_eq!(updated.get("age"), Some(&Value::Int(23)));
    assert_eq!(adapter.log(), vec!["execute"]);
    assert!(adapter.sql()[0].contains("RETURNING"));
}
