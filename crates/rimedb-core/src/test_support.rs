//! Shared fixtures for unit tests: the five-user data set, a connected
//! memory client, and a recording adapter for relational dialects.

use crate::{
    db::{
        adapter::{Adapter, MemoryAdapter, MemoryStore, SharedAdapter},
        client::Client,
        query::{CompiledCommand, Dialect, QueryResult},
    },
    error::Error,
    model::{DataModel, EntityModel, FieldKind, FieldModel},
    value::{Row, Value},
};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

pub(crate) const USERS: &str = "users";

pub(crate) fn user_model() -> EntityModel {
    EntityModel::new("user", "id")
        .table(USERS)
        .field(FieldModel::new("id", FieldKind::Int))
        .field(FieldModel::new("name", FieldKind::Text))
        .field(FieldModel::new("email", FieldKind::Text).unique().optional())
        .field(FieldModel::new("age", FieldKind::Int))
        .field(FieldModel::new("isActive", FieldKind::Bool))
        .field(FieldModel::new("deletedAt", FieldKind::DateTime).optional())
        .field(FieldModel::new(
            "posts",
            FieldKind::Relation {
                model: "post".to_string(),
            },
        ))
}

pub(crate) fn post_model() -> EntityModel {
    EntityModel::new("post", "id")
        .table("posts")
        .field(FieldModel::new("id", FieldKind::Int))
        .field(FieldModel::new("title", FieldKind::Text))
        .field(FieldModel::new("authorId", FieldKind::Int))
}

pub(crate) fn data_model() -> DataModel {
    DataModel::new()
        .with_model(user_model())
        .and_then(|model| model.with_model(post_model()))
        .expect("fixture models are valid")
}

pub(crate) fn user(id: i64, name: &str, age: i64, active: bool) -> Row {
    Row::new()
        .with("id", id)
        .with("name", name)
        .with("email", format!("{}@example.com", name.to_lowercase()))
        .with("age", age)
        .with("isActive", active)
        .with("deletedAt", Value::Null)
}

/// Ages 22..40; Alice and John inactive, the rest active.
pub(crate) fn users() -> Vec<Row> {
    vec![
        user(1, "Alice", 22, false),
        user(2, "John", 25, false),
        user(3, "Bob", 30, true),
        user(4, "Carol", 35, true),
        user(5, "Jane", 40, true),
    ]
}

pub(crate) fn memory_store() -> MemoryStore {
    MemoryStore::from_model(&data_model()).rows(USERS, users())
}

pub(crate) async fn memory_adapter() -> Arc<MemoryAdapter> {
    let adapter = Arc::new(MemoryAdapter::new(memory_store()));
    adapter.connect().await.expect("memory connect");

    adapter
}

/// Connected client over the five-user memory store.
pub(crate) async fn memory_client() -> Client {
    let adapter: SharedAdapter = memory_adapter().await;

    Client::new(adapter, data_model())
}

/// Sorted `id` values of `rows`.
pub(crate) fn ids(rows: &[Row]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();

    ids
}

///
/// Script
///
/// What a `RecordingAdapter` saw, plus the responses and failures it
/// should produce.
///

#[derive(Default)]
pub(crate) struct Script {
    pub(crate) log: Vec<String>,
    pub(crate) commands: Vec<CompiledCommand>,
    pub(crate) responses: VecDeque<QueryResult>,
    pub(crate) fail_begin: bool,
    pub(crate) fail_commit: bool,
    pub(crate) fail_rollback: bool,
    pub(crate) fail_execute: Option<String>,
}

///
/// RecordingAdapter
///
/// Relational test double: records every command and lifecycle call and
/// replays queued results in order. Unqueued executions return nothing.
///

#[derive(Clone)]
pub(crate) struct RecordingAdapter {
    dialect: Dialect,
    script: Arc<Mutex<Script>>,
    connected: Arc<AtomicBool>,
    scoped: bool,
}

impl RecordingAdapter {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            script: Arc::new(Mutex::new(Script::default())),
            connected: Arc::new(AtomicBool::new(false)),
            scoped: false,
        }
    }

    pub(crate) fn connected(dialect: Dialect) -> Self {
        let adapter = Self::new(dialect);
        adapter.connected.store(true, Ordering::SeqCst);

        adapter
    }

    pub(crate) fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().expect("script lock")
    }

    pub(crate) fn respond(&self, result: QueryResult) {
        self.script().responses.push_back(result);
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.script().log.clone()
    }

    /// SQL text of every executed command, in order.
    pub(crate) fn sql(&self) -> Vec<String> {
        self.script()
            .commands
            .iter()
            .filter_map(|command| command.as_sql().map(str::to_string))
            .collect()
    }

    fn record(&self, entry: &str) {
        self.script().log.push(entry.to_string());
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn connect(&self) -> Result<(), Error> {
        self.record("connect");
        self.connected.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.record("disconnect");
        self.connected.store(false, Ordering::SeqCst);

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn in_transaction(&self) -> bool {
        self.scoped
    }

    async fn execute(&self, command: CompiledCommand) -> Result<QueryResult, Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let mut script = self.script();
        script.log.push("execute".to_string());
        script.commands.push(command);
        if let Some(message) = script.fail_execute.clone() {
            return Err(Error::constraint(message));
        }

        Ok(script.responses.pop_front().unwrap_or_default())
    }

    async fn begin_transaction(&self) -> Result<Arc<dyn Adapter>, Error> {
        self.record("begin");
        if self.script().fail_begin {
            return Err(Error::backend("begin failed"));
        }

        Ok(Arc::new(Self {
            scoped: true,
            ..self.clone()
        }))
    }

    async fn commit_transaction(&self) -> Result<(), Error> {
        if !self.scoped {
            return Err(Error::transaction_state("not a transaction"));
        }
        self.record("commit");
        if self.script().fail_commit {
            return Err(Error::backend("commit failed"));
        }

        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<(), Error> {
        if !self.scoped {
            return Err(Error::transaction_state("not a transaction"));
        }
        self.record("rollback");
        if self.script().fail_rollback {
            return Err(Error::backend("rollback failed"));
        }

        Ok(())
    }
}
