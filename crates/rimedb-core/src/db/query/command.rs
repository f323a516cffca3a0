use crate::{
    db::{
        predicate::{ParamRef, Predicate},
        query::args::{AggregateCall, OrderDirection},
    },
    value::{Row, Value},
};
use serde::{Deserialize, Serialize};

///
/// CompiledCommand
///
/// Backend-ready operation plus its positional parameters. Built once per
/// operation and handed to the adapter by value.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledCommand {
    pub body: CommandBody,
    pub params: Vec<Value>,
}

impl CompiledCommand {
    #[must_use]
    pub const fn sql(text: String, params: Vec<Value>) -> Self {
        Self {
            body: CommandBody::Sql(text),
            params,
        }
    }

    #[must_use]
    pub const fn document(command: DocumentCommand, params: Vec<Value>) -> Self {
        Self {
            body: CommandBody::Document(command),
            params,
        }
    }

    /// Caller-authored SQL; bypasses compilation and the extension pipeline.
    #[must_use]
    pub fn raw(text: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        Self::sql(text.into(), params.into_iter().collect())
    }

    #[must_use]
    pub const fn as_sql(&self) -> Option<&str> {
        match &self.body {
            CommandBody::Sql(text) => Some(text.as_str()),
            CommandBody::Document(_) => None,
        }
    }

    #[must_use]
    pub const fn as_document(&self) -> Option<&DocumentCommand> {
        match &self.body {
            CommandBody::Document(command) => Some(command),
            CommandBody::Sql(_) => None,
        }
    }
}

///
/// CommandBody
///

#[derive(Clone, Debug, PartialEq)]
pub enum CommandBody {
    Sql(String),
    Document(DocumentCommand),
}

///
/// DocumentCommand
///
/// Structured operation for document backends. Literals never appear
/// inline: filters and assignments hold `ParamRef`s into the command's
/// parameter list, assigned in the same pre-order the SQL renderer uses.
///
/// Every write returns the affected documents, like `RETURNING *`.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum DocumentCommand {
    Find {
        collection: String,
        filter: Predicate<ParamRef>,
        select: Vec<String>,
        order: Vec<(String, OrderDirection)>,
        skip: u64,
        take: Option<u64>,
    },
    Insert {
        collection: String,
        fields: Vec<(String, ParamRef)>,
    },
    Update {
        collection: String,
        filter: Predicate<ParamRef>,
        set: Vec<(String, ParamRef)>,
    },
    Delete {
        collection: String,
        filter: Predicate<ParamRef>,
    },
    Count {
        collection: String,
        filter: Predicate<ParamRef>,
    },
    Aggregate {
        collection: String,
        filter: Predicate<ParamRef>,
        aggregates: Vec<AggregateCall>,
    },
    GroupBy {
        collection: String,
        filter: Predicate<ParamRef>,
        by: Vec<String>,
        aggregates: Vec<AggregateCall>,
        order: Vec<(String, OrderDirection)>,
        skip: u64,
        take: Option<u64>,
    },
}

impl DocumentCommand {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Find { collection, .. }
            | Self::Insert { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Count { collection, .. }
            | Self::Aggregate { collection, .. }
            | Self::GroupBy { collection, .. } => collection,
        }
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Insert { .. } | Self::Update { .. } | Self::Delete { .. }
        )
    }
}

///
/// QueryResult
///
/// Rows handed back by an adapter. `row_count` is the number of rows the
/// command affected or returned.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl QueryResult {
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;

        Self { rows, row_count }
    }

    #[must_use]
    pub const fn affected(row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }
}
