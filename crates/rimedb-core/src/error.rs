use crate::model::ModelError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Runtime error surfaced by every public operation.
///
/// Compile errors are raised before any command reaches an adapter, so a
/// caller can always tell "bad filter" apart from "storage rejected the
/// write". Constraint violations carry the backend message verbatim.
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum Error {
    #[error("backend error: {message}")]
    Backend { message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("{message}")]
    ConstraintViolation { message: String },

    #[error("extension '{extension}' failed: {message}")]
    Extension { extension: String, message: String },

    #[error("extension '{extension}' redefines client method '{method}'")]
    ExtensionConflict { extension: String, method: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("adapter is not connected")]
    NotConnected,

    #[error("no '{model}' record matched the filter")]
    RecordNotFound { model: String },

    #[error("transaction state error: {message}")]
    TransactionState { message: String },

    #[error("unknown method '{method}' on {target}")]
    UnknownMethod { target: String, method: String },
}

impl Error {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState {
            message: message.into(),
        }
    }

    /// Error raised from inside user-supplied extension code.
    pub fn extension(extension: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extension {
            extension: extension.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Backend { .. } => ErrorClass::Backend,
            Self::Compile(_) => ErrorClass::Compile,
            Self::ConstraintViolation { .. } => ErrorClass::Constraint,
            Self::Extension { .. } | Self::ExtensionConflict { .. } | Self::UnknownMethod { .. } => {
                ErrorClass::Extension
            }
            Self::Model(_) => ErrorClass::Model,
            Self::NotConnected => ErrorClass::Connection,
            Self::RecordNotFound { .. } => ErrorClass::NotFound,
            Self::TransactionState { .. } => ErrorClass::Transaction,
        }
    }

    #[must_use]
    pub const fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }
}

///
/// CompileError
///
/// Malformed or ill-typed query input, detected while compiling a filter
/// or assembling a command.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[remain::sorted]
pub enum CompileError {
    #[error("filter nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },

    #[error("combinator '{combinator}' appears more than once at one filter level")]
    DuplicateCombinator { combinator: String },

    #[error("'{ident}' is not a valid identifier")]
    InvalidIdentifier { ident: String },

    #[error("unknown filter operator '{operator}' on field '{field}'")]
    InvalidOperator { field: String, operator: String },

    #[error("malformed filter: {message}")]
    MalformedFilter { message: String },

    #[error("{operation} requires argument '{argument}'")]
    MissingArgument {
        operation: String,
        argument: String,
    },

    #[error("operator '{operator}' is not supported on field '{field}' of kind {kind}")]
    OperatorNotSupported {
        field: String,
        operator: String,
        kind: String,
    },

    #[error("operator '{operator}' on field '{field}' expects {expected}, found {found}")]
    TypeMismatch {
        field: String,
        operator: String,
        expected: String,
        found: String,
    },

    #[error("{operation} on '{model}' requires an equality filter on a unique field")]
    UniqueWhereRequired { model: String, operation: String },

    #[error("unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("unknown model '{model}'")]
    UnknownModel { model: String },
}

impl CompileError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFilter {
            message: message.into(),
        }
    }
}

///
/// ErrorClass
/// Stable classification for runtime errors.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[remain::sorted]
pub enum ErrorClass {
    Backend,
    Compile,
    Connection,
    Constraint,
    Extension,
    Model,
    NotFound,
    Transaction,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Backend => "backend",
            Self::Compile => "compile",
            Self::Connection => "connection",
            Self::Constraint => "constraint",
            Self::Extension => "extension",
            Self::Model => "model",
            Self::NotFound => "not_found",
            Self::Transaction => "transaction",
        };
        write!(f, "{label}")
    }
}
