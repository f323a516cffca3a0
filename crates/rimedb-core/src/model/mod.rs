//! Runtime data-model descriptors consumed from the schema collaborator.
//!
//! These are validation inputs only: field names referenced by filters,
//! ordering and projection are checked here, and the per-kind operator
//! set is derived from `FieldKind`.

pub mod entity;
pub mod field;


use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

pub use entity::EntityModel;
pub use field::{FieldKind, FieldModel};

///
/// ModelError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[remain::sorted]
pub enum ModelError {
    #[error("model '{model}' declares field '{field}' more than once")]
    DuplicateField { model: String, field: String },

    #[error("model '{model}' already registered")]
    DuplicateModel { model: String },

    #[error("model name must not be empty")]
    EmptyName,

    #[error("model '{model}': '{ident}' is not a valid identifier")]
    InvalidIdentifier { model: String, ident: String },

    #[error("model '{model}': primary key '{field}' must name a scalar field")]
    InvalidPrimaryKey { model: String, field: String },
}

///
/// DataModel
///
/// Registry of every entity the client knows about, keyed by model name.
/// Shared read-only behind an `Arc` once built.
///

#[derive(Clone, Debug, Default)]
pub struct DataModel {
    models: BTreeMap<String, Arc<EntityModel>>,
}

impl DataModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model after validating it.
    pub fn with_model(mut self, model: EntityModel) -> Result<Self, ModelError> {
        self.register(model)?;

        Ok(self)
    }

    pub fn register(&mut self, model: EntityModel) -> Result<(), ModelError> {
        model.validate()?;
        if self.models.contains_key(&model.name) {
            return Err(ModelError::DuplicateModel { model: model.name });
        }
        self.models.insert(model.name.clone(), Arc::new(model));

        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<EntityModel>> {
        self.models.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<EntityModel>> {
        self.models.values()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
#[must_use]
pub fn is_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();

    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
