use crate::model::{ModelError, field::FieldModel, is_identifier};
use serde::{Deserialize, Serialize};

///
/// EntityModel
/// Runtime model for one entity, as emitted by the schema collaborator.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityModel {
    /// Stable external name used for routing and extension scopes.
    pub name: String,
    /// Backend table or collection name.
    pub table: String,
    /// Primary key field name (points at an entry in `fields`).
    pub primary_key: String,
    /// Ordered field list.
    pub fields: Vec<FieldModel>,
}

impl EntityModel {
    /// Build a model whose table name equals its model name.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            table: name.clone(),
            name,
            primary_key: primary_key.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldModel) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn primary_key_field(&self) -> Option<&FieldModel> {
        self.get_field(&self.primary_key)
    }

    /// Primary key or any field flagged unique.
    #[must_use]
    pub fn is_unique_field(&self, name: &str) -> bool {
        name == self.primary_key || self.get_field(name).is_some_and(|field| field.unique)
    }

    /// Fields stored on the row itself (relations excluded).
    pub fn column_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.fields.iter().filter(|field| !field.kind.is_relation())
    }

    /// Structural checks performed once, when the model is registered.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if !is_identifier(&self.table) {
            return Err(ModelError::InvalidIdentifier {
                model: self.name.clone(),
                ident: self.table.clone(),
            });
        }

        let mut seen = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(ModelError::InvalidIdentifier {
                    model: self.name.clone(),
                    ident: field.name.clone(),
                });
            }
            if seen.contains(&field.name.as_str()) {
                return Err(ModelError::DuplicateField {
                    model: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            seen.push(field.name.as_str());
        }

        match self.primary_key_field() {
            Some(pk) if !pk.is_scalar() => {
                Err(ModelError::InvalidPrimaryKey {
                    model: self.name.clone(),
                    field: self.primary_key.clone(),
                })
            }
            Some(_) => Ok(()),
            None => Err(ModelError::InvalidPrimaryKey {
                model: self.name.clone(),
                field: self.primary_key.clone(),
            }),
        }
    }
}
