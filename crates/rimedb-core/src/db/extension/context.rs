//! Module: extension::context
//! Responsibility: the composed, read-only view of every applied extension.
//! Does not own: executing operations (client) or computing fields (compute).
//! Boundary: composition is pure; lookups walk the applied list, nothing is flattened.

use crate::{
    db::{
        extension::descriptor::{
            ClientMethod, ExtensionDescriptor, Middleware, ModelMethod, ModelScope, ResultField,
        },
        query::{Operation, QueryArgs},
    },
    error::Error,
};
use std::{collections::BTreeMap, sync::Arc};

/// Client methods that extensions may not claim in strict mode.
pub const BUILTIN_CLIENT_METHODS: [&str; 6] = [
    "connect",
    "disconnect",
    "executeRaw",
    "extends",
    "queryRaw",
    "transaction",
];

///
/// PipelineContext
///
/// Base operation table plus the linear record of applied extensions.
///
/// Lookup rules: the later-applied extension wins; within one extension a
/// model-specific entry beats the wildcard entry.
///

#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    extensions: Vec<Arc<ExtensionDescriptor>>,
    strict: bool,
}

impl PipelineContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject extensions that redefine an existing client method.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// New context with `extension` applied last. `self` is untouched.
    pub fn compose(&self, extension: impl Into<Arc<ExtensionDescriptor>>) -> Result<Self, Error> {
        let extension = extension.into();

        if self.strict {
            for method in extension.client_method_names() {
                let claimed = BUILTIN_CLIENT_METHODS.contains(&method)
                    || self
                        .extensions
                        .iter()
                        .any(|applied| applied.client_methods.contains_key(method));
                if claimed {
                    return Err(Error::ExtensionConflict {
                        extension: extension.name.clone(),
                        method: method.to_string(),
                    });
                }
            }
        }

        let mut extensions = self.extensions.clone();
        extensions.push(extension);

        Ok(Self {
            extensions,
            strict: self.strict,
        })
    }

    /// Context as it was before the extension at `index` was applied.
    #[must_use]
    pub fn prefix(&self, index: usize) -> Self {
        Self {
            extensions: self.extensions[..index.min(self.extensions.len())].to_vec(),
            strict: self.strict,
        }
    }

    #[must_use]
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    // --- Lookups ---

    /// Injected model method and the index of the extension defining it.
    #[must_use]
    pub fn model_method(&self, model: &str, method: &str) -> Option<(usize, ModelMethod)> {
        let specific = ModelScope::model(model);

        self.extensions
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, ext)| {
                [&specific, &ModelScope::AllModels]
                    .into_iter()
                    .find_map(|scope| ext.model_methods.get(scope)?.get(method).cloned())
                    .map(|found| (index, found))
            })
    }

    #[must_use]
    pub fn client_method(&self, method: &str) -> Option<ClientMethod> {
        self.extensions
            .iter()
            .rev()
            .find_map(|ext| ext.client_methods.get(method).cloned())
    }

    #[must_use]
    pub fn transaction_method(&self, method: &str) -> Option<ClientMethod> {
        self.extensions
            .iter()
            .rev()
            .find_map(|ext| ext.transaction_methods.get(method).cloned())
    }

    /// Apply every rewriter for (model, operation) in applied order; within
    /// one extension the wildcard rewriter runs before the specific one.
    pub fn rewrite(
        &self,
        model: &str,
        operation: Operation,
        args: QueryArgs,
    ) -> Result<QueryArgs, Error> {
        let specific = ModelScope::model(model);

        self.extensions.iter().try_fold(args, |args, ext| {
            [&ModelScope::AllModels, &specific]
                .into_iter()
                .filter_map(|scope| ext.query_rewriters.get(scope)?.get(&operation))
                .try_fold(args, |args, rewriter| rewriter(args))
        })
    }

    /// Effective computed fields for `model`.
    #[must_use]
    pub fn result_fields(&self, model: &str) -> BTreeMap<String, ResultField> {
        let specific = ModelScope::model(model);
        let mut fields = BTreeMap::new();

        for ext in &self.extensions {
            for scope in [&ModelScope::AllModels, &specific] {
                if let Some(scoped) = ext.result_fields.get(scope) {
                    fields.extend(scoped.iter().map(|(name, f)| (name.clone(), f.clone())));
                }
            }
        }

        fields
    }

    /// Middleware in applied order; index 0 runs outermost.
    #[must_use]
    pub fn middleware(&self) -> Arc<[Middleware]> {
        self.extensions
            .iter()
            .flat_map(|ext| ext.middleware.iter().cloned())
            .collect()
    }
}
