use crate::{
    db::{
        client::{Client, ModelContext, OperationResult},
        extension::middleware::{MiddlewareParams, Next},
        query::{Operation, QueryArgs},
    },
    error::Error,
    value::{Row, Value},
};
use std::{collections::BTreeMap, fmt, future::Future, pin::Pin, sync::Arc};

/// Boxed, sendable future returned by extension callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type MethodFuture = BoxFuture<'static, Result<Value, Error>>;

pub type ModelMethod = Arc<dyn Fn(ModelContext, Value) -> MethodFuture + Send + Sync>;
pub type ClientMethod = Arc<dyn Fn(Client, Value) -> MethodFuture + Send + Sync>;
pub type QueryRewriter = Arc<dyn Fn(QueryArgs) -> Result<QueryArgs, Error> + Send + Sync>;
pub type ComputeFn = Arc<dyn Fn(&Row) -> Result<Value, Error> + Send + Sync>;
pub type Middleware = Arc<
    dyn Fn(MiddlewareParams, Next) -> BoxFuture<'static, Result<OperationResult, Error>>
        + Send
        + Sync,
>;

///
/// ModelScope
///
/// Which models an extension entry applies to. Within one extension a
/// model-specific entry overrides the wildcard entry of the same name.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ModelScope {
    AllModels,
    Model(String),
}

impl ModelScope {
    #[must_use]
    pub fn model(name: impl Into<String>) -> Self {
        Self::Model(name.into())
    }

    #[must_use]
    pub fn applies_to(&self, model: &str) -> bool {
        match self {
            Self::AllModels => true,
            Self::Model(name) => name == model,
        }
    }
}

///
/// ResultField
///
/// Computed result field: evaluated once per row when every field in
/// `needs` is present on it.
///

#[derive(Clone)]
pub struct ResultField {
    pub needs: Vec<String>,
    pub compute: ComputeFn,
}

impl fmt::Debug for ResultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultField")
            .field("needs", &self.needs)
            .finish_non_exhaustive()
    }
}

///
/// ExtensionDescriptor
///
/// Named, immutable bundle of behavior. Built once with the builder
/// methods below and then shared behind an `Arc`; composing it into a
/// client never mutates it.
///

#[derive(Clone, Default)]
pub struct ExtensionDescriptor {
    pub(crate) name: String,
    pub(crate) model_methods: BTreeMap<ModelScope, BTreeMap<String, ModelMethod>>,
    pub(crate) client_methods: BTreeMap<String, ClientMethod>,
    pub(crate) transaction_methods: BTreeMap<String, ClientMethod>,
    pub(crate) query_rewriters: BTreeMap<ModelScope, BTreeMap<Operation, QueryRewriter>>,
    pub(crate) result_fields: BTreeMap<ModelScope, BTreeMap<String, ResultField>>,
    pub(crate) middleware: Vec<Middleware>,
}

impl ExtensionDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inject `method` into the models covered by `scope`. The callback
    /// receives the model's context explicitly; there is no implicit `this`.
    #[must_use]
    pub fn model_method<F, Fut>(mut self, scope: ModelScope, method: &str, f: F) -> Self
    where
        F: Fn(ModelContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let method_fn: ModelMethod = Arc::new(move |ctx: ModelContext, args: Value| -> MethodFuture {
            Box::pin(f(ctx, args))
        });
        self.model_methods
            .entry(scope)
            .or_default()
            .insert(method.to_string(), method_fn);
        self
    }

    #[must_use]
    pub fn client_method<F, Fut>(mut self, method: &str, f: F) -> Self
    where
        F: Fn(Client, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let method_fn: ClientMethod = Arc::new(move |client: Client, args: Value| -> MethodFuture {
            Box::pin(f(client, args))
        });
        self.client_methods.insert(method.to_string(), method_fn);
        self
    }

    /// Method visible only on transaction-scoped clients, where it shadows
    /// a client method of the same name.
    #[must_use]
    pub fn transaction_method<F, Fut>(mut self, method: &str, f: F) -> Self
    where
        F: Fn(Client, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let method_fn: ClientMethod = Arc::new(move |client: Client, args: Value| -> MethodFuture {
            Box::pin(f(client, args))
        });
        self.transaction_methods.insert(method.to_string(), method_fn);
        self
    }

    #[must_use]
    pub fn query_rewriter<F>(mut self, scope: ModelScope, operation: Operation, f: F) -> Self
    where
        F: Fn(QueryArgs) -> Result<QueryArgs, Error> + Send + Sync + 'static,
    {
        self.query_rewriters
            .entry(scope)
            .or_default()
            .insert(operation, Arc::new(f));
        self
    }

    /// Register one rewriter for several operations.
    #[must_use]
    pub fn query_rewriter_for<F>(self, scope: &ModelScope, operations: &[Operation], f: F) -> Self
    where
        F: Fn(QueryArgs) -> Result<QueryArgs, Error> + Send + Sync + 'static,
    {
        let shared: QueryRewriter = Arc::new(f);
        operations.iter().fold(self, |ext, operation| {
            let shared = Arc::clone(&shared);
            ext.query_rewriter(scope.clone(), *operation, move |args| shared(args))
        })
    }

    #[must_use]
    pub fn result_field<F>(mut self, scope: ModelScope, field: &str, needs: &[&str], f: F) -> Self
    where
        F: Fn(&Row) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.result_fields.entry(scope).or_default().insert(
            field.to_string(),
            ResultField {
                needs: needs.iter().map(|need| (*need).to_string()).collect(),
                compute: Arc::new(f),
            },
        );
        self
    }

    /// Append a middleware. Across the composed pipeline, the middleware
    /// applied first runs outermost.
    #[must_use]
    pub fn middleware<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(MiddlewareParams, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OperationResult, Error>> + Send + 'static,
    {
        let middleware: Middleware = Arc::new(
            move |params: MiddlewareParams,
                  next: Next|
                  -> BoxFuture<'static, Result<OperationResult, Error>> {
                Box::pin(f(params, next))
            },
        );
        self.middleware.push(middleware);
        self
    }

    /// Model method names this extension injects for `model`.
    pub fn model_method_names<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a str> {
        self.model_methods
            .iter()
            .filter(move |(scope, _)| scope.applies_to(model))
            .flat_map(|(_, methods)| methods.keys().map(String::as_str))
    }

    pub fn client_method_names(&self) -> impl Iterator<Item = &str> {
        self.client_methods.keys().map(String::as_str)
    }
}

impl fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDescriptor")
            .field("name", &self.name)
            .field("client_methods", &self.client_methods.keys())
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}
