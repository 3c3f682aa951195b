//! Directives: named middleware attached to types and fields.
//!
//! A [`Directive`] couples a name and literal arguments, which are printed into the generated
//! schema as `@name(arg: value)`, with an async handler which runs every time a field it applies to
//! is resolved. Handlers receive [`DirectiveParams`], through which they can run the rest of the
//! resolver chain ([`resolve`](DirectiveParams::resolve)) and suppress data from the result
//! ([`filter`](DirectiveParams::filter)). A handler which never calls `resolve` still gets the
//! rest of the chain run for it, exactly once, after it completes; a handler which returns an
//! error aborts the field.
//!
//! Directives which need to refer to models that are not constructed yet can be declared lazily
//! with [`LazyDirective`].

use crate::{
    context::{RequestContext, ResolveInfo},
    resolvers::{Resolver, ResolverParams},
    signature::type_of_value,
};
use async_graphql::{Name, Value};
use derivative::Derivative;
use futures::future::{BoxFuture, FutureExt};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, OnceLock};

type Handler = Arc<dyn Fn(DirectiveParams) -> BoxFuture<'static, async_graphql::Result<()>> + Send + Sync>;

/// A directive invocation and its handler.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Directive {
    name: String,
    args: IndexMap<String, Value>,
    #[derivative(Debug = "ignore")]
    handler: Handler,
}

impl Directive {
    /// Create a directive with no arguments.
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(DirectiveParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = async_graphql::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            args: Default::default(),
            handler: Arc::new(move |params| handler(params).boxed()),
        }
    }

    /// Add a literal argument to the invocation.
    ///
    /// [`Value::Null`] is allowed; it makes the argument nullable in the directive definition but
    /// is left out of the printed invocation.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &IndexMap<String, Value> {
        &self.args
    }

    /// The invocation as printed in SDL, like `@auth(role: "admin")`.
    pub fn invocation(&self) -> String {
        let args = self
            .args
            .iter()
            .filter(|(_, value)| !matches!(value, Value::Null))
            .map(|(name, value)| format!("{name}: {value}"))
            .join(", ");
        if args.is_empty() {
            format!("@{}", self.name)
        } else {
            format!("@{}({args})", self.name)
        }
    }

    pub(crate) async fn handle(&self, params: DirectiveParams) -> async_graphql::Result<()> {
        (self.handler)(params).await
    }
}

/// A directive built on first use.
///
/// The factory runs at most once; every clone shares the result.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct LazyDirective {
    cell: Arc<OnceLock<Directive>>,
    #[derivative(Debug = "ignore")]
    factory: Arc<dyn Fn() -> Directive + Send + Sync>,
}

impl LazyDirective {
    pub fn new(factory: impl Fn() -> Directive + Send + Sync + 'static) -> Self {
        Self {
            cell: Default::default(),
            factory: Arc::new(factory),
        }
    }

    /// Get the directive, building it if this is the first use.
    pub fn get(&self) -> &Directive {
        self.cell.get_or_init(|| (self.factory)())
    }
}

impl From<Directive> for LazyDirective {
    fn from(directive: Directive) -> Self {
        let cell = Arc::new(OnceLock::from(directive.clone()));
        Self {
            cell,
            factory: Arc::new(move || directive.clone()),
        }
    }
}

/// The arguments passed to a directive handler.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DirectiveParams {
    /// The parent value of the field.
    pub source: Value,
    /// The field arguments.
    pub args: IndexMap<Name, Value>,
    pub context: RequestContext,
    pub info: ResolveInfo,
    /// The name of the field being resolved.
    pub field: String,
    #[derivative(Debug = "ignore")]
    chain: Arc<Chain>,
}

impl DirectiveParams {
    pub(crate) fn new(params: ResolverParams, chain: Arc<Chain>) -> Self {
        Self {
            field: params.info.field_name.clone(),
            source: params.source,
            args: params.args,
            context: params.context,
            info: params.info,
            chain,
        }
    }

    /// Run the rest of the resolver chain and return its (filtered) result.
    ///
    /// This may be called any number of times; each call runs the chain again and replaces the
    /// field's result.
    pub async fn resolve(&self) -> async_graphql::Result<Value> {
        self.chain.resolve().await
    }

    /// Suppress parts of the field's result.
    ///
    /// If the result is a list, entries rejected by `predicate` are removed. Otherwise the result
    /// is replaced by null if `predicate` rejects it. The filter applies to the current result, if
    /// the chain has already been resolved, and to every later result.
    pub fn filter(&self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) {
        self.chain.filter(Arc::new(predicate));
    }
}

type Filter = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// The remainder of a resolver chain, as seen from one directive.
pub(crate) struct Chain {
    next: Resolver,
    params: ResolverParams,
    state: Mutex<ChainState>,
}

#[derive(Default)]
struct ChainState {
    called: bool,
    result: Option<Value>,
    filters: Vec<Filter>,
}

impl Chain {
    pub(crate) fn new(next: Resolver, params: ResolverParams) -> Self {
        Self {
            next,
            params,
            state: Default::default(),
        }
    }

    pub(crate) async fn resolve(&self) -> async_graphql::Result<Value> {
        self.state.lock().called = true;
        let value = self.next.call(self.params.clone()).await?;

        let mut state = self.state.lock();
        let value = state
            .filters
            .iter()
            .fold(value, |value, filter| apply_filter(value, filter));
        state.result = Some(value.clone());
        Ok(value)
    }

    fn filter(&self, filter: Filter) {
        let mut state = self.state.lock();
        if let Some(result) = state.result.take() {
            state.result = Some(apply_filter(result, &filter));
        }
        state.filters.push(filter);
    }

    pub(crate) fn has_resolved(&self) -> bool {
        self.state.lock().called
    }

    pub(crate) fn result(&self) -> Value {
        self.state.lock().result.clone().unwrap_or_default()
    }
}

fn apply_filter(value: Value, filter: &Filter) -> Value {
    match value {
        Value::List(items) => Value::List(items.into_iter().filter(|item| filter(item)).collect()),
        value if filter(&value) => value,
        _ => Value::Null,
    }
}

/// The inferred definitions of every directive used in a schema.
///
/// Argument types are inferred from the literal values passed in each invocation. An argument is
/// non-null only if every invocation passed a non-null value for it.
#[derive(Clone, Debug, Default)]
pub struct DirectiveDefs {
    defs: IndexMap<String, DirectiveDef>,
}

#[derive(Clone, Debug, Default)]
struct DirectiveDef {
    usages: usize,
    args: IndexMap<String, ArgDef>,
}

#[derive(Clone, Debug, Default)]
struct ArgDef {
    types: IndexSet<String>,
    usages: usize,
    nullable: bool,
}

impl DirectiveDefs {
    /// Record a usage of `directive` and return its printed invocation.
    pub fn register(&mut self, directive: &Directive) -> String {
        let def = self.defs.entry(directive.name.clone()).or_default();
        def.usages += 1;
        for (name, value) in &directive.args {
            let arg = def.args.entry(name.clone()).or_default();
            arg.usages += 1;
            match type_of_value(value) {
                Some(ty) => {
                    arg.types.insert(ty);
                }
                None => arg.nullable = true,
            }
        }
        directive.invocation()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Print every directive definition, separated by blank lines.
    pub fn print(&self) -> String {
        self.defs
            .iter()
            .map(|(name, def)| {
                let args = def
                    .args
                    .iter()
                    .filter(|(_, arg)| !arg.types.is_empty())
                    .map(|(arg_name, arg)| {
                        let non_null = if arg.nullable || arg.usages < def.usages {
                            ""
                        } else {
                            "!"
                        };
                        format!("  {arg_name}: {}{non_null}", arg.types.iter().join(" | "))
                    })
                    .collect::<Vec<_>>();
                if args.is_empty() {
                    format!("directive @{name} on OBJECT | FIELD_DEFINITION")
                } else {
                    format!(
                        "directive @{name}(\n{}\n) on OBJECT | FIELD_DEFINITION",
                        args.join("\n")
                    )
                }
            })
            .join("\n\n")
    }
}
