//! Immutable query trees.
//!
//! A [`Query`] is an ordered list of [`QueryPart`]s: literal SQL, embedded
//! sub-queries, and parameter placeholders. Queries are cheap to clone (they are
//! reference counted) and never change after construction; any "change" produces
//! a new node with a new [`QueryId`], while unchanged sub-trees are shared.
//!
//! Identity, not structural equality, is the unit of deduplication: two queries
//! built separately from the same text are two distinct nodes and render as two
//! CTEs, while one node referenced twice renders once.
//!
//! # Example
//! ```ignore
//! use ctesql::q;
//!
//! let q1 = q("select 1").finish()?;
//! let q2 = q("select 2 join ").push_query(&q1).finish()?;
//!
//! let rendered = q2.build()?;
//! assert_eq!(rendered.sql(), "with\n_subQuery0 as (\n\tselect 1\n)\nselect 2 join _subQuery0");
//! ```

mod builder;
mod deps;
mod rewrite;


pub use builder::{QueryBuilder, q};
pub use deps::dependencies;
pub use rewrite::{rewrite, rewrite_async, rewrite_parts, run_pre_build_hooks, substitute_params};

use crate::dialect::{Dialect, LimitStyle};
use crate::error::CteResult;
use crate::params::ParameterPlaceholder;
use crate::persist::{Cacher, Persist};
use crate::render::Overrides;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_QUERY: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a query node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(u64);

impl QueryId {
    fn next() -> Self {
        QueryId(NEXT_QUERY.fetch_add(1, Ordering::Relaxed))
    }
}

/// One piece of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPart {
    /// Literal SQL text, passed through untouched.
    Sql(String),
    /// A sub-query, rendered as a reference to its CTE.
    Query(Query),
    /// A bound parameter.
    Param(ParameterPlaceholder),
}

impl From<&str> for QueryPart {
    fn from(sql: &str) -> Self {
        QueryPart::Sql(sql.to_string())
    }
}

impl From<String> for QueryPart {
    fn from(sql: String) -> Self {
        QueryPart::Sql(sql)
    }
}

impl From<&Query> for QueryPart {
    fn from(query: &Query) -> Self {
        QueryPart::Query(query.clone())
    }
}

impl From<&ParameterPlaceholder> for QueryPart {
    fn from(param: &ParameterPlaceholder) -> Self {
        QueryPart::Param(param.clone())
    }
}

/// A default that is either set explicitly or inferred from sub-queries.
///
/// `InferOr(value)` means "no explicit setting": parents may still infer one from
/// other children, and `value` is used if nothing is inferred.
#[derive(Debug, Clone, PartialEq)]
pub enum Inherit<T> {
    Explicit(T),
    InferOr(T),
}

impl<T> Inherit<T> {
    pub fn value(&self) -> &T {
        match self {
            Inherit::Explicit(v) | Inherit::InferOr(v) => v,
        }
    }

    pub fn explicit(&self) -> Option<&T> {
        match self {
            Inherit::Explicit(v) => Some(v),
            Inherit::InferOr(_) => None,
        }
    }
}

/// A hook run just before rendering. Returning `Some(query)` replaces the node.
pub type PreBuildHook = Arc<dyn Fn() -> CteResult<Option<Query>> + Send + Sync>;

/// Side data attached to a query node.
#[derive(Clone)]
pub enum Extension {
    /// Persist this node's result through a cacher when building with a cache.
    Persistable(Persist),
    /// Run a hook before rendering.
    PreBuild(PreBuildHook),
}

/// At most one extension of each kind.
#[derive(Clone, Default)]
pub(crate) struct Extensions {
    persist: Option<Persist>,
    pre_build: Option<PreBuildHook>,
}

impl Extensions {
    fn with(&self, extension: Extension) -> Self {
        let mut next = self.clone();
        match extension {
            Extension::Persistable(persist) => next.persist = Some(persist),
            Extension::PreBuild(hook) => next.pre_build = Some(hook),
        }
        next
    }
}

struct QueryNode {
    id: QueryId,
    parts: Vec<QueryPart>,
    dialect: Inherit<Dialect>,
    overrides: Inherit<Option<Overrides>>,
    extensions: Extensions,
}

/// An immutable, reference-counted query node.
#[derive(Clone)]
pub struct Query {
    node: Arc<QueryNode>,
}

impl Query {
    pub(crate) fn from_node(
        parts: Vec<QueryPart>,
        dialect: Inherit<Dialect>,
        overrides: Inherit<Option<Overrides>>,
        extensions: Extensions,
    ) -> Self {
        Self {
            node: Arc::new(QueryNode {
                id: QueryId::next(),
                parts,
                dialect,
                overrides,
                extensions,
            }),
        }
    }

    /// A leaf query made of literal SQL only, with inferable defaults.
    pub fn from_sql(sql: impl Into<String>) -> Self {
        Self::from_node(
            vec![QueryPart::Sql(sql.into())],
            Inherit::InferOr(Dialect::DEFAULT),
            Inherit::InferOr(None),
            Extensions::default(),
        )
    }

    pub fn id(&self) -> QueryId {
        self.node.id
    }

    pub fn parts(&self) -> &[QueryPart] {
        &self.node.parts
    }

    /// Whether both handles point at the same node.
    pub fn same_node(&self, other: &Query) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// The dialect used when a build does not specify one.
    pub fn default_dialect(&self) -> Dialect {
        *self.node.dialect.value()
    }

    pub fn dialect_setting(&self) -> &Inherit<Dialect> {
        &self.node.dialect
    }

    /// The overrides used when a build does not specify any.
    pub fn default_overrides(&self) -> Option<&Overrides> {
        self.node.overrides.value().as_ref()
    }

    pub fn overrides_setting(&self) -> &Inherit<Option<Overrides>> {
        &self.node.overrides
    }

    pub fn persist_mark(&self) -> Option<&Persist> {
        self.node.extensions.persist.as_ref()
    }

    pub fn pre_build_hook(&self) -> Option<&PreBuildHook> {
        self.node.extensions.pre_build.as_ref()
    }

    /// Sub-queries in dependency-first order, excluding `self`.
    pub fn dependencies(&self) -> Vec<Query> {
        dependencies(self)
    }

    /// Copy this node with different parts. Settings and extensions are kept.
    pub fn with_parts(&self, parts: Vec<QueryPart>) -> Query {
        Self::from_node(
            parts,
            self.node.dialect.clone(),
            self.node.overrides.clone(),
            self.node.extensions.clone(),
        )
    }

    /// Copy this node with an extension attached (replacing one of the same kind).
    pub fn with_extension(&self, extension: Extension) -> Query {
        Self::from_node(
            self.node.parts.clone(),
            self.node.dialect.clone(),
            self.node.overrides.clone(),
            self.node.extensions.with(extension),
        )
    }

    /// Mark this query for persistence with `cacher`.
    ///
    /// The mark only takes effect when building with a
    /// [`PersistCache`](crate::PersistCache); see [`Query::build_cached`].
    pub fn persist(&self, cacher: Arc<dyn Cacher>, tag: Option<&str>) -> Query {
        self.with_extension(Extension::Persistable(Persist::new(cacher, tag)))
    }

    /// Attach a hook that runs before rendering and may replace this node.
    pub fn with_pre_build<F>(&self, hook: F) -> Query
    where
        F: Fn() -> CteResult<Option<Query>> + Send + Sync + 'static,
    {
        self.with_extension(Extension::PreBuild(Arc::new(hook)))
    }

    /// Wrap this query so it returns at most `rows` rows.
    ///
    /// Uses `dialect`'s limit style, or this query's default dialect.
    pub fn preview(&self, rows: u64, dialect: Option<Dialect>) -> CteResult<Query> {
        let dialect = dialect.unwrap_or_else(|| self.default_dialect());
        let mut builder = match dialect.limit {
            LimitStyle::Limit => {
                let mut b = q("select * from ");
                b.push_query(self).push(&format!(" limit {rows}"));
                b
            }
            LimitStyle::TopN => {
                let mut b = q(format!("select top({rows}) * from "));
                b.push_query(self);
                b
            }
            LimitStyle::FetchFirst => {
                let mut b = q("select * from ");
                b.push_query(self)
                    .push(&format!(" fetch first {rows} rows only"));
                b
            }
        };
        builder.dialect(dialect).finish()
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.node.id)
            .field("parts", &self.node.parts)
            .field("dialect", &self.node.dialect)
            .field("persist", &self.node.extensions.persist)
            .field("pre_build", &self.node.extensions.pre_build.is_some())
            .finish()
    }
}
