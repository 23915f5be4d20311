//! Persisting expensive sub-queries.
//!
//! A query marked with [`Query::persist`] is, during
//! [`Query::build_cached`], rendered on its own, hashed into a [`CacheKey`],
//! and handed to its [`Cacher`]. The cacher stores the result somewhere (a temp
//! table, a file, ...) and returns a cheap retrieval query that replaces the
//! marked node in the tree. A [`PersistCache`] makes sure each key is saved once,
//! even when many builds race on it.

mod table;
mod temp_table;


pub use table::PersistCache;
pub use temp_table::TempTableCacher;

use crate::error::CteResult;
use crate::query::{Query, rewrite_async};
use crate::render::{BuildPlan, RenderedStatement};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Saves the result of a rendered query and returns a query that reads it back.
///
/// Implementations should use `key` deterministically in the name of whatever
/// they store, so a restarted process can find earlier results.
#[async_trait]
pub trait Cacher: Send + Sync {
    async fn persist(
        &self,
        statement: &RenderedStatement,
        key: &CacheKey,
        tag: Option<&str>,
    ) -> CteResult<Query>;
}

/// The persist mark attached to a query.
#[derive(Clone)]
pub struct Persist {
    cacher: Arc<dyn Cacher>,
    tag: Option<Arc<str>>,
}

impl Persist {
    pub fn new(cacher: Arc<dyn Cacher>, tag: Option<&str>) -> Self {
        Self {
            cacher,
            tag: tag.map(Arc::from),
        }
    }

    pub fn cacher(&self) -> &Arc<dyn Cacher> {
        &self.cacher
    }

    /// Human-readable tag, for cachers that name what they store.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl fmt::Debug for Persist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persist")
            .field("cacher", &"<dyn Cacher>")
            .field("tag", &self.tag)
            .finish()
    }
}

/// Content key of a rendered statement: hex SHA-256 over its SQL, tag and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(statement: &RenderedStatement, tag: Option<&str>) -> CteResult<Self> {
        let bytes = serde_json::to_vec(&(statement.sql(), tag, statement.parameters()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first 32 hex digits, short enough for database object names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(32)]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replace every persist-marked node of `root` with its retrieval query.
pub(crate) async fn persist_marked(
    root: &Query,
    cache: &PersistCache,
    plan: &BuildPlan,
) -> CteResult<Query> {
    rewrite_async(root, move |node| async move {
        let Some(mark) = node.persist_mark().cloned() else {
            return Ok(node);
        };
        let statement = plan.render(&node)?;
        let key = CacheKey::compute(&statement, mark.tag())?;
        tracing::debug!(
            target: "ctesql.persist",
            key = %key.short(),
            tag = mark.tag().unwrap_or("-"),
            dialect = %plan.dialect(),
            sql = %plan.log_sql(statement.sql()),
            "resolving persisted query",
        );
        cache.resolve(&key, &statement, &mark).await
    })
    .await
}
