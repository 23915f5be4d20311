use super::{CacheKey, Cacher};
use crate::client::GenericClient;
use crate::error::CteResult;
use crate::query::Query;
use crate::render::RenderedStatement;
use async_trait::async_trait;

const TAG_MAX: usize = 20;

/// Persists results into session temp tables.
///
/// Saving runs `create temporary table if not exists "<name>" as <sql>` and the
/// retrieval query is `select * from "<name>"`. The name is built from the tag
/// and the key, so a repeated save within the same session is a no-op on the
/// database side too.
///
/// Postgres does not accept bind parameters in `create table ... as`, so with
/// Postgres only parameterless queries can be persisted this way.
#[derive(Debug, Clone)]
pub struct TempTableCacher<C> {
    client: C,
    prefix: String,
}

impl<C: GenericClient> TempTableCacher<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            prefix: "ctesql".to_string(),
        }
    }

    /// Replace the `ctesql` prefix of table names.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// The quoted table name used for `key`.
    pub fn table_name(&self, key: &CacheKey, tag: Option<&str>) -> String {
        let tag = tag.map(sanitize_tag).filter(|t| !t.is_empty());
        match tag {
            Some(tag) => format!("\"{}_{}_{}\"", self.prefix, tag, key.short()),
            None => format!("\"{}_{}\"", self.prefix, key.short()),
        }
    }
}

fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(TAG_MAX)
        .collect()
}

#[async_trait]
impl<C: GenericClient> Cacher for TempTableCacher<C> {
    async fn persist(
        &self,
        statement: &RenderedStatement,
        key: &CacheKey,
        tag: Option<&str>,
    ) -> CteResult<Query> {
        let table = self.table_name(key, tag);
        let create = format!(
            "create temporary table if not exists {table} as\n{}",
            statement.sql()
        );
        self.client.execute(&create, &statement.params_ref()).await?;
        Ok(Query::from_sql(format!("select * from {table}")))
    }
}
