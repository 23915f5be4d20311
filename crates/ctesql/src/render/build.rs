//! The build pipeline: reparameterize, run hooks, render.

use super::cte::CteRenderer;
use super::param::{ParamRenderer, PlaceholderStyle};
use super::statement::RenderedStatement;
use super::{Overrides, QueryRenderer};
use crate::dialect::Dialect;
use crate::error::CteResult;
use crate::params::Parameters;
use crate::persist::{PersistCache, persist_marked};
use crate::query::{Query, run_pre_build_hooks, substitute_params};
use crate::value::Value;
use std::sync::Arc;

/// Per-build settings.
///
/// Anything left unset falls back to the query's own defaults.
#[must_use]
#[derive(Debug, Clone)]
pub struct BuildOptions {
    dialect: Option<Dialect>,
    overrides: Option<Overrides>,
    new_params: Vec<(String, Value)>,
    /// Maximum SQL length written to logs (default: 200 bytes).
    log_sql_max: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dialect: None,
            overrides: None,
            new_params: Vec::new(),
            log_sql_max: Some(200),
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render for this dialect instead of the query's default.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Use these overrides instead of the query's defaults.
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Replace the value of the named parameter everywhere in the tree.
    ///
    /// Matching is by name alone: placeholders named `name` from different
    /// [`Parameters`] sets all take the new value, and so share one slot once
    /// rendered with a numbered style.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.new_params.push((name.into(), value.into()));
        self
    }

    /// Replace several named parameters.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.new_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set maximum SQL length written to logs.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.log_sql_max = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.log_sql_max = None;
        self
    }

    fn new_parameters(&self) -> CteResult<Parameters> {
        Parameters::from_pairs(self.new_params.iter().cloned())
    }
}

/// Renderers and settings resolved for one build.
#[derive(Debug, Clone)]
pub(crate) struct BuildPlan {
    dialect: Dialect,
    style: Arc<dyn PlaceholderStyle>,
    renderer: Arc<dyn QueryRenderer>,
    log_sql_max: Option<usize>,
}

impl BuildPlan {
    pub(crate) fn resolve(query: &Query, options: &BuildOptions) -> CteResult<Self> {
        let dialect = options
            .dialect
            .unwrap_or_else(|| query.default_dialect());
        let overrides = options
            .overrides
            .clone()
            .or_else(|| query.default_overrides().cloned())
            .unwrap_or_default();

        let style = overrides
            .param_style
            .unwrap_or_else(|| dialect.paramstyle.placeholder_style());
        let renderer = overrides
            .query_renderer
            .unwrap_or_else(|| Arc::new(CteRenderer) as Arc<dyn QueryRenderer>);

        Ok(Self {
            dialect,
            style,
            renderer,
            log_sql_max: options.log_sql_max,
        })
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render with a fresh parameter renderer.
    pub(crate) fn render(&self, query: &Query) -> CteResult<RenderedStatement> {
        let mut params = ParamRenderer::new(self.style.clone());
        let sql = self.renderer.render(query, &mut params)?;
        Ok(RenderedStatement::new(sql, params.finish()))
    }

    pub(crate) fn log_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.log_sql_max {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }

    fn log_built(&self, root: &Query, statement: &RenderedStatement) {
        tracing::debug!(
            target: "ctesql.build",
            query = ?root.id(),
            dialect = %self.dialect,
            param_count = statement.parameters().len(),
            sql = %self.log_sql(statement.sql()),
            "built query",
        );
    }
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 character.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

impl Query {
    /// Render with the query's own defaults.
    ///
    /// Persist marks are ignored here (the query is rendered inline); use
    /// [`build_cached`](Self::build_cached) to run them.
    pub fn build(&self) -> CteResult<RenderedStatement> {
        self.build_with(&BuildOptions::default())
    }

    /// Render with per-build settings.
    pub fn build_with(&self, options: &BuildOptions) -> CteResult<RenderedStatement> {
        let plan = BuildPlan::resolve(self, options)?;
        let query = substitute_params(self, &options.new_parameters()?)?;
        let marked = query.persist_mark().is_some()
            || query
                .dependencies()
                .iter()
                .any(|dep| dep.persist_mark().is_some());
        if marked {
            tracing::trace!(
                target: "ctesql.build",
                query = ?self.id(),
                "building without a cache, persist marks are rendered inline",
            );
        }
        let query = run_pre_build_hooks(&query)?;
        let statement = plan.render(&query)?;
        plan.log_built(self, &statement);
        Ok(statement)
    }

    /// Render, first replacing every persist-marked node through `cache`.
    ///
    /// Each marked node's save runs at most once per content key across all
    /// concurrent builds sharing `cache`.
    pub async fn build_cached(
        &self,
        cache: &PersistCache,
        options: &BuildOptions,
    ) -> CteResult<RenderedStatement> {
        let plan = BuildPlan::resolve(self, options)?;
        let query = substitute_params(self, &options.new_parameters()?)?;
        let query = persist_marked(&query, cache, &plan).await?;
        let query = run_pre_build_hooks(&query)?;
        let statement = plan.render(&query)?;
        plan.log_built(self, &statement);
        Ok(statement)
    }
}
