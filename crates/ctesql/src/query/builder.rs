use super::{Extensions, Inherit, Query, QueryPart};
use crate::dialect::Dialect;
use crate::error::{CteError, CteResult};
use crate::params::ParameterPlaceholder;
use crate::render::Overrides;

/// Start building a query from an initial SQL fragment.
pub fn q(initial_sql: impl Into<String>) -> QueryBuilder {
    QueryBuilder::new(initial_sql)
}

/// Assembles the parts of a [`Query`].
///
/// This is the programmatic stand-in for a template front-end: literal SQL,
/// sub-queries and parameters are appended in order, then [`finish`](Self::finish)
/// resolves defaults and produces the immutable node.
#[must_use]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    parts: Vec<QueryPart>,
    dialect: Option<Dialect>,
    overrides: Option<Option<Overrides>>,
}

impl QueryBuilder {
    /// Create a new builder with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        let initial_sql = initial_sql.into();
        let parts = if initial_sql.is_empty() {
            Vec::new()
        } else {
            vec![QueryPart::Sql(initial_sql)]
        };
        Self {
            parts,
            dialect: None,
            overrides: None,
        }
    }

    /// Create an empty builder.
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Append literal SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(QueryPart::Sql(last)) => last.push_str(sql),
            _ => self.parts.push(QueryPart::Sql(sql.to_string())),
        }
        self
    }

    /// Embed a sub-query. It renders as a reference to its CTE.
    pub fn push_query(&mut self, query: &Query) -> &mut Self {
        self.parts.push(QueryPart::Query(query.clone()));
        self
    }

    /// Embed a parameter placeholder.
    pub fn push_param(&mut self, param: &ParameterPlaceholder) -> &mut Self {
        self.parts.push(QueryPart::Param(param.clone()));
        self
    }

    /// Append any part.
    pub fn push_part(&mut self, part: impl Into<QueryPart>) -> &mut Self {
        match part.into() {
            QueryPart::Sql(sql) => self.push(&sql),
            other => {
                self.parts.push(other);
                self
            }
        }
    }

    /// Set the default dialect explicitly instead of inferring it.
    pub fn dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.dialect = Some(dialect);
        self
    }

    /// Set the default overrides explicitly (`None` means "no overrides").
    pub fn overrides(&mut self, overrides: Option<Overrides>) -> &mut Self {
        self.overrides = Some(overrides);
        self
    }

    /// Produce the query.
    ///
    /// Settings not given explicitly are inferred from the direct sub-queries that
    /// have an explicit setting. Two different explicit settings among the
    /// children are ambiguous and rejected.
    pub fn finish(&self) -> CteResult<Query> {
        let dialect = match self.dialect {
            Some(dialect) => Inherit::Explicit(dialect),
            None => match self.infer(|child| child.dialect_setting().explicit().copied())? {
                Some(dialect) => Inherit::Explicit(dialect),
                None => Inherit::InferOr(Dialect::DEFAULT),
            },
        };

        let overrides = match &self.overrides {
            Some(overrides) => Inherit::Explicit(overrides.clone()),
            None => match self.infer(|child| child.overrides_setting().explicit().cloned())? {
                Some(overrides) => Inherit::Explicit(overrides),
                None => Inherit::InferOr(None),
            },
        };

        Ok(Query::from_node(
            self.parts.clone(),
            dialect,
            overrides,
            Extensions::default(),
        ))
    }

    fn infer<T, F>(&self, setting: F) -> CteResult<Option<T>>
    where
        T: PartialEq + std::fmt::Debug,
        F: Fn(&Query) -> Option<T>,
    {
        let mut found: Vec<T> = Vec::new();
        for part in &self.parts {
            let QueryPart::Query(child) = part else {
                continue;
            };
            if let Some(value) = setting(child) {
                if !found.contains(&value) {
                    found.push(value);
                }
            }
        }

        if found.len() > 1 {
            let listed = found
                .iter()
                .map(|v| format!("{v:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CteError::config(format!(
                "found multiple defaults when inferring from sub-queries: {listed}; set one explicitly"
            )));
        }
        Ok(found.pop())
    }
}
