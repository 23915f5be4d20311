use super::param::ParamList;
use crate::client::GenericClient;
use crate::error::{CteError, CteResult};
use crate::value::Value;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// The output of a build: SQL text plus the values to bind against it.
///
/// `parameters()[i]` binds the i-th slot of `sql()` in the dialect's placeholder
/// style. `parameter_names()` is parallel to it and holds the name a slot was
/// bound under (`None` for auto-keyed parameters and collection elements).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStatement {
    sql: String,
    params: ParamList,
}

impl RenderedStatement {
    pub fn new(sql: impl Into<String>, params: ParamList) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[Value] {
        self.params.values()
    }

    pub fn parameter_names(&self) -> &[Option<String>] {
        self.params.names()
    }

    pub fn param_list(&self) -> &ParamList {
        &self.params
    }

    /// Parameters as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.as_refs()
    }

    pub fn into_parts(self) -> (String, Vec<Value>, Vec<Option<String>>) {
        let (values, names) = self.params.into_parts();
        (self.sql, values, names)
    }

    /// Rebind every slot bound under `name` to `value`, keeping the SQL as is.
    ///
    /// Only scalar slots carry names, so `value` must be a scalar.
    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> CteResult<Self> {
        let value = value.into();
        if value.is_list() {
            return Err(CteError::InvalidParam {
                key: name.to_string(),
                message: format!(
                    "cannot rebind a rendered slot to collection {value}; rebuild the query instead"
                ),
            });
        }

        let slots: Vec<usize> = self
            .params
            .names()
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_deref() == Some(name))
            .map(|(i, _)| i)
            .collect();
        if slots.is_empty() {
            return Err(CteError::not_found(name));
        }

        let values = self.params.values_mut();
        for i in slots {
            values[i] = value.clone();
        }
        Ok(self)
    }

    /// Execute the statement and return the number of affected rows.
    pub async fn execute(&self, conn: &impl GenericClient) -> CteResult<u64> {
        conn.execute(&self.sql, &self.params_ref()).await
    }

    /// Execute the statement and return all rows.
    pub async fn fetch_all(&self, conn: &impl GenericClient) -> CteResult<Vec<Row>> {
        conn.query(&self.sql, &self.params_ref()).await
    }
}
