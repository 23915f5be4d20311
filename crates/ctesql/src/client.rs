//! Generic client trait for executing rendered statements.
//!
//! ctesql never opens connections. Anything implementing [`GenericClient`] can
//! run a [`RenderedStatement`](crate::RenderedStatement) or back a
//! [`TempTableCacher`](crate::TempTableCacher).

use crate::error::{CteError, CteResult};
use std::sync::Arc;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A trait that unifies database clients and transactions.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = CteResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = CteResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(CteError::from)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(CteError::from)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(CteError::from)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(CteError::from)
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<u64> {
        GenericClient::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<Vec<Row>> {
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<u64> {
        GenericClient::execute(&**self, sql, params).await
    }
}

// ===== Reference implementations =====

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<Vec<Row>> {
        (*self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<u64> {
        (*self).execute(sql, params).await
    }
}

impl<C: GenericClient> GenericClient for Arc<C> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<Vec<Row>> {
        (**self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CteResult<u64> {
        (**self).execute(sql, params).await
    }
}
