//! Binds a single database handle: Exec/Query/QueryRow routed through the
//! statement cache, plus transaction entry points.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::builder::{Builder, Value};
use crate::error::Result;
use crate::row::row_to_map;
use crate::stmt_cache::StmtCache;
use crate::tx::Tx;

fn bind_args<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    args: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for v in args {
        q = match v {
            Value::Null => q.bind(None::<i64>),
            Value::Bool(b) => q.bind(*b),
            Value::Int(i) => q.bind(*i),
            Value::Float(f) => q.bind(*f),
            Value::Text(s) => q.bind(s.as_str()),
            Value::Bytes(b) => q.bind(b.as_slice()),
        };
    }
    q
}

/// Bound to one SQLite pool, indexed into the owning [`crate::db::Db`]
/// facade's client vector.
pub struct Client {
    /// Position of this client in the facade's ordered client vector.
    pub index: usize,
    pool: SqlitePool,
    stmt_cache: Arc<StmtCache>,
}

impl Client {
    /// Wraps `pool` as client `index`, starting its idle-statement reaper
    /// with the default 3-minute idle timeout.
    pub fn new(index: usize, pool: SqlitePool) -> Client {
        Self::with_idle(index, pool, crate::stmt_cache::DEFAULT_MAX_IDLE)
    }

    /// Like [`Client::new`] with an explicit idle-reap period.
    pub fn with_idle(index: usize, pool: SqlitePool, max_idle: Duration) -> Client {
        let stmt_cache = StmtCache::new(max_idle);
        stmt_cache.clone().spawn_reaper();
        Client {
            index,
            pool,
            stmt_cache,
        }
    }

    /// The underlying pool, for callers that need direct driver access
    /// (e.g. the DTC opening its own transactions).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs `sql` with `args`, returning every row as a dynamic column map.
    /// If `args` is empty the statement is sent directly; otherwise a
    /// statement-cache guard is held for the duration of the scan.
    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<HashMap<String, Json>>> {
        self.query_context(CancellationToken::new(), sql, args).await
    }

    /// Like [`Client::query`], cancelling the in-flight fetch if `token` is
    /// cancelled first.
    pub async fn query_context(
        &self,
        token: CancellationToken,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<HashMap<String, Json>>> {
        let _guard = (!args.is_empty()).then(|| self.stmt_cache.acquire(sql));
        let fetch = async {
            let q = bind_args(sqlx::query(sql), args);
            let rows = q.fetch_all(&self.pool).await?;
            rows.iter().map(row_to_map).collect::<Result<Vec<_>>>()
        };
        tokio::select! {
            r = fetch => r,
            _ = token.cancelled() => Err(crate::error::Error::Cancelled),
        }
    }

    /// Builds `b`, then runs [`Client::query`] against the rendered SQL.
    pub async fn query_builder(&self, b: &Builder) -> Result<Vec<HashMap<String, Json>>> {
        let (sql, args) = b.build()?;
        self.query(&sql, &args).await
    }

    /// Like [`Client::query`] but returns only the first row.
    pub async fn query_row(&self, sql: &str, args: &[Value]) -> Result<Option<HashMap<String, Json>>> {
        self.query_row_context(CancellationToken::new(), sql, args).await
    }

    /// Like [`Client::query_row`], cancellable via `token`.
    pub async fn query_row_context(
        &self,
        token: CancellationToken,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<HashMap<String, Json>>> {
        let _guard = (!args.is_empty()).then(|| self.stmt_cache.acquire(sql));
        let fetch = async {
            let q = bind_args(sqlx::query(sql), args);
            match q.fetch_optional(&self.pool).await? {
                Some(row) => Ok(Some(row_to_map(&row)?)),
                None => Ok(None),
            }
        };
        tokio::select! {
            r = fetch => r,
            _ = token.cancelled() => Err(crate::error::Error::Cancelled),
        }
    }

    /// Builds `b`, then runs [`Client::query_row`] against the rendered
    /// SQL.
    pub async fn query_row_builder(&self, b: &Builder) -> Result<Option<HashMap<String, Json>>> {
        let (sql, args) = b.build()?;
        self.query_row(&sql, &args).await
    }

    /// Executes `sql` with `args`, returning the number of affected rows.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<u64> {
        self.exec_context(CancellationToken::new(), sql, args).await
    }

    /// Like [`Client::exec`], cancellable via `token`.
    pub async fn exec_context(
        &self,
        token: CancellationToken,
        sql: &str,
        args: &[Value],
    ) -> Result<u64> {
        let _guard = (!args.is_empty()).then(|| self.stmt_cache.acquire(sql));
        let run = async {
            let q = bind_args(sqlx::query(sql), args);
            Ok(q.execute(&self.pool).await?.rows_affected())
        };
        tokio::select! {
            r = run => r,
            _ = token.cancelled() => Err(crate::error::Error::Cancelled),
        }
    }

    /// Builds `b`, then runs [`Client::exec`] against the rendered SQL.
    pub async fn exec_builder(&self, b: &Builder) -> Result<u64> {
        let (sql, args) = b.build()?;
        self.exec(&sql, &args).await
    }

    /// Begins a transaction bound to this client. The returned [`Tx`] owns
    /// a checked-out pool connection, so it outlives this borrow.
    pub async fn begin(&self) -> Result<Tx<'static>> {
        let inner = self.pool.begin().await?;
        Ok(Tx::new(inner))
    }

    /// Runs `f` inside a transaction: begins, calls `f`, rolls back on
    /// error (logging a rollback failure rather than masking the original
    /// one) and commits on success.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tx<'static>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tx = self.begin().await?;
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after transaction error");
                }
                Err(err)
            }
        }
    }
}
