//! Map/Reduce query engine: fans a builder across rotated-table suffixes ×
//! clients and reduces with First / Count / Query / QueryLimit semantics.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::builder::{Builder, Value};
use crate::client::Client;
use crate::error::{Error, Result};

/// Row produced by one shard's query, as a dynamic column map.
pub type Row = HashMap<String, Json>;

const ROTATE_PLACEHOLDER: &str = "<rotate>";

/// Fans a single logical query out over this engine's rotated-table
/// suffixes (defaulting to `[""]`, i.e. no rotation) and client list.
pub struct MapReduce {
    rotated_tables: Vec<String>,
    clients: Vec<Arc<Client>>,
}

impl MapReduce {
    /// An engine over `clients` with no table rotation.
    pub fn new(clients: Vec<Arc<Client>>) -> MapReduce {
        MapReduce {
            rotated_tables: vec![String::new()],
            clients,
        }
    }

    /// Overrides the rotated-table suffix list (e.g. from
    /// [`crate::shardid::Id::rotated_suffix`] across a date range).
    pub fn with_rotated_tables(mut self, tables: Vec<String>) -> Self {
        self.rotated_tables = tables;
        self
    }

    fn render(&self, b: &Builder) -> Result<(String, Vec<Value>)> {
        let mut b = b.clone();
        b.input("rotate", ROTATE_PLACEHOLDER);
        b.build()
    }

    /// Waits for the first task that returns a matching row, cancelling the
    /// rest cooperatively. If every shard errors before any match is found,
    /// returns the last error observed (the spec leaves this case
    /// undefined; this is the documented choice).
    pub async fn first(&self, b: &Builder) -> Result<Option<Row>> {
        let (sql, args) = self.render(b)?;
        let token = CancellationToken::new();
        let mut set = JoinSet::new();

        for r in &self.rotated_tables {
            let qr = sql.replace(ROTATE_PLACEHOLDER, r);
            for client in &self.clients {
                let client = client.clone();
                let args = args.clone();
                let qr = qr.clone();
                let token = token.clone();
                set.spawn(async move { client.query_row_context(token, &qr, &args).await });
            }
        }

        let mut last_err: Option<Error> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(Some(row))) => {
                    token.cancel();
                    set.abort_all();
                    return Ok(Some(row));
                }
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => last_err = Some(e),
                Err(_join_err) => continue,
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    /// Waits for every shard, summing the scalar integer result of each.
    /// Any shard failure fails the whole call.
    pub async fn count(&self, b: &Builder) -> Result<i64> {
        let (sql, args) = self.render(b)?;
        let mut set = JoinSet::new();

        for r in &self.rotated_tables {
            let qr = sql.replace(ROTATE_PLACEHOLDER, r);
            for client in &self.clients {
                let client = client.clone();
                let args = args.clone();
                let qr = qr.clone();
                set.spawn(async move {
                    client
                        .query_row_context(CancellationToken::new(), &qr, &args)
                        .await
                });
            }
        }

        let mut total = 0i64;
        while let Some(joined) = set.join_next().await {
            let row = joined.map_err(|e| Error::Join(e.to_string()))??;
            if let Some(row) = row {
                if let Some(v) = row.values().next() {
                    total += v.as_i64().unwrap_or(0);
                }
            }
        }
        Ok(total)
    }

    /// Waits for every shard, concatenates the row sequences, and sorts
    /// with `less` if provided. Without `less` the merged order is
    /// unspecified.
    pub async fn query(
        &self,
        b: &Builder,
        less: Option<&(dyn Fn(&Row, &Row) -> std::cmp::Ordering + Sync)>,
    ) -> Result<Vec<Row>> {
        let (sql, args) = self.render(b)?;
        let mut set = JoinSet::new();

        for r in &self.rotated_tables {
            let qr = sql.replace(ROTATE_PLACEHOLDER, r);
            for client in &self.clients {
                let client = client.clone();
                let args = args.clone();
                let qr = qr.clone();
                set.spawn(async move {
                    client
                        .query_context(CancellationToken::new(), &qr, &args)
                        .await
                });
            }
        }

        let mut list = Vec::new();
        while let Some(joined) = set.join_next().await {
            let rows = joined.map_err(|e| Error::Join(e.to_string()))??;
            list.extend(rows);
        }

        if let Some(less) = less {
            list.sort_by(|a, b| less(a, b));
        }

        Ok(list)
    }

    /// Like [`MapReduce::query`], first appending ` LIMIT (n × client
    /// count)` to the rendered SQL so each shard caps its own return, then
    /// truncating the merged list to `n`.
    pub async fn query_limit(
        &self,
        b: &Builder,
        less: Option<&(dyn Fn(&Row, &Row) -> std::cmp::Ordering + Sync)>,
        n: usize,
    ) -> Result<Vec<Row>> {
        let mut b = b.clone();
        if n > 0 {
            b.sql(&format!(" LIMIT {}", n * self.clients.len().max(1)));
        }
        let mut list = self.query(&b, less).await?;
        if n < list.len() {
            list.truncate(n);
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_client(index: usize, rows: &[(i64, &str)]) -> Arc<Client> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        for (id, name) in rows {
            sqlx::query("INSERT INTO users (id, name) VALUES (?, ?)")
                .bind(id)
                .bind(name)
                .execute(&pool)
                .await
                .unwrap();
        }
        Arc::new(Client::new(index, pool))
    }

    #[tokio::test]
    async fn first_finds_the_match_across_ten_shards() {
        let mut clients = Vec::new();
        for decade in 0..10 {
            let base = decade * 10 + 1;
            let rows: Vec<(i64, &str)> = (base..base + 4)
                .map(|id| (id, "user"))
                .collect::<Vec<_>>();
            clients.push(memory_client(decade as usize, &rows).await);
        }

        let engine = MapReduce::new(clients);
        let mut b = Builder::new(&["SELECT id FROM users WHERE id={id}"]);
        b.param("id", 31i64);

        let row = engine.first(&b).await.unwrap().expect("expected a match");
        assert_eq!(row.get("id").unwrap().as_i64(), Some(31));
    }

    #[tokio::test]
    async fn query_limit_truncates_merged_results() {
        let c0 = memory_client(0, &[(1, "a"), (2, "b")]).await;
        let c1 = memory_client(1, &[(3, "c"), (4, "d")]).await;

        let engine = MapReduce::new(vec![c0, c1]);
        let b = Builder::new(&["SELECT id FROM users"]);

        let rows = engine
            .query_limit(
                &b,
                Some(&|a: &Row, b: &Row| {
                    a.get("id").unwrap().as_i64().cmp(&b.get("id").unwrap().as_i64())
                }),
                3,
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
    }
}
