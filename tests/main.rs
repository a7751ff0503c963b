#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    use sqlgrid::dtc::Dtc;
    use sqlgrid::shardid::{Dht, Generator, Id, OnResult, Rotate, EPOCH_MILLIS};
    use sqlgrid::{Builder, Client, Value};

    async fn memory_pool() -> sqlx::SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn shard_id_round_trips_through_its_packed_value() {
        let t = Utc.timestamp_millis_opt(EPOCH_MILLIS + 42_000).single().unwrap();
        let id = Id::build(t, 2, 7, Rotate::Daily, 5);
        let decoded = Id::parse(id.value);
        assert_eq!(decoded.worker_id, 2);
        assert_eq!(decoded.database_id, 7);
        assert_eq!(decoded.rotate, Rotate::Daily);
        assert_eq!(decoded.sequence, 5);
        assert_eq!(decoded.time(), t);
    }

    #[test]
    fn generator_sequence_increments_0_1_2_under_a_pinned_clock() {
        let pinned = Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap();
        let gen = Generator::new(0, 0, Rotate::None)
            .with_clock(Arc::new(move || pinned));

        let a = gen.next();
        let b = gen.next();
        let c = gen.next();
        assert_eq!((a.sequence, b.sequence, c.sequence), (0, 1, 2));
    }

    #[tokio::test]
    async fn dht_scale_out_moves_e1_from_database_1_to_database_3() {
        let dht = Dht::new(&[1, 6]);
        assert_eq!(dht.on("1149").await, OnResult::Ok { database: 1 });

        dht.add(&[3]).await;
        match dht.on("E1").await {
            OnResult::Busy { current, next } => assert_eq!((current, next), (1, 3)),
            other => panic!("expected a busy key, got {other:?}"),
        }
        assert_eq!(dht.on("1149").await, OnResult::Ok { database: 1 });

        dht.done().await;
        assert_eq!(dht.on("E1").await, OnResult::Ok { database: 3 });
        assert_eq!(dht.on("1149").await, OnResult::Ok { database: 1 });
    }

    #[test]
    fn builder_composes_select_with_input_and_param_tokens() {
        let mut b = Builder::new(&[
            "SELECT * FROM orders_<yyyy>",
            "LEFT JOIN users_<dbid> ON users_<dbid>.id=orders.user_id",
        ]);
        b.input("yyyy", "2024").input("dbid", "db2");
        let mut w = Builder::new(&[b.raw()]);
        w.input("yyyy", "2024").input("dbid", "db2");
        w.sql(" WHERE users_<dbid>.id={user_id} AND orders.status={s}");
        w.param("user_id", "u1").param("s", 1i64);

        let (sql, args) = w.build().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM orders_2024 LEFT JOIN users_db2 ON users_db2.id=orders.user_id WHERE users_db2.id=? AND orders.status=?"
        );
        assert_eq!(args, vec![Value::Text("u1".to_string()), Value::Int(1)]);
    }

    #[tokio::test]
    async fn map_reduce_first_finds_a_match_across_ten_shards() {
        let mut clients = Vec::new();
        for decade in 0..10 {
            let pool = memory_pool().await;
            sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY)")
                .execute(&pool)
                .await
                .unwrap();
            let base = decade * 10 + 1;
            for id in base..base + 4 {
                sqlx::query("INSERT INTO users (id) VALUES (?)")
                    .bind(id)
                    .execute(&pool)
                    .await
                    .unwrap();
            }
            clients.push(Arc::new(Client::new(decade as usize, pool)));
        }

        let engine = sqlgrid::MapReduce::new(clients);
        let mut b = Builder::new(&["SELECT id FROM users WHERE id={id}"]);
        b.param("id", 31i64);

        let row = engine.first(&b).await.unwrap().expect("expected a match");
        assert_eq!(row.get("id").unwrap().as_i64(), Some(31));
    }

    #[tokio::test]
    async fn dtc_compensates_committed_sessions_on_rollback() {
        let pool_a = memory_pool().await;
        let pool_b = memory_pool().await;
        sqlx::query("CREATE TABLE balances (id INTEGER PRIMARY KEY, amount INTEGER)")
            .execute(&pool_a)
            .await
            .unwrap();
        sqlx::query("INSERT INTO balances (id, amount) VALUES (1, 100)")
            .execute(&pool_a)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE balances (id INTEGER PRIMARY KEY, amount INTEGER)")
            .execute(&pool_b)
            .await
            .unwrap();
        sqlx::query("INSERT INTO balances (id, amount) VALUES (1, 0)")
            .execute(&pool_b)
            .await
            .unwrap();

        let client_a = Arc::new(Client::new(0, pool_a));
        let client_b = Arc::new(Client::new(1, pool_b));

        let mut dtc = Dtc::new();
        dtc.prepare(
            client_a.clone(),
            Box::new(|tx| {
                Box::pin(async move {
                    tx.exec(
                        "UPDATE balances SET amount = amount - ? WHERE id = 1",
                        &[Value::Int(30)],
                    )
                    .await?;
                    Ok(())
                })
            }),
            Box::new(|client: Arc<Client>| {
                Box::pin(async move {
                    client
                        .exec(
                            "UPDATE balances SET amount = amount + ? WHERE id = 1",
                            &[Value::Int(30)],
                        )
                        .await?;
                    Ok(())
                })
            }),
        );
        dtc.prepare(
            client_b.clone(),
            Box::new(|tx| {
                Box::pin(async move {
                    tx.exec(
                        "UPDATE balances SET amount = amount + ? WHERE id = 1",
                        &[Value::Int(30)],
                    )
                    .await?;
                    Ok(())
                })
            }),
            Box::new(|client: Arc<Client>| {
                Box::pin(async move {
                    client
                        .exec(
                            "UPDATE balances SET amount = amount - ? WHERE id = 1",
                            &[Value::Int(30)],
                        )
                        .await?;
                    Ok(())
                })
            }),
        );

        dtc.commit().await.unwrap();

        let after_commit = client_a
            .query_row("SELECT amount FROM balances WHERE id = 1", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_commit.get("amount").unwrap().as_i64(), Some(70));

        let errors = dtc.rollback().await;
        assert!(errors.is_empty());

        let restored_a = client_a
            .query_row("SELECT amount FROM balances WHERE id = 1", &[])
            .await
            .unwrap()
            .unwrap();
        let restored_b = client_b
            .query_row("SELECT amount FROM balances WHERE id = 1", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored_a.get("amount").unwrap().as_i64(), Some(100));
        assert_eq!(restored_b.get("amount").unwrap().as_i64(), Some(0));
    }
}
