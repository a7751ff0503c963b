//! A sharded relational-database access layer: a prepared-statement cache,
//! a consistent-hash DHT for online scale-out, a 64-bit shard-id generator,
//! a parameterized SQL builder, a map/reduce query engine, and a
//! distributed transaction coordinator — all bound together by the
//! [`db::Db`] facade.
//!
//! Typical setup opens one [`sqlx::SqlitePool`] per physical database and
//! hands the vector to [`db::Db::open`]; cross-shard routing then goes
//! through a named [`shardid::Dht`] registered with [`db::Db::new_dht`].

pub mod builder;
pub mod client;
pub mod db;
pub mod dtc;
pub mod error;
pub mod mapreduce;
pub mod row;
pub mod shardid;
pub mod stmt_cache;
mod token;
pub mod tx;

pub use builder::{Builder, Value};
pub use client::Client;
pub use db::Db;
pub use dtc::Dtc;
pub use error::{Error, Result};
pub use mapreduce::MapReduce;
pub use shardid::{Dht, Generator, HashRing, Id, OnResult, Rotate};
pub use tx::Tx;
