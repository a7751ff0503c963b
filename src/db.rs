//! Facade owning an ordered vector of clients and the named DHTs that route
//! across them.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::shardid::{Dht, Id};

/// Owns the ordered client vector and the registered DHTs used to route
/// sharded lookups across it.
pub struct Db {
    clients: Vec<Arc<Client>>,
    dhts: HashMap<String, Arc<Dht>>,
}

impl Db {
    /// Wraps `pools` as clients 0..N, in order.
    pub fn open(pools: Vec<SqlitePool>) -> Db {
        let clients = pools
            .into_iter()
            .enumerate()
            .map(|(i, pool)| Arc::new(Client::new(i, pool)))
            .collect();
        Db {
            clients,
            dhts: HashMap::new(),
        }
    }

    /// The default client (index 0), target of the un-sharded delegation
    /// methods below.
    pub fn default_client(&self) -> &Arc<Client> {
        &self.clients[0]
    }

    /// Returns the client bound to `id.database_id`.
    pub fn on(&self, id: &Id) -> &Arc<Client> {
        &self.clients[id.database_id as usize]
    }

    /// Registers a new named DHT over the explicit client indices in `dbs`.
    pub fn new_dht(&mut self, name: &str, dbs: &[usize]) {
        self.dhts.insert(name.to_string(), Arc::new(Dht::new(dbs)));
    }

    /// Fetches a previously registered DHT by name.
    pub fn get_dht(&self, name: &str) -> Result<Arc<Dht>> {
        self.dhts
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingDht(name.to_string()))
    }

    /// Looks up `key` in the named DHT and returns its current-location
    /// client, or [`Error::ItemBusy`] mid scale-out.
    pub async fn on_dht(&self, key: &str, name: &str) -> Result<&Arc<Client>> {
        let dht = self.get_dht(name)?;
        let database = dht.on(key).await.into_result()?;
        Ok(&self.clients[database])
    }

    /// Appends `pools` as new clients at the end of the vector.
    pub fn add(&mut self, pools: Vec<SqlitePool>) {
        let mut next_index = self.clients.len();
        for pool in pools {
            self.clients.push(Arc::new(Client::new(next_index, pool)));
            next_index += 1;
        }
    }

    /// All registered clients, in index order.
    pub fn clients(&self) -> &[Arc<Client>] {
        &self.clients
    }
}
