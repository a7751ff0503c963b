//! Distributed hash table: current + pending `HashRing` pair with online
//! scale-out over explicit database-index sets.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{Error, Result};

use super::hash_ring::HashRing;

struct State {
    current: Arc<HashRing>,
    next: Option<Arc<HashRing>>,
    affected_vnodes: HashSet<u32>,
}

/// The result of looking a key up against a [`Dht`] mid-migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnResult {
    /// The key is stable: read and write at `database`.
    Ok { database: usize },
    /// The key is mid-migration: it currently lives at `current` but will
    /// live at `next` once [`Dht::done`] runs. Callers choose policy
    /// (read-from-current, dual-write, or retry-after-done).
    Busy { current: usize, next: usize },
}

/// Wraps a current `HashRing` plus an optional pending one, reporting
/// "busy" keys during an online scale-out.
pub struct Dht {
    state: RwLock<State>,
}

impl Dht {
    /// Constructs a DHT with a single ring over the explicit database
    /// indices in `dbs`.
    pub fn new(dbs: &[usize]) -> Dht {
        Dht {
            state: RwLock::new(State {
                current: Arc::new(HashRing::new(dbs)),
                next: None,
                affected_vnodes: HashSet::new(),
            }),
        }
    }

    /// Locates `key`. See [`OnResult`] for the two possible outcomes.
    pub async fn on(&self, key: &str) -> OnResult {
        let state = self.state.read().await;
        let (db, vn) = state.current.on(key);

        if !state.affected_vnodes.contains(&vn) {
            return OnResult::Ok { database: db };
        }

        let next = state
            .next
            .as_ref()
            .expect("affected vnodes imply a pending ring");
        let (next_db, _) = next.on(key);

        if next_db == db {
            OnResult::Ok { database: db }
        } else {
            OnResult::Busy {
                current: db,
                next: next_db,
            }
        }
    }

    /// Begins a scale-out: the pending ring is built over the union of the
    /// current databases and `new_dbs`. Returns the sorted list of database
    /// indices that own at least one vnode whose predecessor changed, i.e.
    /// the shards an orchestrator must drain.
    pub async fn add(&self, new_dbs: &[usize]) -> Vec<usize> {
        let mut state = self.state.write().await;

        let mut union: Vec<usize> = state.current.databases().to_vec();
        union.extend_from_slice(new_dbs);
        let next = Arc::new(HashRing::new(&union));

        let mut affected_vnodes = HashSet::new();
        let mut affected_dbs = HashSet::new();

        for &vn in state.current.v_nodes() {
            let before = state.current.previous_db(vn);
            let after = next.previous_db(vn);
            if before != after {
                affected_vnodes.insert(vn);
                affected_dbs.insert(before);
            }
        }

        state.next = Some(next);
        state.affected_vnodes = affected_vnodes;

        let mut affected: Vec<usize> = affected_dbs.into_iter().collect();
        affected.sort_unstable();
        affected
    }

    /// Finalizes a scale-out: current becomes the pending ring, affected
    /// sets clear. After this every lookup returns `Ok`.
    pub async fn done(&self) {
        let mut state = self.state.write().await;
        if let Some(next) = state.next.take() {
            state.current = next;
        }
        state.affected_vnodes.clear();
    }

    /// The database indices in the current ring, sorted ascending.
    pub async fn databases(&self) -> Vec<usize> {
        self.state.read().await.current.databases().to_vec()
    }
}

impl OnResult {
    /// Converts `Busy` into [`Error::ItemBusy`], treating `Ok` as success.
    pub fn into_result(self) -> Result<usize> {
        match self {
            OnResult::Ok { database } => Ok(database),
            OnResult::Busy { current, next } => Err(Error::ItemBusy { current, next }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reproduces the concrete scale-out scenario literally: starting from
    /// databases 1 and 6, scaling out by adding database 3 moves key "E1"
    /// from database 1 to database 3 while key "1149" stays put at
    /// database 1 throughout.
    #[tokio::test]
    async fn scale_out_moves_e1_from_database_1_to_database_3() {
        let dht = Dht::new(&[1, 6]);

        let stable_before = dht.on("1149").await;
        assert_eq!(stable_before, OnResult::Ok { database: 1 });

        let affected = dht.add(&[3]).await;
        assert!(!affected.is_empty());

        match dht.on("E1").await {
            OnResult::Busy { current, next } => {
                assert_eq!(current, 1);
                assert_eq!(next, 3);
            }
            other => panic!("expected E1 to be mid-migration, got {other:?}"),
        }

        assert_eq!(dht.on("1149").await, OnResult::Ok { database: 1 });

        dht.done().await;

        assert_eq!(dht.on("E1").await, OnResult::Ok { database: 3 });
        assert_eq!(dht.on("1149").await, OnResult::Ok { database: 1 });
        assert_eq!(dht.databases().await, vec![1, 3, 6]);
    }
}
