//! Consistent-hash ring over an explicit set of database indices, M virtual
//! replicas per database, lookup by FNV-1a(string).

/// Default replica labels, matching the original source's ten-letter set.
pub const DEFAULT_REPLICAS: &[&str] = &["A", "C", "E", "G", "I", "K", "M", "O", "Q", "S"];

const FNV_OFFSET_BASIS_32: u32 = 0x811c_9dc5;
const FNV_PRIME_32: u32 = 0x0100_0193;

/// FNV-1a, 32-bit width, over UTF-8 bytes. The crate-provided `fnv` hasher
/// targets `u64` output, so the 32-bit variant this ring's layout depends
/// on is spelled out directly rather than truncated from a 64-bit digest.
fn fnv1a32(s: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS_32;
    for b in s.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(FNV_PRIME_32);
    }
    hash
}

/// Immutable consistent-hash ring. Lookups are read-only and therefore
/// safely concurrent.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// The database indices this ring was built over, sorted and
    /// deduplicated.
    databases: Vec<usize>,
    /// Sorted virtual-node hashes.
    v_nodes: Vec<u32>,
    /// virtual-node hash -> owning database index.
    owners: std::collections::HashMap<u32, usize>,
}

impl HashRing {
    /// Builds a ring over the database indices in `dbs` using the default
    /// replica labels. `dbs` need not be contiguous or start at 0.
    pub fn new(dbs: &[usize]) -> HashRing {
        Self::with_replicas(dbs, DEFAULT_REPLICAS)
    }

    /// Builds a ring over the database indices in `dbs` using `replicas` as
    /// the virtual-node label set.
    pub fn with_replicas(dbs: &[usize], replicas: &[&str]) -> HashRing {
        let mut databases: Vec<usize> = dbs.to_vec();
        databases.sort_unstable();
        databases.dedup();

        let mut owners = std::collections::HashMap::new();
        let mut v_nodes = Vec::with_capacity(databases.len() * replicas.len());

        for &db in &databases {
            for r in replicas {
                let key = format!("{r}{db}");
                let h = fnv1a32(&key);
                owners.insert(h, db);
                v_nodes.push(h);
            }
        }
        v_nodes.sort_unstable();

        HashRing {
            databases,
            v_nodes,
            owners,
        }
    }

    /// Number of distinct databases this ring was built over.
    pub fn db_count(&self) -> usize {
        self.databases.len()
    }

    /// The database indices this ring was built over, sorted ascending.
    pub fn databases(&self) -> &[usize] {
        &self.databases
    }

    /// All virtual-node hashes, sorted ascending.
    pub fn v_nodes(&self) -> &[u32] {
        &self.v_nodes
    }

    fn successor_index(&self, hash: u32) -> usize {
        match self.v_nodes.binary_search(&hash) {
            Ok(i) => {
                // Exact hit on a vnode boundary: the node strictly greater
                // is the next one (or wrap).
                if i + 1 < self.v_nodes.len() {
                    i + 1
                } else {
                    0
                }
            }
            Err(i) => {
                if i < self.v_nodes.len() {
                    i
                } else {
                    0
                }
            }
        }
    }

    /// Returns `(database index, virtual-node hash)` for `key`: the
    /// database index owning the least virtual node strictly greater than
    /// `hash(key)`, wrapping to the smallest when none qualifies.
    pub fn on(&self, key: &str) -> (usize, u32) {
        let h = fnv1a32(key);
        let idx = self.successor_index(h);
        let vn = self.v_nodes[idx];
        (self.owners[&vn], vn)
    }

    /// Returns the database index owning the virtual node immediately
    /// preceding `vn` in sorted order, wrapping to the last when `vn` is
    /// the smallest.
    pub fn previous_db(&self, vn: u32) -> usize {
        let idx = self
            .v_nodes
            .binary_search(&vn)
            .unwrap_or_else(|i| i % self.v_nodes.len().max(1));
        let prev_idx = if idx == 0 {
            self.v_nodes.len() - 1
        } else {
            idx - 1
        };
        self.owners[&self.v_nodes[prev_idx]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_deterministic() {
        let r = HashRing::new(&[0, 1, 2, 3]);
        let (a, _) = r.on("E1");
        let (b, _) = r.on("E1");
        assert_eq!(a, b);
    }

    #[test]
    fn depends_only_on_databases_and_key() {
        let r1 = HashRing::new(&[0, 1, 2, 3]);
        let r2 = HashRing::new(&[0, 1, 2, 3]);
        assert_eq!(r1.on("hello").0, r2.on("hello").0);
    }

    #[test]
    fn every_key_maps_into_the_given_database_set() {
        let r = HashRing::new(&[1, 2, 3, 4, 5]);
        for k in ["a", "bb", "ccc", "E1", "1149", ""] {
            let (db, _) = r.on(k);
            assert!(r.databases().contains(&db));
        }
    }

    #[test]
    fn database_indices_need_not_be_contiguous_or_start_at_zero() {
        let r = HashRing::new(&[1, 2]);
        assert_eq!(r.db_count(), 2);
        assert_eq!(r.databases(), &[1, 2]);
    }
}
