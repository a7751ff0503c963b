//! 64-bit sharding identifier: encoding/decoding, the monotonic generator,
//! the consistent-hash ring, and the online-scale-out DHT.

mod dht;
mod generator;
mod hash_ring;
mod id;

pub use dht::{Dht, OnResult};
pub use generator::Generator;
pub use hash_ring::HashRing;
pub use id::{Id, Rotate, EPOCH_MILLIS, END_MILLIS};
