//! Ancillary container aliases used off the keyed-hash path.
//!
//! The keyspace, hash values, set values, and the expiry index are backed by the crate's own
//! incrementally-rehashing [`crate::dict::Dict`]. Everything else (command registry, sampling
//! scratch space) uses ordinary hash containers, centralized here so container choices can be
//! changed in one place.

use hashbrown::{HashMap as HbMap, HashSet as HbSet};

/// Hash map used by registry and bookkeeping tables.
pub type HotMap<K, V> = HbMap<K, V>;

/// Hash set used by sampling scratch space.
pub type HotSet<T> = HbSet<T>;
