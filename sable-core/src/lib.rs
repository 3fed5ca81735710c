//! Storage engine and command layer shared by the facade and server crates.

pub mod bitops;
pub mod command;
pub mod containers;
pub mod db;
pub mod dict;
pub mod dispatch;
pub mod intset;
pub mod set;
pub mod siphash;
pub mod value;

use sable_common::config::ServerConfig;
use siphash::SipKey;

/// Process-wide storage parameters handed to every dictionary and set.
///
/// The SipHash key is generated once at startup and shared by reference; each `Dict` copies the
/// 16-byte key on construction so hashing never reaches back into global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreContext {
    /// Keyed-hash seed for every dictionary in the process.
    pub sip_key: SipKey,
    /// Adaptive-set upgrade threshold.
    pub max_list_size: usize,
}

impl StoreContext {
    /// Builds the storage context from process config with a fresh random hash key.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            sip_key: SipKey::random(),
            max_list_size: config.max_list_size,
        }
    }
}
