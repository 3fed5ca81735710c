//! Runtime configuration shared by module bootstrap code.

use std::env;

/// Default RESP listener port.
pub const DEFAULT_PORT: u16 = 2000;

/// Default member count above which an integer-encoded set upgrades to a hash table.
pub const DEFAULT_MAX_LIST_SIZE: usize = 256;

/// Bootstrap configuration used by `sable-server` during process startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Main RESP listener port.
    pub port: u16,
    /// Adaptive-set upgrade threshold (`SET_MAX_ZIPLIST_ENTRIES`).
    pub max_list_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_list_size: DEFAULT_MAX_LIST_SIZE,
        }
    }
}

impl ServerConfig {
    /// Reads configuration from the process environment.
    ///
    /// `SABLE_PORT` overrides the listener port; `SET_MAX_ZIPLIST_ENTRIES` overrides the set
    /// upgrade threshold. Unset, unparseable, or non-positive values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: parse_port(env::var("SABLE_PORT").ok().as_deref()),
            max_list_size: parse_max_list_size(env::var("SET_MAX_ZIPLIST_ENTRIES").ok().as_deref()),
        }
    }
}

fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|text| text.trim().parse::<u16>().ok())
        .filter(|port| *port > 0)
        .unwrap_or(DEFAULT_PORT)
}

fn parse_max_list_size(raw: Option<&str>) -> usize {
    raw.and_then(|text| text.trim().parse::<i64>().ok())
        .filter(|parsed| *parsed > 0)
        .and_then(|parsed| usize::try_from(parsed).ok())
        .unwrap_or(DEFAULT_MAX_LIST_SIZE)
}
