//! Typed values stored in the keyspace.

use crate::dict::Dict;
use crate::set::SetValue;

/// One keyspace value. The keyspace exclusively owns the value; hash and set variants
/// exclusively own their backing containers.
pub enum Value {
    /// Binary-safe string, also addressed bit-wise by the bitmap commands.
    Str(Vec<u8>),
    /// Field-to-value mapping backed by the chained dictionary.
    Hash(Dict<Vec<u8>>),
    /// Adaptive set.
    Set(SetValue),
}

impl Value {
    /// Type token reported by `TYPE` and used in WRONGTYPE checks.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
        }
    }
}
