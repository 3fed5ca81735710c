//! Command table and dispatch.
//!
//! Protocol parsing produces a canonical command frame, then a registry resolves and executes
//! the matching handler. Validation happens before any mutation, so a rejected command never
//! leaves partial state behind.

use crate::StoreContext;
use crate::command::{CommandFrame, CommandReply};
use crate::db::Database;

#[path = "dispatch/parse_numbers.rs"]
mod parse_numbers;
#[path = "dispatch/parse_opts.rs"]
mod parse_opts;
#[path = "dispatch/handlers_string.rs"]
mod handlers_string;
#[path = "dispatch/handlers_keyspace.rs"]
mod handlers_keyspace;
#[path = "dispatch/handlers_expiry.rs"]
mod handlers_expiry;
#[path = "dispatch/handlers_bit.rs"]
mod handlers_bit;
#[path = "dispatch/handlers_hash.rs"]
mod handlers_hash;
#[path = "dispatch/handlers_set.rs"]
mod handlers_set;
#[path = "dispatch/registry.rs"]
mod registry;

pub use registry::CommandRegistry;

/// Handler function signature used by command registry entries.
pub type CommandHandler = fn(&CommandFrame, &mut Database, &StoreContext) -> CommandReply;

/// Arity constraints for a command, counted over arguments after the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandArity {
    /// Command must have exactly this many arguments.
    Exact(usize),
    /// Command must have at least this many arguments.
    AtLeast(usize),
}

/// Command attribute bits.
pub type CommandFlags = u8;

/// Command mutates the keyspace.
pub const CMD_WRITE: CommandFlags = 1 << 0;
/// Command only reads the keyspace.
pub const CMD_READONLY: CommandFlags = 1 << 1;
/// Command runs in constant or near-constant time.
pub const CMD_FAST: CommandFlags = 1 << 2;
/// Command may allocate proportionally to its input.
pub const CMD_DENYOOM: CommandFlags = 1 << 3;

/// Metadata and callback for one command table entry.
///
/// Key positions follow the Redis convention: argv indices counted with the command name at
/// position zero; `last_key == -1` means "every remaining argument stepped by `key_step`".
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Canonical uppercase command name.
    pub name: &'static str,
    /// Arity constraint used for lightweight input validation.
    pub arity: CommandArity,
    /// Attribute bits.
    pub flags: CommandFlags,
    /// argv index of the first key.
    pub first_key: usize,
    /// argv index of the last key, or -1 for open-ended key lists.
    pub last_key: i32,
    /// Stride between key positions.
    pub key_step: usize,
    /// ACL-style category labels.
    pub categories: &'static [&'static str],
    /// Handler callback.
    pub handler: CommandHandler,
}

const WRONGTYPE_MESSAGE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

pub(crate) fn reply_wrongtype() -> CommandReply {
    CommandReply::Error(WRONGTYPE_MESSAGE.to_owned())
}

pub(crate) fn reply_not_integer() -> CommandReply {
    CommandReply::Error("ERR value is not an integer or out of range".to_owned())
}

pub(crate) fn reply_syntax_error() -> CommandReply {
    CommandReply::Error("ERR syntax error".to_owned())
}
