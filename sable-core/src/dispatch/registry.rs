use super::handlers_bit::{
    handle_bitcount, handle_bitfield, handle_bitop, handle_bitpos, handle_getbit, handle_setbit,
};
use super::handlers_expiry::{
    handle_expire, handle_persist, handle_pexpire, handle_pttl, handle_ttl,
};
use super::handlers_hash::{
    handle_hdel, handle_hexists, handle_hget, handle_hgetall, handle_hincrby, handle_hincrbyfloat,
    handle_hkeys, handle_hlen, handle_hmget, handle_hset, handle_hsetnx, handle_hstrlen,
    handle_hvals,
};
use super::handlers_keyspace::{handle_del, handle_exists};
use super::handlers_set::{
    handle_sadd, handle_scard, handle_sdiff, handle_sdiffstore, handle_sinter,
    handle_sinterstore, handle_sismember, handle_smembers, handle_spop, handle_srandmember,
    handle_srem, handle_sunion, handle_sunionstore,
};
use super::handlers_string::{
    handle_echo, handle_get, handle_ping, handle_set, handle_strlen, handle_type,
};
use super::{
    CMD_DENYOOM, CMD_FAST, CMD_READONLY, CMD_WRITE, CommandArity, CommandSpec,
};
use crate::StoreContext;
use crate::command::{CommandFrame, CommandReply};
use crate::containers::HotMap as HashMap;
use crate::db::Database;

/// Runtime command registry.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: HashMap<String, CommandSpec>,
}

impl CommandRegistry {
    /// Builds an empty command registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Builds a registry preloaded with every supported command.
    #[must_use]
    pub fn with_builtin_commands() -> Self {
        let mut registry = Self::new();
        registry.register_connection_commands();
        registry.register_string_commands();
        registry.register_keyspace_commands();
        registry.register_expiry_commands();
        registry.register_bitmap_commands();
        registry.register_hash_commands();
        registry.register_set_commands();
        registry
    }

    fn register_connection_commands(&mut self) {
        self.register(CommandSpec {
            name: "PING",
            arity: CommandArity::AtLeast(0),
            flags: CMD_FAST,
            first_key: 0,
            last_key: 0,
            key_step: 0,
            categories: &["connection"],
            handler: handle_ping,
        });
        self.register(CommandSpec {
            name: "ECHO",
            arity: CommandArity::Exact(1),
            flags: CMD_FAST,
            first_key: 0,
            last_key: 0,
            key_step: 0,
            categories: &["connection"],
            handler: handle_echo,
        });
    }

    fn register_string_commands(&mut self) {
        self.register(CommandSpec {
            name: "GET",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "string"],
            handler: handle_get,
        });
        self.register(CommandSpec {
            name: "SET",
            arity: CommandArity::AtLeast(2),
            flags: CMD_WRITE | CMD_DENYOOM,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "string"],
            handler: handle_set,
        });
        self.register(CommandSpec {
            name: "STRLEN",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "string"],
            handler: handle_strlen,
        });
        self.register(CommandSpec {
            name: "TYPE",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "keyspace"],
            handler: handle_type,
        });
    }

    fn register_keyspace_commands(&mut self) {
        self.register(CommandSpec {
            name: "DEL",
            arity: CommandArity::AtLeast(1),
            flags: CMD_WRITE,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["write", "keyspace"],
            handler: handle_del,
        });
        self.register(CommandSpec {
            name: "EXISTS",
            arity: CommandArity::AtLeast(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["read", "keyspace"],
            handler: handle_exists,
        });
    }

    fn register_expiry_commands(&mut self) {
        self.register(CommandSpec {
            name: "TTL",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "keyspace"],
            handler: handle_ttl,
        });
        self.register(CommandSpec {
            name: "PTTL",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "keyspace"],
            handler: handle_pttl,
        });
        self.register(CommandSpec {
            name: "PERSIST",
            arity: CommandArity::Exact(1),
            flags: CMD_WRITE | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "keyspace"],
            handler: handle_persist,
        });
        self.register(CommandSpec {
            name: "EXPIRE",
            arity: CommandArity::Exact(2),
            flags: CMD_WRITE | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "keyspace"],
            handler: handle_expire,
        });
        self.register(CommandSpec {
            name: "PEXPIRE",
            arity: CommandArity::Exact(2),
            flags: CMD_WRITE | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "keyspace"],
            handler: handle_pexpire,
        });
    }

    fn register_bitmap_commands(&mut self) {
        self.register(CommandSpec {
            name: "GETBIT",
            arity: CommandArity::Exact(2),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "bitmap"],
            handler: handle_getbit,
        });
        self.register(CommandSpec {
            name: "SETBIT",
            arity: CommandArity::Exact(3),
            flags: CMD_WRITE | CMD_DENYOOM,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "bitmap"],
            handler: handle_setbit,
        });
        self.register(CommandSpec {
            name: "BITOP",
            arity: CommandArity::AtLeast(3),
            flags: CMD_WRITE | CMD_DENYOOM,
            first_key: 2,
            last_key: -1,
            key_step: 1,
            categories: &["write", "bitmap"],
            handler: handle_bitop,
        });
        self.register(CommandSpec {
            name: "BITCOUNT",
            arity: CommandArity::AtLeast(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "bitmap"],
            handler: handle_bitcount,
        });
        self.register(CommandSpec {
            name: "BITPOS",
            arity: CommandArity::AtLeast(2),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "bitmap"],
            handler: handle_bitpos,
        });
        self.register(CommandSpec {
            name: "BITFIELD",
            arity: CommandArity::AtLeast(1),
            flags: CMD_WRITE | CMD_DENYOOM,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "bitmap"],
            handler: handle_bitfield,
        });
    }

    fn register_hash_commands(&mut self) {
        self.register(CommandSpec {
            name: "HSET",
            arity: CommandArity::AtLeast(3),
            flags: CMD_WRITE | CMD_DENYOOM | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "hash"],
            handler: handle_hset,
        });
        self.register(CommandSpec {
            name: "HSETNX",
            arity: CommandArity::Exact(3),
            flags: CMD_WRITE | CMD_DENYOOM | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "hash"],
            handler: handle_hsetnx,
        });
        self.register(CommandSpec {
            name: "HGET",
            arity: CommandArity::Exact(2),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hget,
        });
        self.register(CommandSpec {
            name: "HMGET",
            arity: CommandArity::AtLeast(2),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hmget,
        });
        self.register(CommandSpec {
            name: "HGETALL",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hgetall,
        });
        self.register(CommandSpec {
            name: "HDEL",
            arity: CommandArity::AtLeast(2),
            flags: CMD_WRITE | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "hash"],
            handler: handle_hdel,
        });
        self.register(CommandSpec {
            name: "HEXISTS",
            arity: CommandArity::Exact(2),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hexists,
        });
        self.register(CommandSpec {
            name: "HINCRBY",
            arity: CommandArity::Exact(3),
            flags: CMD_WRITE | CMD_DENYOOM | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "hash"],
            handler: handle_hincrby,
        });
        self.register(CommandSpec {
            name: "HINCRBYFLOAT",
            arity: CommandArity::Exact(3),
            flags: CMD_WRITE | CMD_DENYOOM | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "hash"],
            handler: handle_hincrbyfloat,
        });
        self.register(CommandSpec {
            name: "HKEYS",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hkeys,
        });
        self.register(CommandSpec {
            name: "HVALS",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hvals,
        });
        self.register(CommandSpec {
            name: "HLEN",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hlen,
        });
        self.register(CommandSpec {
            name: "HSTRLEN",
            arity: CommandArity::Exact(2),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "hash"],
            handler: handle_hstrlen,
        });
    }

    fn register_set_commands(&mut self) {
        self.register(CommandSpec {
            name: "SADD",
            arity: CommandArity::AtLeast(2),
            flags: CMD_WRITE | CMD_DENYOOM | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "set"],
            handler: handle_sadd,
        });
        self.register(CommandSpec {
            name: "SREM",
            arity: CommandArity::AtLeast(2),
            flags: CMD_WRITE | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "set"],
            handler: handle_srem,
        });
        self.register(CommandSpec {
            name: "SISMEMBER",
            arity: CommandArity::Exact(2),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "set"],
            handler: handle_sismember,
        });
        self.register(CommandSpec {
            name: "SMEMBERS",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "set"],
            handler: handle_smembers,
        });
        self.register(CommandSpec {
            name: "SCARD",
            arity: CommandArity::Exact(1),
            flags: CMD_READONLY | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "set"],
            handler: handle_scard,
        });
        self.register(CommandSpec {
            name: "SPOP",
            arity: CommandArity::AtLeast(1),
            flags: CMD_WRITE | CMD_FAST,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["write", "set"],
            handler: handle_spop,
        });
        self.register(CommandSpec {
            name: "SRANDMEMBER",
            arity: CommandArity::AtLeast(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: 1,
            key_step: 1,
            categories: &["read", "set"],
            handler: handle_srandmember,
        });
        self.register(CommandSpec {
            name: "SINTER",
            arity: CommandArity::AtLeast(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["read", "set"],
            handler: handle_sinter,
        });
        self.register(CommandSpec {
            name: "SUNION",
            arity: CommandArity::AtLeast(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["read", "set"],
            handler: handle_sunion,
        });
        self.register(CommandSpec {
            name: "SDIFF",
            arity: CommandArity::AtLeast(1),
            flags: CMD_READONLY,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["read", "set"],
            handler: handle_sdiff,
        });
        self.register(CommandSpec {
            name: "SINTERSTORE",
            arity: CommandArity::AtLeast(2),
            flags: CMD_WRITE | CMD_DENYOOM,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["write", "set"],
            handler: handle_sinterstore,
        });
        self.register(CommandSpec {
            name: "SUNIONSTORE",
            arity: CommandArity::AtLeast(2),
            flags: CMD_WRITE | CMD_DENYOOM,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["write", "set"],
            handler: handle_sunionstore,
        });
        self.register(CommandSpec {
            name: "SDIFFSTORE",
            arity: CommandArity::AtLeast(2),
            flags: CMD_WRITE | CMD_DENYOOM,
            first_key: 1,
            last_key: -1,
            key_step: 1,
            categories: &["write", "set"],
            handler: handle_sdiffstore,
        });
    }

    /// Registers or replaces one command in the table.
    pub fn register(&mut self, spec: CommandSpec) {
        let _ = self.entries.insert(spec.name.to_owned(), spec);
    }

    /// Looks up a command's table entry by canonical name.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&CommandSpec> {
        self.entries.get(name)
    }

    /// Validates command existence and arity without executing handler logic.
    ///
    /// # Errors
    ///
    /// Returns user-facing error text for unknown command names or invalid argument count.
    pub fn validate_frame(&self, frame: &CommandFrame) -> Result<(), String> {
        let command_name = frame.name.to_ascii_uppercase();
        let Some(spec) = self.entries.get(&command_name) else {
            return Err(format!("ERR unknown command '{}'", frame.name));
        };

        match spec.arity {
            CommandArity::Exact(expected) if frame.args.len() != expected => Err(format!(
                "ERR wrong number of arguments for '{}' command",
                spec.name.to_ascii_lowercase()
            )),
            CommandArity::AtLeast(minimum) if frame.args.len() < minimum => Err(format!(
                "ERR wrong number of arguments for '{}' command",
                spec.name.to_ascii_lowercase()
            )),
            _ => Ok(()),
        }
    }

    /// Dispatches one canonical command frame to its registered handler.
    #[must_use]
    pub fn dispatch(
        &self,
        frame: &CommandFrame,
        db: &mut Database,
        ctx: &StoreContext,
    ) -> CommandReply {
        if let Err(message) = self.validate_frame(frame) {
            return CommandReply::Error(message);
        }

        let command_name = frame.name.to_ascii_uppercase();
        let Some(spec) = self.entries.get(&command_name) else {
            return CommandReply::Error(format!("ERR unknown command '{}'", frame.name));
        };
        (spec.handler)(frame, db, ctx)
    }
}
