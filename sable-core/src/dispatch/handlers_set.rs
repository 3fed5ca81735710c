use sable_common::time::now_unix_millis;

use super::parse_numbers::parse_i64;
use super::{reply_not_integer, reply_wrongtype};
use crate::StoreContext;
use crate::command::{CommandFrame, CommandReply};
use crate::db::Database;
use crate::set::{self, SetValue};
use crate::value::Value;

/// Resolves `key` to its set, creating an empty one when the key is absent.
fn set_entry<'db>(
    db: &'db mut Database,
    key: &[u8],
    now: u64,
) -> Result<&'db mut SetValue, CommandReply> {
    if db.lookup(key, now).is_none() {
        let _ = db.upsert(key, Value::Set(SetValue::new()));
    }
    match db.lookup_mut(key, now) {
        Some(Value::Set(set)) => Ok(set),
        _ => Err(reply_wrongtype()),
    }
}

fn drop_set_if_empty(db: &mut Database, key: &[u8], now: u64) {
    let is_empty = matches!(db.lookup(key, now), Some(Value::Set(set)) if set.is_empty());
    if is_empty {
        let _ = db.remove(key);
    }
}

/// Borrows every named set at once; missing keys read as the shared empty set.
///
/// Expired keys must already be purged (via `contains`) because the borrow is non-evicting.
fn collect_sets<'db>(
    db: &'db Database,
    keys: &[Vec<u8>],
    empty: &'db SetValue,
) -> Result<Vec<&'db SetValue>, CommandReply> {
    let mut sets = Vec::with_capacity(keys.len());
    for key in keys {
        match db.peek(key) {
            Some(Value::Set(set)) => sets.push(set),
            Some(_) => return Err(reply_wrongtype()),
            None => sets.push(empty),
        }
    }
    Ok(sets)
}

pub(super) fn handle_sadd(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let members = &frame.args[1..];
    let set = match set_entry(db, key, now_unix_millis()) {
        Ok(set) => set,
        Err(error) => return error,
    };

    let mut added = 0_i64;
    for member in members {
        if set.add(member, ctx) {
            added += 1;
        }
    }
    CommandReply::Integer(added)
}

pub(super) fn handle_srem(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let now = now_unix_millis();
    let mut removed = 0_i64;
    match db.lookup_mut(key, now) {
        Some(Value::Set(set)) => {
            for member in &frame.args[1..] {
                if set.remove(member) {
                    removed += 1;
                }
            }
        }
        Some(_) => return reply_wrongtype(),
        None => return CommandReply::Integer(0),
    }
    drop_set_if_empty(db, key, now);
    CommandReply::Integer(removed)
}

pub(super) fn handle_sismember(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    match db.lookup(&frame.args[0], now_unix_millis()) {
        Some(Value::Set(set)) => CommandReply::Integer(i64::from(set.contains(&frame.args[1]))),
        Some(_) => reply_wrongtype(),
        None => CommandReply::Integer(0),
    }
}

pub(super) fn handle_smembers(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    match db.lookup(&frame.args[0], now_unix_millis()) {
        Some(Value::Set(set)) => members_reply(set.members()),
        Some(_) => reply_wrongtype(),
        None => CommandReply::Array(Vec::new()),
    }
}

pub(super) fn handle_scard(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    match db.lookup(&frame.args[0], now_unix_millis()) {
        Some(Value::Set(set)) => {
            CommandReply::Integer(i64::try_from(set.cardinality()).unwrap_or(i64::MAX))
        }
        Some(_) => reply_wrongtype(),
        None => CommandReply::Integer(0),
    }
}

pub(super) fn handle_spop(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let now = now_unix_millis();

    let count = match frame.args.get(1) {
        None => None,
        Some(raw) => match parse_i64(raw) {
            Ok(count) if count >= 0 => Some(count as usize),
            Ok(_) => {
                return CommandReply::Error(
                    "ERR value is out of range, must be positive".to_owned(),
                );
            }
            Err(()) => return reply_not_integer(),
        },
    };

    let popped = match db.lookup_mut(key, now) {
        Some(Value::Set(set)) => match count {
            None => set.pop().map(CommandReply::BulkString).unwrap_or(CommandReply::Null),
            Some(count) => members_reply(set.pop_with_count(count, ctx)),
        },
        Some(_) => return reply_wrongtype(),
        None => match count {
            None => CommandReply::Null,
            Some(_) => CommandReply::Array(Vec::new()),
        },
    };
    drop_set_if_empty(db, key, now);
    popped
}

pub(super) fn handle_srandmember(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let count = match frame.args.get(1) {
        None => None,
        Some(raw) => match parse_i64(raw) {
            Ok(count) => Some(count),
            Err(()) => return reply_not_integer(),
        },
    };

    match db.lookup(key, now_unix_millis()) {
        Some(Value::Set(set)) => match count {
            None => set
                .random_member()
                .map(CommandReply::BulkString)
                .unwrap_or(CommandReply::Null),
            Some(count) => members_reply(set.random_members_with_count(count)),
        },
        Some(_) => reply_wrongtype(),
        None => match count {
            None => CommandReply::Null,
            Some(_) => CommandReply::Array(Vec::new()),
        },
    }
}

pub(super) fn handle_sinter(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    match gather_members(db, &frame.args, SetAlgebra::Intersection, ctx) {
        Ok(members) => members_reply(members),
        Err(error) => error,
    }
}

pub(super) fn handle_sunion(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    match gather_members(db, &frame.args, SetAlgebra::Union, ctx) {
        Ok(members) => members_reply(members),
        Err(error) => error,
    }
}

pub(super) fn handle_sdiff(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    match gather_members(db, &frame.args, SetAlgebra::Difference, ctx) {
        Ok(members) => members_reply(members),
        Err(error) => error,
    }
}

pub(super) fn handle_sinterstore(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    store_algebra_result(frame, db, SetAlgebra::Intersection, ctx)
}

pub(super) fn handle_sunionstore(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    store_algebra_result(frame, db, SetAlgebra::Union, ctx)
}

pub(super) fn handle_sdiffstore(
    frame: &CommandFrame,
    db: &mut Database,
    ctx: &StoreContext,
) -> CommandReply {
    store_algebra_result(frame, db, SetAlgebra::Difference, ctx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetAlgebra {
    Intersection,
    Union,
    Difference,
}

fn gather_members(
    db: &mut Database,
    keys: &[Vec<u8>],
    algebra: SetAlgebra,
    ctx: &StoreContext,
) -> Result<Vec<Vec<u8>>, CommandReply> {
    let now = now_unix_millis();
    for key in keys {
        let _ = db.contains(key, now);
    }

    let empty = SetValue::new();
    let sets = collect_sets(db, keys, &empty)?;
    Ok(match algebra {
        SetAlgebra::Intersection => set::intersection(&sets),
        SetAlgebra::Union => set::union_of(&sets, ctx).members(),
        SetAlgebra::Difference => set::difference(&sets, ctx).members(),
    })
}

fn store_algebra_result(
    frame: &CommandFrame,
    db: &mut Database,
    algebra: SetAlgebra,
    ctx: &StoreContext,
) -> CommandReply {
    let dest = &frame.args[0];
    let members = match gather_members(db, &frame.args[1..], algebra, ctx) {
        Ok(members) => members,
        Err(error) => return error,
    };

    if members.is_empty() {
        let _ = db.remove(dest);
        return CommandReply::Integer(0);
    }

    let mut stored = SetValue::new();
    for member in &members {
        let _ = stored.add(member, ctx);
    }
    let cardinality = stored.cardinality();
    let _ = db.upsert(dest, Value::Set(stored));
    let _ = db.clear_expire(dest);
    CommandReply::Integer(i64::try_from(cardinality).unwrap_or(i64::MAX))
}

fn members_reply(members: Vec<Vec<u8>>) -> CommandReply {
    CommandReply::Array(members.into_iter().map(CommandReply::BulkString).collect())
}
