use sable_common::time::now_unix_millis;

use super::parse_numbers::{format_f64, parse_f64, parse_i64};
use super::{reply_not_integer, reply_wrongtype};
use crate::StoreContext;
use crate::command::{CommandFrame, CommandReply};
use crate::db::Database;
use crate::dict::Dict;
use crate::value::Value;

/// Resolves `key` to its hash dictionary, creating an empty one when the key is absent.
///
/// `Err` carries the WRONGTYPE reply when the key holds another value type.
fn hash_entry<'db>(
    db: &'db mut Database,
    key: &[u8],
    now: u64,
) -> Result<&'db mut Dict<Vec<u8>>, CommandReply> {
    let sip_key = db.sip_key();
    if db.lookup(key, now).is_none() {
        let _ = db.upsert(key, Value::Hash(Dict::new(sip_key)));
    }
    match db.lookup_mut(key, now) {
        Some(Value::Hash(fields)) => Ok(fields),
        Some(_) => Err(reply_wrongtype()),
        None => Err(reply_wrongtype()),
    }
}

/// Read-only variant: a missing key behaves as an empty hash.
fn hash_lookup<'db>(
    db: &'db mut Database,
    key: &[u8],
    now: u64,
) -> Result<Option<&'db Dict<Vec<u8>>>, CommandReply> {
    match db.lookup(key, now) {
        Some(Value::Hash(fields)) => Ok(Some(fields)),
        Some(_) => Err(reply_wrongtype()),
        None => Ok(None),
    }
}

/// Removes the key once its last field is gone, keeping the keyspace free of empty hashes.
fn drop_hash_if_empty(db: &mut Database, key: &[u8], now: u64) {
    let is_empty = matches!(db.lookup(key, now), Some(Value::Hash(fields)) if fields.is_empty());
    if is_empty {
        let _ = db.remove(key);
    }
}

pub(super) fn handle_hset(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    if !(frame.args.len() - 1).is_multiple_of(2) {
        return CommandReply::Error("ERR wrong number of arguments for 'hset' command".to_owned());
    }
    let key = &frame.args[0];
    let fields = match hash_entry(db, key, now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };

    let mut created = 0_i64;
    for pair in frame.args[1..].chunks_exact(2) {
        if fields.insert(pair[0].clone(), pair[1].clone()).is_none() {
            created += 1;
        }
    }
    CommandReply::Integer(created)
}

pub(super) fn handle_hsetnx(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let field = &frame.args[1];
    let fields = match hash_entry(db, key, now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };

    if fields.contains(field) {
        return CommandReply::Integer(0);
    }
    let _ = fields.insert(field.clone(), frame.args[2].clone());
    CommandReply::Integer(1)
}

pub(super) fn handle_hget(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let fields = match hash_lookup(db, &frame.args[0], now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    fields
        .and_then(|fields| fields.peek(&frame.args[1]))
        .map_or(CommandReply::Null, |value| {
            CommandReply::BulkString(value.clone())
        })
}

pub(super) fn handle_hmget(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let fields = match hash_lookup(db, &frame.args[0], now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let values = frame.args[1..]
        .iter()
        .map(|field| {
            fields
                .and_then(|fields| fields.peek(field))
                .map_or(CommandReply::Null, |value| {
                    CommandReply::BulkString(value.clone())
                })
        })
        .collect();
    CommandReply::Array(values)
}

pub(super) fn handle_hgetall(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let fields = match hash_lookup(db, &frame.args[0], now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let mut pairs = Vec::new();
    if let Some(fields) = fields {
        fields.iterate(|field, value| {
            pairs.push(CommandReply::BulkString(field.to_vec()));
            pairs.push(CommandReply::BulkString(value.clone()));
        });
    }
    CommandReply::Array(pairs)
}

pub(super) fn handle_hkeys(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    collect_hash_side(frame, db, |field, _| field.to_vec())
}

pub(super) fn handle_hvals(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    collect_hash_side(frame, db, |_, value| value.clone())
}

fn collect_hash_side(
    frame: &CommandFrame,
    db: &mut Database,
    select: fn(&[u8], &Vec<u8>) -> Vec<u8>,
) -> CommandReply {
    let fields = match hash_lookup(db, &frame.args[0], now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let mut collected = Vec::new();
    if let Some(fields) = fields {
        fields.iterate(|field, value| {
            collected.push(CommandReply::BulkString(select(field, value)));
        });
    }
    CommandReply::Array(collected)
}

pub(super) fn handle_hdel(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let now = now_unix_millis();
    let mut removed = 0_i64;
    match db.lookup_mut(key, now) {
        Some(Value::Hash(fields)) => {
            for field in &frame.args[1..] {
                if fields.remove(field).is_some() {
                    removed += 1;
                }
            }
        }
        Some(_) => return reply_wrongtype(),
        None => return CommandReply::Integer(0),
    }
    drop_hash_if_empty(db, key, now);
    CommandReply::Integer(removed)
}

pub(super) fn handle_hexists(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let fields = match hash_lookup(db, &frame.args[0], now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let present = fields.is_some_and(|fields| fields.contains(&frame.args[1]));
    CommandReply::Integer(i64::from(present))
}

pub(super) fn handle_hlen(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let fields = match hash_lookup(db, &frame.args[0], now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let length = fields.map_or(0, Dict::len);
    CommandReply::Integer(i64::try_from(length).unwrap_or(i64::MAX))
}

pub(super) fn handle_hstrlen(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let fields = match hash_lookup(db, &frame.args[0], now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let length = fields
        .and_then(|fields| fields.peek(&frame.args[1]))
        .map_or(0, Vec::len);
    CommandReply::Integer(i64::try_from(length).unwrap_or(i64::MAX))
}

pub(super) fn handle_hincrby(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let field = &frame.args[1];
    let Ok(delta) = parse_i64(&frame.args[2]) else {
        return reply_not_integer();
    };

    let fields = match hash_entry(db, key, now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let current = match fields.peek(field) {
        Some(raw) => match parse_i64(raw) {
            Ok(current) => current,
            Err(()) => {
                return CommandReply::Error("ERR hash value is not an integer".to_owned());
            }
        },
        None => 0,
    };

    let Some(next) = current.checked_add(delta) else {
        return CommandReply::Error("ERR increment or decrement would overflow".to_owned());
    };
    let _ = fields.insert(field.clone(), next.to_string().into_bytes());
    CommandReply::Integer(next)
}

pub(super) fn handle_hincrbyfloat(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let field = &frame.args[1];
    let Ok(delta) = parse_f64(&frame.args[2]) else {
        return CommandReply::Error("ERR value is not a valid float".to_owned());
    };

    let fields = match hash_entry(db, key, now_unix_millis()) {
        Ok(fields) => fields,
        Err(error) => return error,
    };
    let current = match fields.peek(field) {
        Some(raw) => match parse_f64(raw) {
            Ok(current) => current,
            Err(()) => {
                return CommandReply::Error("ERR value is not a valid float".to_owned());
            }
        },
        None => 0.0,
    };

    let next = current + delta;
    if next.is_nan() || next.is_infinite() {
        return CommandReply::Error("ERR increment would produce NaN or Infinity".to_owned());
    }
    let formatted = format_f64(next);
    let _ = fields.insert(field.clone(), formatted.clone().into_bytes());
    CommandReply::BulkString(formatted.into_bytes())
}
