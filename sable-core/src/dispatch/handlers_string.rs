use sable_common::time::now_unix_millis;

use super::parse_opts::{parse_set_options, set_condition_satisfied};
use super::reply_wrongtype;
use crate::StoreContext;
use crate::command::{CommandFrame, CommandReply};
use crate::db::Database;
use crate::value::Value;

pub(super) fn handle_ping(
    frame: &CommandFrame,
    _db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    if frame.args.is_empty() {
        return CommandReply::SimpleString("PONG".to_owned());
    }
    if frame.args.len() == 1 {
        return CommandReply::BulkString(frame.args[0].clone());
    }
    CommandReply::Error("ERR wrong number of arguments for 'ping' command".to_owned())
}

pub(super) fn handle_echo(
    frame: &CommandFrame,
    _db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    CommandReply::BulkString(frame.args[0].clone())
}

pub(super) fn handle_get(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    match db.lookup(key, now_unix_millis()) {
        Some(Value::Str(payload)) => CommandReply::BulkString(payload.clone()),
        Some(_) => reply_wrongtype(),
        None => CommandReply::Null,
    }
}

pub(super) fn handle_set(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let value = frame.args[1].clone();
    let options = match parse_set_options(&frame.args[2..]) {
        Ok(options) => options,
        Err(error) => return CommandReply::Error(error),
    };

    let now = now_unix_millis();
    let (key_exists, previous) = match db.lookup(key, now) {
        Some(Value::Str(payload)) => (true, Some(payload.clone())),
        Some(_) => (true, None),
        None => (false, None),
    };
    if options.return_previous && key_exists && previous.is_none() {
        return reply_wrongtype();
    }

    if !set_condition_satisfied(options.condition, key_exists) {
        if options.return_previous {
            return previous.map_or(CommandReply::Null, CommandReply::BulkString);
        }
        return CommandReply::Null;
    }

    let _ = db.upsert(key, Value::Str(value));
    if let Some(expire) = options.expire {
        let _ = db.set_expire(key, expire.deadline_ms(now));
    } else if !options.keep_ttl {
        // Plain overwrite drops any previous deadline.
        let _ = db.clear_expire(key);
    }

    if options.return_previous {
        previous.map_or(CommandReply::Null, CommandReply::BulkString)
    } else {
        CommandReply::SimpleString("OK".to_owned())
    }
}

pub(super) fn handle_strlen(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    match db.lookup(key, now_unix_millis()) {
        Some(Value::Str(payload)) => {
            CommandReply::Integer(i64::try_from(payload.len()).unwrap_or(i64::MAX))
        }
        Some(_) => reply_wrongtype(),
        None => CommandReply::Integer(0),
    }
}

pub(super) fn handle_type(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    match db.lookup(key, now_unix_millis()) {
        Some(value) => CommandReply::SimpleString(value.type_name().to_owned()),
        None => CommandReply::SimpleString("none".to_owned()),
    }
}
