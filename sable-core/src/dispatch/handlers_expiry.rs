use sable_common::time::now_unix_millis;

use super::parse_numbers::parse_i64;
use super::reply_not_integer;
use crate::StoreContext;
use crate::command::{CommandFrame, CommandReply};
use crate::db::Database;

pub(super) fn handle_ttl(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    match remaining_millis(frame, db) {
        TtlState::Missing => CommandReply::Integer(-2),
        TtlState::NoDeadline => CommandReply::Integer(-1),
        TtlState::Remaining(millis) => {
            let seconds = millis.saturating_add(999) / 1000;
            CommandReply::Integer(i64::try_from(seconds).unwrap_or(i64::MAX))
        }
    }
}

pub(super) fn handle_pttl(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    match remaining_millis(frame, db) {
        TtlState::Missing => CommandReply::Integer(-2),
        TtlState::NoDeadline => CommandReply::Integer(-1),
        TtlState::Remaining(millis) => CommandReply::Integer(i64::try_from(millis).unwrap_or(i64::MAX)),
    }
}

enum TtlState {
    Missing,
    NoDeadline,
    Remaining(u64),
}

fn remaining_millis(frame: &CommandFrame, db: &mut Database) -> TtlState {
    let key = &frame.args[0];
    let now = now_unix_millis();
    if !db.contains(key, now) {
        return TtlState::Missing;
    }
    match db.ttl_millis(key, now) {
        Some(remaining) => TtlState::Remaining(remaining),
        None => TtlState::NoDeadline,
    }
}

pub(super) fn handle_persist(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    if !db.contains(key, now_unix_millis()) {
        return CommandReply::Integer(0);
    }
    CommandReply::Integer(i64::from(db.clear_expire(key)))
}

pub(super) fn handle_expire(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    apply_relative_expire(frame, db, 1000)
}

pub(super) fn handle_pexpire(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    apply_relative_expire(frame, db, 1)
}

fn apply_relative_expire(
    frame: &CommandFrame,
    db: &mut Database,
    unit_millis: u64,
) -> CommandReply {
    let key = &frame.args[0];
    let Ok(amount) = parse_i64(&frame.args[1]) else {
        return reply_not_integer();
    };

    let now = now_unix_millis();
    if !db.contains(key, now) {
        return CommandReply::Integer(0);
    }

    // A non-positive lifetime deletes the key immediately.
    if amount <= 0 {
        let _ = db.remove(key);
        return CommandReply::Integer(1);
    }
    let Ok(amount) = u64::try_from(amount) else {
        return reply_not_integer();
    };
    let deadline = now.saturating_add(amount.saturating_mul(unit_millis));
    CommandReply::Integer(i64::from(db.set_expire(key, deadline)))
}
