use sable_common::time::now_unix_millis;

use crate::StoreContext;
use crate::command::{CommandFrame, CommandReply};
use crate::db::Database;

pub(super) fn handle_del(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let now = now_unix_millis();
    let mut removed = 0_i64;
    for key in &frame.args {
        if db.contains(key, now) && db.remove(key).is_some() {
            removed += 1;
        }
    }
    CommandReply::Integer(removed)
}

pub(super) fn handle_exists(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let now = now_unix_millis();
    let mut present = 0_i64;
    for key in &frame.args {
        if db.contains(key, now) {
            present += 1;
        }
    }
    CommandReply::Integer(present)
}
