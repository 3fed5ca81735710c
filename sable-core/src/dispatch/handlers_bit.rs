use sable_common::time::now_unix_millis;

use super::parse_numbers::{normalize_range, parse_i64};
use super::{reply_syntax_error, reply_wrongtype};
use crate::StoreContext;
use crate::bitops::{
    BitOp, apply_bitop, count_bits_in_bit_range, find_bit_in_bit_range, get_bit,
    read_field_unsigned, set_bit, write_field_unsigned,
};
use crate::command::{CommandFrame, CommandReply};
use crate::db::Database;
use crate::value::Value;

/// Bit offsets are capped at 2^32 - 1 so a single key never exceeds 512 MiB.
const MAX_BIT_OFFSET: u64 = (1 << 32) - 1;

fn reply_bit_offset_error() -> CommandReply {
    CommandReply::Error("ERR bit offset is not an integer or out of range".to_owned())
}

fn parse_bit_offset(payload: &[u8]) -> Result<u64, CommandReply> {
    let Ok(offset) = parse_i64(payload) else {
        return Err(reply_bit_offset_error());
    };
    if offset < 0 {
        return Err(reply_bit_offset_error());
    }
    let offset = offset as u64;
    if offset > MAX_BIT_OFFSET {
        return Err(reply_bit_offset_error());
    }
    Ok(offset)
}

pub(super) fn handle_getbit(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let offset = match parse_bit_offset(&frame.args[1]) {
        Ok(offset) => offset,
        Err(error) => return error,
    };
    match db.lookup(key, now_unix_millis()) {
        Some(Value::Str(payload)) => CommandReply::Integer(i64::from(get_bit(payload, offset))),
        Some(_) => reply_wrongtype(),
        None => CommandReply::Integer(0),
    }
}

pub(super) fn handle_setbit(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let offset = match parse_bit_offset(&frame.args[1]) {
        Ok(offset) => offset,
        Err(error) => return error,
    };
    let bit = match parse_i64(&frame.args[2]) {
        Ok(0) => false,
        Ok(1) => true,
        _ => {
            return CommandReply::Error("ERR bit is not an integer or out of range".to_owned());
        }
    };

    match db.lookup_mut(key, now_unix_millis()) {
        Some(Value::Str(payload)) => {
            CommandReply::Integer(i64::from(set_bit(payload, offset, bit)))
        }
        Some(_) => reply_wrongtype(),
        None => {
            let mut payload = Vec::new();
            let previous = set_bit(&mut payload, offset, bit);
            let _ = db.upsert(key, Value::Str(payload));
            CommandReply::Integer(i64::from(previous))
        }
    }
}

pub(super) fn handle_bitop(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let Some(op) = BitOp::parse(&frame.args[0]) else {
        return reply_syntax_error();
    };
    let dest = &frame.args[1];
    let sources = &frame.args[2..];
    if op == BitOp::Not && sources.len() != 1 {
        return CommandReply::Error(
            "ERR BITOP NOT must be called with a single source key.".to_owned(),
        );
    }

    let now = now_unix_millis();
    let mut inputs = Vec::with_capacity(sources.len());
    for source in sources {
        match db.lookup(source, now) {
            Some(Value::Str(payload)) => inputs.push(payload.clone()),
            Some(_) => return reply_wrongtype(),
            None => inputs.push(Vec::new()),
        }
    }

    let borrowed = inputs.iter().map(Vec::as_slice).collect::<Vec<_>>();
    let result = apply_bitop(op, &borrowed);
    let length = result.len();
    if result.is_empty() {
        let _ = db.remove(dest);
    } else {
        let _ = db.upsert(dest, Value::Str(result));
        let _ = db.clear_expire(dest);
    }
    CommandReply::Integer(i64::try_from(length).unwrap_or(i64::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeUnit {
    Byte,
    Bit,
}

fn parse_range_unit(payload: &[u8]) -> Option<RangeUnit> {
    if payload.eq_ignore_ascii_case(b"byte") {
        Some(RangeUnit::Byte)
    } else if payload.eq_ignore_ascii_case(b"bit") {
        Some(RangeUnit::Bit)
    } else {
        None
    }
}

/// Resolves `[start end [unit]]` into an inclusive bit range over `payload`.
fn resolve_bit_range(
    payload: &[u8],
    start: i64,
    end: i64,
    unit: RangeUnit,
) -> Option<(u64, u64)> {
    match unit {
        RangeUnit::Byte => {
            let (first, last) = normalize_range(start, end, payload.len())?;
            Some((first as u64 * 8, last as u64 * 8 + 7))
        }
        RangeUnit::Bit => {
            let (first, last) = normalize_range(start, end, payload.len() * 8)?;
            Some((first as u64, last as u64))
        }
    }
}

pub(super) fn handle_bitcount(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    if frame.args.len() == 2 || frame.args.len() > 4 {
        return reply_syntax_error();
    }

    let payload = match db.lookup(key, now_unix_millis()) {
        Some(Value::Str(payload)) => payload.clone(),
        Some(_) => return reply_wrongtype(),
        None => return CommandReply::Integer(0),
    };

    let (start, end, unit) = if frame.args.len() == 1 {
        (0, -1, RangeUnit::Byte)
    } else {
        let Ok(start) = parse_i64(&frame.args[1]) else {
            return super::reply_not_integer();
        };
        let Ok(end) = parse_i64(&frame.args[2]) else {
            return super::reply_not_integer();
        };
        let unit = if frame.args.len() == 4 {
            match parse_range_unit(&frame.args[3]) {
                Some(unit) => unit,
                None => return reply_syntax_error(),
            }
        } else {
            RangeUnit::Byte
        };
        (start, end, unit)
    };

    let Some((start_bit, end_bit)) = resolve_bit_range(&payload, start, end, unit) else {
        return CommandReply::Integer(0);
    };
    let count = count_bits_in_bit_range(&payload, start_bit, end_bit);
    CommandReply::Integer(i64::try_from(count).unwrap_or(i64::MAX))
}

pub(super) fn handle_bitpos(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];
    let target = match parse_i64(&frame.args[1]) {
        Ok(0) => 0_u8,
        Ok(1) => 1_u8,
        _ => return CommandReply::Error("ERR The bit argument must be 1 or 0.".to_owned()),
    };
    if frame.args.len() > 5 {
        return reply_syntax_error();
    }

    let payload = match db.lookup(key, now_unix_millis()) {
        Some(Value::Str(payload)) => payload.clone(),
        Some(_) => return reply_wrongtype(),
        // A missing key is an all-zero string: the first clear bit is bit zero.
        None => return CommandReply::Integer(if target == 0 { 0 } else { -1 }),
    };

    let start = if frame.args.len() >= 3 {
        match parse_i64(&frame.args[2]) {
            Ok(start) => start,
            Err(()) => return super::reply_not_integer(),
        }
    } else {
        0
    };
    let explicit_end = frame.args.len() >= 4;
    let end = if explicit_end {
        match parse_i64(&frame.args[3]) {
            Ok(end) => end,
            Err(()) => return super::reply_not_integer(),
        }
    } else {
        -1
    };
    let unit = if frame.args.len() == 5 {
        match parse_range_unit(&frame.args[4]) {
            Some(unit) => unit,
            None => return reply_syntax_error(),
        }
    } else {
        RangeUnit::Byte
    };

    let Some((start_bit, end_bit)) = resolve_bit_range(&payload, start, end, unit) else {
        return CommandReply::Integer(-1);
    };
    match find_bit_in_bit_range(&payload, target, start_bit, end_bit) {
        Some(position) => CommandReply::Integer(i64::try_from(position).unwrap_or(i64::MAX)),
        // Looking for a clear bit with an open-ended range runs into the implicit
        // zero padding right past the string.
        None if target == 0 && !explicit_end => {
            CommandReply::Integer(i64::try_from(payload.len() as u64 * 8).unwrap_or(i64::MAX))
        }
        None => CommandReply::Integer(-1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Unsigned(u32),
    Signed(u32),
}

impl FieldType {
    fn width(self) -> u32 {
        match self {
            Self::Unsigned(width) | Self::Signed(width) => width,
        }
    }

    fn min(self) -> i128 {
        match self {
            Self::Unsigned(_) => 0,
            Self::Signed(width) => -(1_i128 << (width - 1)),
        }
    }

    fn max(self) -> i128 {
        match self {
            Self::Unsigned(width) => (1_i128 << width) - 1,
            Self::Signed(width) => (1_i128 << (width - 1)) - 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overflow {
    Wrap,
    Sat,
    Fail,
}

fn reply_bitfield_type_error() -> CommandReply {
    CommandReply::Error(
        "ERR Invalid bitfield type. Use something like i16 u8. Note that u64 is not supported but i64 is."
            .to_owned(),
    )
}

fn parse_field_type(payload: &[u8]) -> Option<FieldType> {
    let text = std::str::from_utf8(payload).ok()?;
    if text.len() < 2 {
        return None;
    }
    let (sign, digits) = text.split_at(1);
    let width = digits.parse::<u32>().ok()?;
    match sign {
        "u" if (1..=63).contains(&width) => Some(FieldType::Unsigned(width)),
        "i" if (1..=64).contains(&width) => Some(FieldType::Signed(width)),
        _ => None,
    }
}

fn parse_field_offset(payload: &[u8], width: u32) -> Option<u64> {
    let text = std::str::from_utf8(payload).ok()?;
    let (scaled, digits) = if let Some(rest) = text.strip_prefix('#') {
        (true, rest)
    } else {
        (false, text)
    };
    let offset = digits.parse::<u64>().ok()?;
    if scaled {
        offset.checked_mul(u64::from(width))
    } else {
        Some(offset)
    }
}

fn read_field(payload: &[u8], offset: u64, field: FieldType) -> i64 {
    let raw = read_field_unsigned(payload, offset, field.width());
    match field {
        FieldType::Unsigned(_) => raw as i64,
        FieldType::Signed(width) => sign_extend(raw, width),
    }
}

fn sign_extend(raw: u64, width: u32) -> i64 {
    if width == 64 {
        return raw as i64;
    }
    if raw & (1_u64 << (width - 1)) != 0 {
        (raw | (!0_u64 << width)) as i64
    } else {
        raw as i64
    }
}

/// Applies the overflow policy to a full-precision result; `None` means the op fails.
fn clamp_field_value(value: i128, field: FieldType, overflow: Overflow) -> Option<i64> {
    if value >= field.min() && value <= field.max() {
        return Some(value as i64);
    }
    match overflow {
        Overflow::Fail => None,
        Overflow::Sat => Some(if value < field.min() {
            field.min() as i64
        } else {
            field.max() as i64
        }),
        Overflow::Wrap => {
            let width = field.width();
            let mask = if width == 64 { !0_u128 } else { (1_u128 << width) - 1 };
            let raw = (value as u128) & mask;
            Some(match field {
                FieldType::Unsigned(_) => raw as i64,
                FieldType::Signed(_) => sign_extend(raw as u64, width),
            })
        }
    }
}

fn write_field(payload: &mut Vec<u8>, offset: u64, field: FieldType, value: i64) {
    let width = field.width();
    let mask = if width == 64 { !0_u64 } else { (1_u64 << width) - 1 };
    write_field_unsigned(payload, offset, width, (value as u64) & mask);
}

enum FieldOp {
    Get { field: FieldType, offset: u64 },
    Set { field: FieldType, offset: u64, value: i64, overflow: Overflow },
    IncrBy { field: FieldType, offset: u64, delta: i64, overflow: Overflow },
}

pub(super) fn handle_bitfield(
    frame: &CommandFrame,
    db: &mut Database,
    _ctx: &StoreContext,
) -> CommandReply {
    let key = &frame.args[0];

    // Parse the whole subcommand program before touching the key, so a malformed trailing
    // operation cannot leave earlier writes behind.
    let mut operations = Vec::new();
    let mut overflow = Overflow::Wrap;
    let mut index = 1_usize;
    while index < frame.args.len() {
        let token = &frame.args[index];
        if token.eq_ignore_ascii_case(b"overflow") {
            let Some(policy) = frame.args.get(index + 1) else {
                return reply_syntax_error();
            };
            overflow = if policy.eq_ignore_ascii_case(b"wrap") {
                Overflow::Wrap
            } else if policy.eq_ignore_ascii_case(b"sat") {
                Overflow::Sat
            } else if policy.eq_ignore_ascii_case(b"fail") {
                Overflow::Fail
            } else {
                return reply_syntax_error();
            };
            index += 2;
            continue;
        }

        let is_get = token.eq_ignore_ascii_case(b"get");
        let is_set = token.eq_ignore_ascii_case(b"set");
        let is_incrby = token.eq_ignore_ascii_case(b"incrby");
        if !is_get && !is_set && !is_incrby {
            return reply_syntax_error();
        }
        let Some(field) = frame.args.get(index + 1).and_then(|raw| parse_field_type(raw)) else {
            return reply_bitfield_type_error();
        };
        let Some(offset) = frame
            .args
            .get(index + 2)
            .and_then(|raw| parse_field_offset(raw, field.width()))
        else {
            return reply_bit_offset_error();
        };
        if offset.saturating_add(u64::from(field.width())) > MAX_BIT_OFFSET + 1 {
            return reply_bit_offset_error();
        }

        if is_get {
            operations.push(FieldOp::Get { field, offset });
            index += 3;
            continue;
        }

        let Some(argument) = frame.args.get(index + 3).map(|raw| parse_i64(raw)) else {
            return reply_syntax_error();
        };
        let Ok(argument) = argument else {
            return super::reply_not_integer();
        };
        if is_set {
            operations.push(FieldOp::Set {
                field,
                offset,
                value: argument,
                overflow,
            });
        } else {
            operations.push(FieldOp::IncrBy {
                field,
                offset,
                delta: argument,
                overflow,
            });
        }
        index += 4;
    }

    let now = now_unix_millis();
    let mut payload = match db.lookup(key, now) {
        Some(Value::Str(payload)) => payload.clone(),
        Some(_) => return reply_wrongtype(),
        None => Vec::new(),
    };

    let mut replies = Vec::with_capacity(operations.len());
    let mut dirty = false;
    for operation in operations {
        match operation {
            FieldOp::Get { field, offset } => {
                replies.push(CommandReply::Integer(read_field(&payload, offset, field)));
            }
            FieldOp::Set {
                field,
                offset,
                value,
                overflow,
            } => match clamp_field_value(i128::from(value), field, overflow) {
                Some(stored) => {
                    let previous = read_field(&payload, offset, field);
                    write_field(&mut payload, offset, field, stored);
                    dirty = true;
                    replies.push(CommandReply::Integer(previous));
                }
                None => replies.push(CommandReply::Null),
            },
            FieldOp::IncrBy {
                field,
                offset,
                delta,
                overflow,
            } => {
                let current = i128::from(read_field(&payload, offset, field));
                match clamp_field_value(current + i128::from(delta), field, overflow) {
                    Some(stored) => {
                        write_field(&mut payload, offset, field, stored);
                        dirty = true;
                        replies.push(CommandReply::Integer(stored));
                    }
                    None => replies.push(CommandReply::Null),
                }
            }
        }
    }

    if dirty {
        let _ = db.upsert(key, Value::Str(payload));
    }
    CommandReply::Array(replies)
}
