use super::parse_numbers::parse_i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SetCondition {
    Always,
    IfMissing,
    IfExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SetExpire {
    Seconds(u64),
    Milliseconds(u64),
}

impl SetExpire {
    /// Absolute unix-millisecond deadline relative to `now`.
    pub(super) fn deadline_ms(self, now: u64) -> u64 {
        match self {
            Self::Seconds(seconds) => now.saturating_add(seconds.saturating_mul(1000)),
            Self::Milliseconds(milliseconds) => now.saturating_add(milliseconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) struct SetOptions {
    pub(super) condition: SetCondition,
    pub(super) return_previous: bool,
    pub(super) keep_ttl: bool,
    pub(super) expire: Option<SetExpire>,
}

impl Default for SetCondition {
    fn default() -> Self {
        Self::Always
    }
}

pub(super) fn parse_set_options(args: &[Vec<u8>]) -> Result<SetOptions, String> {
    let mut options = SetOptions::default();
    let mut index = 0_usize;

    while let Some(arg) = args.get(index) {
        if arg.eq_ignore_ascii_case(b"NX") {
            if options.condition == SetCondition::IfExists {
                return Err("ERR syntax error".to_owned());
            }
            options.condition = SetCondition::IfMissing;
            index += 1;
            continue;
        }
        if arg.eq_ignore_ascii_case(b"XX") {
            if options.condition == SetCondition::IfMissing {
                return Err("ERR syntax error".to_owned());
            }
            options.condition = SetCondition::IfExists;
            index += 1;
            continue;
        }
        if arg.eq_ignore_ascii_case(b"GET") {
            options.return_previous = true;
            index += 1;
            continue;
        }
        if arg.eq_ignore_ascii_case(b"KEEPTTL") {
            options.keep_ttl = true;
            index += 1;
            continue;
        }
        if arg.eq_ignore_ascii_case(b"EX") || arg.eq_ignore_ascii_case(b"PX") {
            if options.expire.is_some() {
                return Err("ERR syntax error".to_owned());
            }
            let Some(raw_expire) = args.get(index + 1) else {
                return Err("ERR syntax error".to_owned());
            };
            let Ok(expire) = parse_i64(raw_expire) else {
                return Err("ERR value is not an integer or out of range".to_owned());
            };
            if expire <= 0 {
                return Err("ERR invalid expire time in 'SET' command".to_owned());
            }
            let Ok(expire) = u64::try_from(expire) else {
                return Err("ERR value is not an integer or out of range".to_owned());
            };

            options.expire = if arg.eq_ignore_ascii_case(b"EX") {
                Some(SetExpire::Seconds(expire))
            } else {
                Some(SetExpire::Milliseconds(expire))
            };
            index += 2;
            continue;
        }

        return Err("ERR syntax error".to_owned());
    }

    if options.keep_ttl && options.expire.is_some() {
        return Err("ERR syntax error".to_owned());
    }
    Ok(options)
}

pub(super) fn set_condition_satisfied(condition: SetCondition, key_exists: bool) -> bool {
    match condition {
        SetCondition::Always => true,
        SetCondition::IfMissing => !key_exists,
        SetCondition::IfExists => key_exists,
    }
}
