use std::str;

pub(super) fn parse_i64(payload: &[u8]) -> Result<i64, ()> {
    let Ok(text) = str::from_utf8(payload) else {
        return Err(());
    };
    text.parse::<i64>().map_err(|_| ())
}

pub(super) fn parse_u64(payload: &[u8]) -> Result<u64, ()> {
    let Ok(text) = str::from_utf8(payload) else {
        return Err(());
    };
    text.parse::<u64>().map_err(|_| ())
}

pub(super) fn parse_f64(payload: &[u8]) -> Result<f64, ()> {
    let Ok(text) = str::from_utf8(payload) else {
        return Err(());
    };
    text.parse::<f64>().map_err(|_| ())
}

/// Formats a float the way replies expect: integral values without a fraction, others with the
/// shortest representation that round-trips.
pub(super) fn format_f64(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e17 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Resolves possibly-negative `start`/`end` indices against a buffer of `len` units.
///
/// Returns `None` when the normalized range selects nothing.
pub(super) fn normalize_range(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }

    let len_i64 = i64::try_from(len).unwrap_or(i64::MAX);
    let mut start = if start < 0 {
        len_i64.saturating_add(start)
    } else {
        start
    };
    let mut end = if end < 0 {
        len_i64.saturating_add(end)
    } else {
        end
    };

    if start < 0 {
        start = 0;
    }
    if end < 0 {
        end = 0;
    }
    if start >= len_i64 {
        return None;
    }
    if end >= len_i64 {
        end = len_i64.saturating_sub(1);
    }
    if start > end {
        return None;
    }

    let start_index = usize::try_from(start).ok()?;
    let end_index = usize::try_from(end).ok()?;
    Some((start_index, end_index))
}

#[cfg(test)]
mod tests {
    use super::{format_f64, normalize_range, parse_i64};
    use googletest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"42".as_slice(), Ok(42))]
    #[case(b"-9".as_slice(), Ok(-9))]
    #[case(b"4.5".as_slice(), Err(()))]
    #[case(b"".as_slice(), Err(()))]
    #[case(b"\xff".as_slice(), Err(()))]
    fn integer_parsing_rejects_non_integers(#[case] payload: &[u8], #[case] expected: std::result::Result<i64, ()>) {
        assert_that!(parse_i64(payload), eq(expected));
    }

    #[rstest]
    #[case(0, -1, 10, Some((0, 9)))]
    #[case(-3, -1, 10, Some((7, 9)))]
    #[case(5, 3, 10, None)]
    #[case(0, 100, 10, Some((0, 9)))]
    // Both indices clamp to the first unit when they underflow the buffer.
    #[case(-100, -100, 10, Some((0, 0)))]
    #[case(-100, -11, 10, Some((0, 0)))]
    #[case(0, 0, 0, None)]
    fn range_normalization_handles_negative_indices(
        #[case] start: i64,
        #[case] end: i64,
        #[case] len: usize,
        #[case] expected: Option<(usize, usize)>,
    ) {
        assert_that!(normalize_range(start, end, len), eq(expected));
    }

    #[rstest]
    #[case(5.0, "5")]
    #[case(-2.0, "-2")]
    #[case(10.5, "10.5")]
    #[case(3.0e-5, "0.00003")]
    fn float_formatting_trims_integral_values(#[case] value: f64, #[case] expected: &str) {
        assert_that!(format_f64(value).as_str(), eq(expected));
    }
}
