//! RESP frame model, serializer, and incremental frame parser.

use sable_common::error::{SableError, SableResult};

/// One RESP wire frame. Arrays may nest arbitrarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespFrame {
    /// `+...\r\n`
    Simple(String),
    /// `-...\r\n`
    Error(String),
    /// `:<decimal>\r\n`
    Integer(i64),
    /// `$<len>\r\n<bytes>\r\n`
    Bulk(Vec<u8>),
    /// `$-1\r\n`
    NullBulk,
    /// `*<count>\r\n<frames>`
    Array(Vec<RespFrame>),
    /// `*-1\r\n`
    NullArray,
}

impl RespFrame {
    /// Serializes the frame; parsing the result yields the identical frame.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut output = Vec::new();
        self.serialize_into(&mut output);
        output
    }

    fn serialize_into(&self, output: &mut Vec<u8>) {
        match self {
            Self::Simple(text) => {
                output.push(b'+');
                output.extend_from_slice(text.as_bytes());
                output.extend_from_slice(b"\r\n");
            }
            Self::Error(text) => {
                output.push(b'-');
                output.extend_from_slice(text.as_bytes());
                output.extend_from_slice(b"\r\n");
            }
            Self::Integer(value) => {
                output.extend_from_slice(format!(":{value}\r\n").as_bytes());
            }
            Self::Bulk(payload) => {
                output.extend_from_slice(format!("${}\r\n", payload.len()).as_bytes());
                output.extend_from_slice(payload);
                output.extend_from_slice(b"\r\n");
            }
            Self::NullBulk => output.extend_from_slice(b"$-1\r\n"),
            Self::Array(items) => {
                output.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.serialize_into(output);
                }
            }
            Self::NullArray => output.extend_from_slice(b"*-1\r\n"),
        }
    }

    /// Attempts to parse one complete frame from the head of `bytes`.
    ///
    /// `Ok(None)` means the input is a valid prefix of a frame; more bytes are needed and
    /// nothing is consumed.
    ///
    /// # Errors
    ///
    /// Returns `SableError::Protocol` on malformed framing. Protocol errors are fatal to the
    /// producing connection.
    pub fn parse(bytes: &[u8]) -> SableResult<Option<(RespFrame, usize)>> {
        parse_at(bytes, 0)
    }
}

fn parse_at(bytes: &[u8], pos: usize) -> SableResult<Option<(RespFrame, usize)>> {
    let Some(&type_byte) = bytes.get(pos) else {
        return Ok(None);
    };
    match type_byte {
        b'+' => parse_line_frame(bytes, pos + 1, RespFrame::Simple),
        b'-' => parse_line_frame(bytes, pos + 1, RespFrame::Error),
        b':' => {
            let Some((line, next)) = read_line(bytes, pos + 1)? else {
                return Ok(None);
            };
            let value = parse_decimal(line)?;
            Ok(Some((RespFrame::Integer(value), next)))
        }
        b'$' => parse_bulk(bytes, pos + 1),
        b'*' => parse_array(bytes, pos + 1),
        other => Err(SableError::Protocol(format!(
            "unexpected type byte 0x{other:02x}"
        ))),
    }
}

fn parse_line_frame(
    bytes: &[u8],
    pos: usize,
    build: fn(String) -> RespFrame,
) -> SableResult<Option<(RespFrame, usize)>> {
    let Some((line, next)) = read_line(bytes, pos)? else {
        return Ok(None);
    };
    let text = std::str::from_utf8(line)
        .map_err(|_| SableError::Protocol("line frame is not valid UTF-8".to_owned()))?;
    Ok(Some((build(text.to_owned()), next)))
}

fn parse_bulk(bytes: &[u8], pos: usize) -> SableResult<Option<(RespFrame, usize)>> {
    let Some((line, next)) = read_line(bytes, pos)? else {
        return Ok(None);
    };
    let length = parse_decimal(line)?;
    if length == -1 {
        return Ok(Some((RespFrame::NullBulk, next)));
    }
    let Ok(length) = usize::try_from(length) else {
        return Err(SableError::Protocol(format!("invalid bulk length {length}")));
    };

    let end = next + length;
    if bytes.len() < end + 2 {
        return Ok(None);
    }
    if &bytes[end..end + 2] != b"\r\n" {
        return Err(SableError::Protocol(
            "bulk payload is not CRLF-terminated".to_owned(),
        ));
    }
    Ok(Some((RespFrame::Bulk(bytes[next..end].to_vec()), end + 2)))
}

fn parse_array(bytes: &[u8], pos: usize) -> SableResult<Option<(RespFrame, usize)>> {
    let Some((line, next)) = read_line(bytes, pos)? else {
        return Ok(None);
    };
    let count = parse_decimal(line)?;
    if count == -1 {
        return Ok(Some((RespFrame::NullArray, next)));
    }
    let Ok(count) = usize::try_from(count) else {
        return Err(SableError::Protocol(format!("invalid array length {count}")));
    };

    let mut items = Vec::with_capacity(count.min(1024));
    let mut cursor = next;
    for _ in 0..count {
        let Some((item, item_end)) = parse_at(bytes, cursor)? else {
            return Ok(None);
        };
        items.push(item);
        cursor = item_end;
    }
    Ok(Some((RespFrame::Array(items), cursor)))
}

/// Reads up to the next CRLF; `Ok(None)` when the terminator has not arrived yet.
fn read_line(bytes: &[u8], pos: usize) -> SableResult<Option<(&[u8], usize)>> {
    let mut cursor = pos;
    loop {
        match bytes.get(cursor) {
            None => return Ok(None),
            Some(b'\r') => {
                return match bytes.get(cursor + 1) {
                    None => Ok(None),
                    Some(b'\n') => Ok(Some((&bytes[pos..cursor], cursor + 2))),
                    Some(_) => Err(SableError::Protocol(
                        "CR not followed by LF inside frame header".to_owned(),
                    )),
                };
            }
            Some(b'\n') => {
                return Err(SableError::Protocol(
                    "bare LF inside frame header".to_owned(),
                ));
            }
            Some(_) => cursor += 1,
        }
    }
}

fn parse_decimal(line: &[u8]) -> SableResult<i64> {
    let text = std::str::from_utf8(line)
        .map_err(|_| SableError::Protocol("numeric field is not valid UTF-8".to_owned()))?;
    text.parse::<i64>()
        .map_err(|_| SableError::Protocol(format!("invalid numeric field '{text}'")))
}

/// Protocol-decoded command representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name in canonical uppercase form.
    pub name: String,
    /// Raw argument payload.
    pub args: Vec<Vec<u8>>,
}
