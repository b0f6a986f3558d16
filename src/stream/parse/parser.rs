//! Line splitting and field classification.

use core::str::Utf8Error;

use bytes::{Buf, BytesMut};

use super::constants::{CR, LF};

/// Fields the frame builder cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldName {
    Event,
    Data,
    Ignored,
}

/// A complete, classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    /// Blank line: frame terminator.
    Empty,
    /// `:`-prefixed comment (often a keep-alive).
    Comment,
    /// A field line. `value` is `None` for a bare field name without a colon.
    Field {
        name: FieldName,
        value: Option<String>,
    },
}

/// Finds the next end-of-line in `bytes`.
///
/// Returns `(line_end, remainder_start)`: the non-inclusive end of the line
/// and the inclusive start of the remainder. Returns `None` if more data is
/// needed, including when the buffer ends with a lone CR that could be the
/// first half of a CRLF pair.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let first_match = memchr::memchr2(CR, LF, bytes)?;

    if bytes[first_match] == LF {
        return Some((first_match, first_match + 1));
    }

    match bytes.get(first_match + 1) {
        None => None,
        Some(&LF) => Some((first_match, first_match + 2)),
        Some(_) => Some((first_match, first_match + 1)),
    }
}

fn field_name(name: &[u8]) -> FieldName {
    match name {
        b"event" => FieldName::Event,
        b"data" => FieldName::Data,
        _ => FieldName::Ignored,
    }
}

fn to_string(bytes: &[u8]) -> Result<String, Utf8Error> {
    core::str::from_utf8(bytes).map(str::to_string)
}

fn classify(line: &[u8]) -> Result<Line, Utf8Error> {
    if line.is_empty() {
        return Ok(Line::Empty);
    }

    let Some(colon_pos) = memchr::memchr(b':', line) else {
        return Ok(Line::Field {
            name: field_name(line),
            value: None,
        });
    };

    if colon_pos == 0 {
        return Ok(Line::Comment);
    }

    let name = field_name(&line[..colon_pos]);
    if name == FieldName::Ignored {
        return Ok(Line::Field { name, value: None });
    }

    let value = &line[colon_pos + 1..];
    // Strip a single leading space if present.
    let value = match value {
        [b' ', rest @ ..] => rest,
        _ => value,
    };

    Ok(Line::Field {
        name,
        value: Some(to_string(value)?),
    })
}

/// Reads the next complete line from the buffer and advances past its EOL.
///
/// Returns `None` if the buffer holds no complete line yet; the partial tail
/// stays buffered for the next chunk.
pub(crate) fn parse_line_from_buffer(buffer: &mut BytesMut) -> Option<Result<Line, Utf8Error>> {
    let (line_end, rem_start) = find_eol(buffer)?;

    let line = buffer.split_to(line_end);
    buffer.advance(rem_start - line_end);

    Some(classify(&line))
}
