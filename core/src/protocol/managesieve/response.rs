/*
 * response.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of mgsieve, a ManageSieve client.
 *
 * mgsieve is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * mgsieve is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with mgsieve.  If not, see <http://www.gnu.org/licenses/>.
 */

//! ManageSieve response parsing.
//!
//! A response is any number of payload lines and literal blocks followed by one status line
//! (`OK`, `NO` or `BYE`). A line ending in `{N}` or `{N+}` switches to N-byte mode; once the
//! N bytes are read, the rest of that logical line is read in line mode and kept as the
//! literal's suffix (an empty remainder, the usual CRLF, is dropped). A status line may itself
//! end in a literal, which then carries its message.
//!
//! The reader functions are generic over `AsyncBufRead` so the same state machine serves the
//! live transport and in-memory test input.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};
use tracing::{trace, Level};

use super::error::TransportError;
use super::hexdump::hexdump;

/// Longest line accepted before the stream is considered out of sync.
pub const MAX_LINE_LENGTH: u64 = 64 * 1024;

/// Response status: the first token of the terminating line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bye,
}

impl Status {
    /// Case-insensitive match of a status token.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("OK") {
            Some(Status::Ok)
        } else if token.eq_ignore_ascii_case("NO") {
            Some(Status::No)
        } else if token.eq_ignore_ascii_case("BYE") {
            Some(Status::Bye)
        } else {
            None
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::No => "NO",
            Status::Bye => "BYE",
        })
    }
}

/// Parsed terminating line: status, optional resp-code and human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub status: Status,
    /// Resp-code without its brackets, e.g. `QUOTA/MAXSIZE` or `SASL "..."`.
    pub code: Option<String>,
    /// Message with quoting removed; empty when the server sent none.
    pub message: String,
}

impl StatusLine {
    /// Parse a line whose first token is a status; `None` for payload lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start();
        let end = line
            .find(|c: char| c.is_ascii_whitespace() || c == '(' || c == '[')
            .unwrap_or(line.len());
        let status = Status::from_token(&line[..end])?;
        let mut rest = line[end..].trim_start();
        let mut code = None;
        if let Some(close) = match rest.chars().next() {
            Some('(') => find_close(rest, ')'),
            Some('[') => find_close(rest, ']'),
            _ => None,
        } {
            code = Some(rest[1..close].trim().to_string());
            rest = rest[close + 1..].trim_start();
        }
        let message = match parse_quoted(rest) {
            Some((text, _)) => text,
            None => rest.trim_end().to_string(),
        };
        Some(StatusLine {
            status,
            code,
            message,
        })
    }
}

/// Index of the bracket closing `s[0]`, skipping quoted strings.
fn find_close(s: &str, close: char) -> Option<usize> {
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
        } else if c == '"' {
            in_quote = true;
        } else if c == close {
            return Some(i);
        }
    }
    None
}

/// Parse a quoted string at the start of `s`, undoing `\\` and `\"` escapes.
/// Returns the unescaped text and the remainder after the closing quote.
pub fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some((out, &body[i + 1..]));
        } else {
            out.push(c);
        }
    }
    None
}

/// A payload element preceding the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseItem {
    Line(String),
    /// `prefix` is the line text before the `{N}` marker, `suffix` the non-empty rest of the
    /// logical line after the N bytes.
    Literal {
        prefix: String,
        data: Vec<u8>,
        suffix: Option<String>,
    },
}

impl ResponseItem {
    /// Human-readable text of the item (literal bytes decoded lossily).
    pub fn text(&self) -> String {
        match self {
            ResponseItem::Line(line) => line.clone(),
            ResponseItem::Literal {
                prefix,
                data,
                suffix,
            } => {
                let mut parts = Vec::new();
                let prefix = prefix.trim();
                if !prefix.is_empty() {
                    parts.push(prefix.to_string());
                }
                parts.push(String::from_utf8_lossy(data).into_owned());
                if let Some(s) = suffix {
                    parts.push(s.trim().to_string());
                }
                parts.join(" ")
            }
        }
    }
}

/// A complete response: payload items in server order plus the terminating status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub items: Vec<ResponseItem>,
    pub status: StatusLine,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.status.status == Status::Ok
    }

    /// Plain payload lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            ResponseItem::Line(l) => Some(l.as_str()),
            ResponseItem::Literal { .. } => None,
        })
    }

    /// Literal block bodies.
    pub fn literals(&self) -> impl Iterator<Item = &[u8]> {
        self.items.iter().filter_map(|item| match item {
            ResponseItem::Literal { data, .. } => Some(data.as_slice()),
            ResponseItem::Line(_) => None,
        })
    }

    /// Everything the server said, payload first, joined with newlines.
    pub fn diagnostic(&self) -> String {
        let mut parts: Vec<String> = self
            .items
            .iter()
            .map(ResponseItem::text)
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !self.status.message.is_empty() {
            parts.push(self.status.message.clone());
        }
        parts.join("\n")
    }
}

/// Split a trailing literal marker off a line.
///
/// Returns the text before the marker and the declared length. A line not ending in
/// `{digits}` or `{digits+}` is plain text; a length that does not fit is a desync.
pub fn split_literal_marker(line: &str) -> Result<(&str, Option<u64>), TransportError> {
    let Some(inner_end) = line.strip_suffix('}') else {
        return Ok((line, None));
    };
    let Some(open) = inner_end.rfind('{') else {
        return Ok((line, None));
    };
    let inner = &inner_end[open + 1..];
    let digits = inner.strip_suffix('+').unwrap_or(inner);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok((line, None));
    }
    let len = digits
        .parse::<u64>()
        .map_err(|_| TransportError::Desync(format!("literal length out of range: {{{}}}", inner)))?;
    Ok((&line[..open], Some(len)))
}

/// Read one line, accepting CRLF or bare LF. The terminator is stripped.
pub async fn read_line<R>(reader: &mut R) -> Result<String, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LENGTH + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Err(TransportError::Closed);
    }
    if buf.last() != Some(&b'\n') {
        if buf.len() as u64 > MAX_LINE_LENGTH {
            return Err(TransportError::Desync("line too long".to_string()));
        }
        return Err(TransportError::Closed);
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    let line = String::from_utf8_lossy(&buf).into_owned();
    trace!("S: {}", line);
    Ok(line)
}

/// Read exactly `len` literal bytes.
pub async fn read_literal<R>(reader: &mut R, len: u64) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::with_capacity(len.min(1 << 20) as usize);
    let received = (&mut *reader).take(len).read_to_end(&mut data).await? as u64;
    if received < len {
        return Err(TransportError::Truncated {
            expected: len,
            received,
        });
    }
    if tracing::enabled!(Level::TRACE) {
        trace!("S: literal {} bytes\n{}", len, hexdump(&data));
    }
    Ok(data)
}

/// Read one complete response.
///
/// `first` is a line the caller has already consumed (e.g. while checking for a SASL
/// challenge); it is processed before anything else is read. Blank lines are skipped.
pub async fn read_response_from<R>(
    reader: &mut R,
    mut first: Option<String>,
) -> Result<Response, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut items = Vec::new();
    loop {
        let line = match first.take() {
            Some(line) => line,
            None => read_line(reader).await?,
        };
        if line.trim().is_empty() {
            continue;
        }
        let (head, literal) = split_literal_marker(&line)?;
        if let Some(mut status) = StatusLine::parse(head) {
            if let Some(len) = literal {
                let data = read_literal(reader, len).await?;
                let tail = read_line(reader).await?;
                status.message = String::from_utf8_lossy(&data).into_owned();
                let tail = tail.trim();
                if !tail.is_empty() {
                    status.message.push(' ');
                    status.message.push_str(tail);
                }
            }
            return Ok(Response { items, status });
        }
        match literal {
            Some(len) => {
                let data = read_literal(reader, len).await?;
                let suffix = read_line(reader).await?;
                items.push(ResponseItem::Literal {
                    prefix: head.to_string(),
                    data,
                    suffix: if suffix.trim().is_empty() {
                        None
                    } else {
                        Some(suffix)
                    },
                });
            }
            None => items.push(ResponseItem::Line(line)),
        }
    }
}

/// Read one complete response with nothing pre-read.
pub async fn read_response<R>(reader: &mut R) -> Result<Response, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    read_response_from(reader, None).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bare_ok_has_no_payload() {
        let mut input: &[u8] = b"OK\r\n";
        let resp = read_response(&mut input).await.unwrap();
        assert!(resp.is_ok());
        assert!(resp.items.is_empty());
        assert_eq!(resp.status.message, "");
    }

    #[tokio::test]
    async fn literal_payload_is_exact() {
        let mut input: &[u8] = b"{5+}\r\nhello\r\nOK\r\n";
        let resp = read_response(&mut input).await.unwrap();
        assert!(resp.is_ok());
        let literals: Vec<&[u8]> = resp.literals().collect();
        assert_eq!(literals, vec![b"hello".as_slice()]);
        assert_eq!(
            resp.items[0],
            ResponseItem::Literal {
                prefix: String::new(),
                data: b"hello".to_vec(),
                suffix: None,
            }
        );
    }

    #[tokio::test]
    async fn literal_may_contain_crlf_and_status_words() {
        let mut input: &[u8] = b"{9}\r\nOK\r\nNO\r\n\r\nOK \"done\"\r\n";
        let resp = read_response(&mut input).await.unwrap();
        assert_eq!(resp.literals().next(), Some(b"OK\r\nNO\r\n\r".as_slice()));
        assert_eq!(resp.status.message, "done");
    }

    #[tokio::test]
    async fn literal_suffix_is_kept() {
        let mut input: &[u8] = b"{4}\r\nmain ACTIVE\r\nOK\r\n";
        let resp = read_response(&mut input).await.unwrap();
        match &resp.items[0] {
            ResponseItem::Literal { data, suffix, .. } => {
                assert_eq!(data, b"main");
                assert_eq!(suffix.as_deref(), Some(" ACTIVE"));
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[tokio::test]
    async fn status_with_code_and_quoted_message() {
        let mut input: &[u8] = b"NO (QUOTA/MAXSIZE) \"Quota exceeded\"\r\n";
        let resp = read_response(&mut input).await.unwrap();
        assert_eq!(resp.status.status, Status::No);
        assert_eq!(resp.status.code.as_deref(), Some("QUOTA/MAXSIZE"));
        assert_eq!(resp.status.message, "Quota exceeded");
    }

    #[tokio::test]
    async fn status_message_as_literal() {
        let mut input: &[u8] = b"NO {21}\r\nline 3: syntax error\n\r\n";
        let resp = read_response(&mut input).await.unwrap();
        assert_eq!(resp.status.status, Status::No);
        assert_eq!(resp.status.message, "line 3: syntax error\n");
    }

    #[tokio::test]
    async fn payload_lines_then_status_with_bare_lf() {
        let mut input: &[u8] = b"\"IMPLEMENTATION\" \"Dovecot\"\n\n\"SIEVE\" \"fileinto\"\nok\n";
        let resp = read_response(&mut input).await.unwrap();
        assert!(resp.is_ok());
        let lines: Vec<&str> = resp.lines().collect();
        assert_eq!(lines, vec!["\"IMPLEMENTATION\" \"Dovecot\"", "\"SIEVE\" \"fileinto\""]);
    }

    #[tokio::test]
    async fn truncated_literal_is_reported() {
        let mut input: &[u8] = b"{10}\r\nabc";
        let err = read_response(&mut input).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Truncated {
                expected: 10,
                received: 3
            }
        ));
    }

    #[tokio::test]
    async fn eof_before_status_is_closed() {
        let mut input: &[u8] = b"\"SIEVE\" \"x\"\r\n";
        let err = read_response(&mut input).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn pre_read_line_is_used_first() {
        let mut input: &[u8] = b"";
        let resp = read_response_from(&mut input, Some("BYE \"Too many errors\"".into()))
            .await
            .unwrap();
        assert_eq!(resp.status.status, Status::Bye);
        assert_eq!(resp.status.message, "Too many errors");
    }

    #[test]
    fn literal_marker_forms() {
        assert_eq!(split_literal_marker("{12}").unwrap(), ("", Some(12)));
        assert_eq!(split_literal_marker("NO {3+}").unwrap(), ("NO ", Some(3)));
        assert_eq!(split_literal_marker("text {x}").unwrap(), ("text {x}", None));
        assert_eq!(split_literal_marker("plain").unwrap(), ("plain", None));
        assert!(split_literal_marker("{99999999999999999999999}").is_err());
    }

    #[test]
    fn status_line_rejects_payload() {
        assert!(StatusLine::parse("\"SASL\" \"PLAIN\"").is_none());
        assert!(StatusLine::parse("OKAY").is_none());
        let s = StatusLine::parse("OK [WARNINGS] line 2: unused").unwrap();
        assert_eq!(s.code.as_deref(), Some("WARNINGS"));
        assert_eq!(s.message, "line 2: unused");
    }

    #[test]
    fn quoted_unescape() {
        let (text, rest) = parse_quoted(r#""a \"b\" \\c" ACTIVE"#).unwrap();
        assert_eq!(text, r#"a "b" \c"#);
        assert_eq!(rest, " ACTIVE");
        assert!(parse_quoted("\"open").is_none());
    }
}
