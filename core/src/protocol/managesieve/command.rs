/*
 * command.rs
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

//! Command encoding.
//!
//! Strings go on the wire quoted, with `\` and `"` escaped. A value that cannot be quoted
//! (it contains CR, LF or NUL) is sent as a non-synchronizing literal `{N+}` instead, so an
//! argument can never terminate the command line early.

/// One command argument.
#[derive(Debug, Clone)]
enum Arg<'a> {
    Str(&'a str),
    Number(u64),
    Literal(&'a [u8]),
    /// Quoted like `Str`, but hidden from logs.
    Secret(String),
}

/// A ManageSieve command ready to be encoded.
#[derive(Debug, Clone)]
pub struct Command<'a> {
    name: &'static str,
    args: Vec<Arg<'a>>,
}

impl<'a> Command<'a> {
    pub fn new(name: &'static str) -> Self {
        Command {
            name,
            args: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn string(mut self, value: &'a str) -> Self {
        self.args.push(Arg::Str(value));
        self
    }

    pub fn number(mut self, value: u64) -> Self {
        self.args.push(Arg::Number(value));
        self
    }

    pub fn literal(mut self, data: &'a [u8]) -> Self {
        self.args.push(Arg::Literal(data));
        self
    }

    pub fn secret_string(mut self, value: String) -> Self {
        self.args.push(Arg::Secret(value));
        self
    }

    /// Wire bytes, CRLF-terminated.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + 2 + self.payload_len());
        out.extend_from_slice(self.name.as_bytes());
        for arg in &self.args {
            out.push(b' ');
            match arg {
                Arg::Str(s) => encode_string(&mut out, s.as_bytes()),
                Arg::Secret(s) => encode_string(&mut out, s.as_bytes()),
                Arg::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
                Arg::Literal(data) => encode_literal(&mut out, data),
            }
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Loggable form: secrets masked, literals shown by size only.
    pub fn redacted(&self) -> String {
        let mut out = String::from(self.name);
        for arg in &self.args {
            out.push(' ');
            match arg {
                Arg::Str(s) if needs_literal(s.as_bytes()) => {
                    out.push_str(&format!("{{{}+}}", s.len()))
                }
                Arg::Str(s) => out.push_str(&quote(s)),
                Arg::Secret(_) => out.push_str("\"***\""),
                Arg::Number(n) => out.push_str(&n.to_string()),
                Arg::Literal(data) => out.push_str(&format!("{{{}+}}", data.len())),
            }
        }
        out
    }

    fn payload_len(&self) -> usize {
        self.args
            .iter()
            .map(|a| match a {
                Arg::Str(s) => s.len() + 16,
                Arg::Secret(s) => s.len() + 16,
                Arg::Number(_) => 21,
                Arg::Literal(d) => d.len() + 32,
            })
            .sum()
    }
}

fn needs_literal(value: &[u8]) -> bool {
    value.iter().any(|&b| b == b'\r' || b == b'\n' || b == 0)
}

fn encode_string(out: &mut Vec<u8>, value: &[u8]) {
    if needs_literal(value) {
        encode_literal(out, value);
        return;
    }
    out.push(b'"');
    for &b in value {
        if b == b'"' || b == b'\\' {
            out.push(b'\\');
        }
        out.push(b);
    }
    out.push(b'"');
}

/// `{N+}` CRLF followed by the raw bytes. The caller's line terminator follows the data.
fn encode_literal(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(format!("{{{}+}}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
}

/// Quote a string for display or wire use (no literal fallback).
pub fn quote(value: &str) -> String {
    let mut s = String::with_capacity(value.len() + 2);
    s.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            s.push('\\');
        }
        s.push(c);
    }
    s.push('"');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_command() {
        assert_eq!(Command::new("LISTSCRIPTS").encode(), b"LISTSCRIPTS\r\n");
    }

    #[test]
    fn quoted_arguments_are_escaped() {
        let cmd = Command::new("RENAMESCRIPT").string("a\"b").string("c\\d");
        assert_eq!(cmd.encode(), b"RENAMESCRIPT \"a\\\"b\" \"c\\\\d\"\r\n");
    }

    #[test]
    fn havespace_has_number() {
        let cmd = Command::new("HAVESPACE").string("vacation").number(1234);
        assert_eq!(cmd.encode(), b"HAVESPACE \"vacation\" 1234\r\n");
    }

    #[test]
    fn putscript_literal_framing() {
        let cmd = Command::new("PUTSCRIPT").string("s").literal(b"keep;\r\n");
        assert_eq!(cmd.encode(), b"PUTSCRIPT \"s\" {7+}\r\nkeep;\r\n\r\n");
    }

    #[test]
    fn empty_literal() {
        let cmd = Command::new("CHECKSCRIPT").literal(b"");
        assert_eq!(cmd.encode(), b"CHECKSCRIPT {0+}\r\n\r\n");
    }

    #[test]
    fn line_breaks_in_strings_become_literals() {
        let cmd = Command::new("NOOP").string("x\r\nLOGOUT");
        assert_eq!(cmd.encode(), b"NOOP {9+}\r\nx\r\nLOGOUT\r\n");
    }

    #[test]
    fn literal_length_counts_bytes_not_chars() {
        let cmd = Command::new("CHECKSCRIPT").literal("é".as_bytes());
        assert_eq!(cmd.encode(), "CHECKSCRIPT {2+}\r\né\r\n".as_bytes());
    }

    #[test]
    fn redacted_hides_secret() {
        let cmd = Command::new("AUTHENTICATE")
            .string("PLAIN")
            .secret_string("AHVzZXIAcGFzcw==".to_string());
        assert_eq!(cmd.redacted(), "AUTHENTICATE \"PLAIN\" \"***\"");
        assert!(String::from_utf8(cmd.encode()).unwrap().contains("AHVzZXIAcGFzcw=="));
    }
}
