/*
 * hexdump.rs
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

//! Hex/ASCII dump of wire payloads for `trace` level logging.

use std::fmt::Write;

const WIDTH: usize = 16;

/// Classic 16-byte-per-row dump: offset, hex bytes (split after the 8th), printable ASCII.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(WIDTH).enumerate() {
        let _ = write!(out, "{:05X}   ", row * WIDTH);
        for i in 0..WIDTH {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02X} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str("  ");
        for &b in chunk {
            out.push(if (32..=126).contains(&b) { b as char } else { '.' });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_dumps_nothing() {
        assert_eq!(hexdump(b""), "");
    }

    #[test]
    fn short_row_is_padded() {
        let dump = hexdump(b"OK\r\n");
        assert!(dump.starts_with("00000   4F 4B 0D 0A "));
        assert!(dump.ends_with("  OK..\n"));
    }

    #[test]
    fn rows_advance_offset() {
        let data: Vec<u8> = (0u8..20).collect();
        let dump = hexdump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00010   10 11 12 13 "));
    }
}
