/*
 * capabilities.rs
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

//! Typed views over server payload lines: capability list and LISTSCRIPTS entries.
//!
//! The raw lines stay authoritative; these are parsed on demand.

use super::response::parse_quoted;
use crate::sasl::SaslMechanism;

/// Split `"KEY" "value"` (or bare tokens) into key and optional value.
fn split_pair(line: &str) -> Option<(String, Option<String>)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (key, rest) = match parse_quoted(line) {
        Some((key, rest)) => (key, rest),
        None => {
            let end = line.find(char::is_whitespace).unwrap_or(line.len());
            (line[..end].to_string(), &line[end..])
        }
    };
    let rest = rest.trim();
    let value = if rest.is_empty() {
        None
    } else {
        Some(match parse_quoted(rest) {
            Some((v, _)) => v,
            None => rest.to_string(),
        })
    };
    Some((key, value))
}

fn words(value: Option<String>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Capabilities announced by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub implementation: Option<String>,
    pub sasl: Vec<String>,
    pub sieve: Vec<String>,
    pub starttls: bool,
    pub version: Option<String>,
    pub max_redirects: Option<u32>,
    pub notify: Vec<String>,
    pub language: Option<String>,
    pub owner: Option<String>,
    /// Anything not recognised above, in server order.
    pub others: Vec<(String, Option<String>)>,
}

impl Capabilities {
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut caps = Capabilities::default();
        for line in lines {
            let Some((key, value)) = split_pair(line.as_ref()) else {
                continue;
            };
            match key.to_ascii_uppercase().as_str() {
                "IMPLEMENTATION" => caps.implementation = value,
                "SASL" => caps.sasl = words(value),
                "SIEVE" => caps.sieve = words(value),
                "STARTTLS" => caps.starttls = true,
                "VERSION" => caps.version = value,
                "MAXREDIRECTS" => caps.max_redirects = value.and_then(|v| v.trim().parse().ok()),
                "NOTIFY" => caps.notify = words(value),
                "LANGUAGE" => caps.language = value,
                "OWNER" => caps.owner = value,
                _ => caps.others.push((key, value)),
            }
        }
        caps
    }

    pub fn supports_sasl(&self, mechanism: SaslMechanism) -> bool {
        self.sasl
            .iter()
            .any(|m| SaslMechanism::from_name(m) == Some(mechanism))
    }

    /// True if the server lists the Sieve extension (e.g. `vacation`).
    pub fn has_extension(&self, extension: &str) -> bool {
        self.sieve.iter().any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// One LISTSCRIPTS line: script name and whether it is the active one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub name: String,
    pub active: bool,
}

impl ScriptEntry {
    /// Parse `"name"` or `"name" ACTIVE`.
    pub fn parse(line: &str) -> Option<Self> {
        let (name, flag) = split_pair(line)?;
        let active = match flag.as_deref().map(str::trim) {
            None => false,
            Some(f) => f.eq_ignore_ascii_case("ACTIVE"),
        };
        Some(ScriptEntry { name, active })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOVECOT: &[&str] = &[
        "\"IMPLEMENTATION\" \"Dovecot Pigeonhole\"",
        "\"SIEVE\" \"fileinto reject envelope vacation\"",
        "\"NOTIFY\" \"mailto\"",
        "\"SASL\" \"PLAIN LOGIN\"",
        "\"STARTTLS\"",
        "\"VERSION\" \"1.0\"",
        "\"MAXREDIRECTS\" \"4\"",
        "\"X-EXPERIMENTAL\"",
    ];

    #[test]
    fn parses_dovecot_greeting() {
        let caps = Capabilities::parse(DOVECOT);
        assert_eq!(caps.implementation.as_deref(), Some("Dovecot Pigeonhole"));
        assert!(caps.starttls);
        assert!(caps.has_extension("Vacation"));
        assert!(caps.supports_sasl(SaslMechanism::Plain));
        assert_eq!(caps.max_redirects, Some(4));
        assert_eq!(caps.notify, vec!["mailto".to_string()]);
        assert_eq!(caps.others, vec![("X-EXPERIMENTAL".to_string(), None)]);
    }

    #[test]
    fn no_plain_after_tls_upgrade() {
        let caps = Capabilities::parse(&["\"SASL\" \"EXTERNAL\""]);
        assert!(!caps.supports_sasl(SaslMechanism::Plain));
        assert!(!caps.starttls);
    }

    #[test]
    fn script_entries() {
        assert_eq!(
            ScriptEntry::parse("\"vacation\" ACTIVE"),
            Some(ScriptEntry {
                name: "vacation".to_string(),
                active: true
            })
        );
        assert_eq!(
            ScriptEntry::parse("\"a \\\"b\\\"\""),
            Some(ScriptEntry {
                name: "a \"b\"".to_string(),
                active: false
            })
        );
        assert_eq!(ScriptEntry::parse("   "), None);
    }
}
