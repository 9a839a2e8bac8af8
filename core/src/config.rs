/*
 * config.rs
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

//! Server profile: the connection settings the CLI would otherwise take as flags, stored as a
//! small XML file (default `~/.mgsieve/profile.xml`). Passwords are never written.
//! All XML read/write uses the quick_xml parser/writer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use thiserror::Error;

use crate::protocol::managesieve::ConnectOptions;

/// IANA-assigned ManageSieve port.
pub const DEFAULT_PORT: u16 = 4190;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access profile: {0}")]
    Io(#[from] io::Error),
    #[error("XML error in profile: {0}")]
    Xml(String),
    #[error("invalid value for <{element}>: {value}")]
    Invalid { element: String, value: String },
}

/// Connection settings for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    pub host: String,
    pub port: u16,
    /// Expected certificate name when it differs from `host`.
    pub tls_common_name: Option<String>,
    pub ignore_tls_errors: bool,
    pub username: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
}

impl Default for ServerProfile {
    fn default() -> Self {
        ServerProfile {
            host: String::new(),
            port: DEFAULT_PORT,
            tls_common_name: None,
            ignore_tls_errors: false,
            username: None,
            connect_timeout: None,
            io_timeout: None,
        }
    }
}

impl ServerProfile {
    pub fn tls_server_name(&self) -> &str {
        self.tls_common_name.as_deref().unwrap_or(&self.host)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new(self.host.clone(), self.port)
            .with_timeouts(self.connect_timeout, self.io_timeout)
            .with_tls_server_name(self.tls_server_name())
    }
}

/// Default config directory: ~/.mgsieve.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".mgsieve"))
}

/// Default profile path: ~/.mgsieve/profile.xml.
pub fn default_profile_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("profile.xml"))
}

/// Load a profile. `Ok(None)` if the file does not exist.
pub fn load_profile(path: &Path) -> Result<Option<ServerProfile>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    parse_profile_xml(&content).map(Some)
}

fn parse_seconds(element: &str, value: &str) -> Result<Option<Duration>, ConfigError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u64>()
        .map(|s| Some(Duration::from_secs(s)))
        .map_err(|_| ConfigError::Invalid {
            element: element.to_string(),
            value: value.to_string(),
        })
}

/// Parse `<profile><host>..</host><port>..</port>...</profile>`. Unknown elements are ignored.
pub fn parse_profile_xml(content: &str) -> Result<ServerProfile, ConfigError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut profile = ServerProfile::default();
    let mut element = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(ConfigError::Xml(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| ConfigError::Xml(e.to_string()))?
                    .trim()
                    .to_string();
                match element.as_str() {
                    "host" => profile.host = text,
                    "port" => {
                        profile.port = text.parse().map_err(|_| ConfigError::Invalid {
                            element: element.clone(),
                            value: text.clone(),
                        })?
                    }
                    "tls-common-name" if !text.is_empty() => profile.tls_common_name = Some(text),
                    "ignore-tls-errors" => {
                        profile.ignore_tls_errors = matches!(text.as_str(), "true" | "yes" | "1")
                    }
                    "username" if !text.is_empty() => profile.username = Some(text),
                    "connect-timeout" => profile.connect_timeout = parse_seconds(&element, &text)?,
                    "io-timeout" => profile.io_timeout = parse_seconds(&element, &text)?,
                    _ => {}
                }
            }
            Ok(Event::End(_)) => element.clear(),
            _ => {}
        }
        buf.clear();
    }
    Ok(profile)
}

fn write_element<W: io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), ConfigError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| ConfigError::Xml(e.to_string()))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| ConfigError::Xml(e.to_string()))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| ConfigError::Xml(e.to_string()))?;
    Ok(())
}

/// Serialize a profile to XML (UTF-8).
pub fn profile_xml_to_bytes(profile: &ServerProfile) -> Result<Vec<u8>, ConfigError> {
    let mut out = Vec::new();
    let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| ConfigError::Xml(e.to_string()))?;
    writer
        .write_event(Event::Start(BytesStart::new("profile")))
        .map_err(|e| ConfigError::Xml(e.to_string()))?;
    write_element(&mut writer, "host", &profile.host)?;
    write_element(&mut writer, "port", &profile.port.to_string())?;
    if let Some(cn) = &profile.tls_common_name {
        write_element(&mut writer, "tls-common-name", cn)?;
    }
    write_element(
        &mut writer,
        "ignore-tls-errors",
        if profile.ignore_tls_errors { "true" } else { "false" },
    )?;
    if let Some(user) = &profile.username {
        write_element(&mut writer, "username", user)?;
    }
    if let Some(t) = profile.connect_timeout {
        write_element(&mut writer, "connect-timeout", &t.as_secs().to_string())?;
    }
    if let Some(t) = profile.io_timeout {
        write_element(&mut writer, "io-timeout", &t.as_secs().to_string())?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("profile")))
        .map_err(|e| ConfigError::Xml(e.to_string()))?;
    Ok(out)
}

/// Write a profile, creating the parent directory if needed.
pub fn save_profile(path: &Path, profile: &ServerProfile) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, profile_xml_to_bytes(profile)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_profile() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<profile>
  <host>sieve.example.org</host>
  <port>2000</port>
  <tls-common-name>mail.example.org</tls-common-name>
  <ignore-tls-errors>true</ignore-tls-errors>
  <username>tim &amp; co</username>
  <io-timeout>30</io-timeout>
  <colour>blue</colour>
</profile>"#;
        let p = parse_profile_xml(xml).unwrap();
        assert_eq!(p.host, "sieve.example.org");
        assert_eq!(p.port, 2000);
        assert_eq!(p.tls_server_name(), "mail.example.org");
        assert!(p.ignore_tls_errors);
        assert_eq!(p.username.as_deref(), Some("tim & co"));
        assert_eq!(p.io_timeout, Some(Duration::from_secs(30)));
        assert_eq!(p.connect_timeout, None);
    }

    #[test]
    fn defaults_apply_to_missing_elements() {
        let p = parse_profile_xml("<profile><host>h</host></profile>").unwrap();
        assert_eq!(p.port, DEFAULT_PORT);
        assert_eq!(p.tls_server_name(), "h");
        assert!(!p.ignore_tls_errors);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = parse_profile_xml("<profile><port>99999</port></profile>").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("mgsieve-config-{}", std::process::id()));
        let path = dir.join("profile.xml");
        let profile = ServerProfile {
            host: "localhost".to_string(),
            username: Some("user\"<1>".to_string()),
            connect_timeout: Some(Duration::from_secs(5)),
            ..ServerProfile::default()
        };
        save_profile(&path, &profile).unwrap();
        let loaded = load_profile(&path).unwrap();
        let _ = fs::remove_dir_all(&dir);
        assert_eq!(loaded, Some(profile));
    }

    #[test]
    fn missing_file_is_none() {
        let path = std::env::temp_dir().join("mgsieve-no-such-dir/profile.xml");
        assert!(load_profile(&path).unwrap().is_none());
    }

    #[test]
    fn options_carry_common_name() {
        let profile = ServerProfile {
            host: "10.0.0.1".to_string(),
            tls_common_name: Some("sieve.example.org".to_string()),
            ..ServerProfile::default()
        };
        let options = profile.connect_options();
        assert_eq!(options.host, "10.0.0.1");
        assert_eq!(options.port, DEFAULT_PORT);
        assert_eq!(options.tls_server_name.as_deref(), Some("sieve.example.org"));

        let bare = ServerProfile {
            host: "sieve.example.net".to_string(),
            ..ServerProfile::default()
        };
        assert_eq!(
            bare.connect_options().tls_server_name.as_deref(),
            Some("sieve.example.net")
        );
    }
}
