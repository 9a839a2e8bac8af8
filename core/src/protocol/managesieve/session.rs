/*
 * session.rs
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

//! ManageSieve session: greeting, STARTTLS, SASL PLAIN and script management (RFC 5804).
//!
//! Commands are strictly sequential; each takes `&mut self` and completes only when its
//! response has been fully read. A fatal transport or TLS failure, a `BYE`, or `LOGOUT` closes
//! the session, and every later command fails with [`TransportError::Closed`].

use std::time::Duration;

use rustls::pki_types::CertificateDer;
use tracing::{debug, info, warn};

use super::capabilities::Capabilities;
use super::command::{quote, Command};
use super::error::{ProtocolError, SieveError, TransportError};
use super::response::{
    parse_quoted, split_literal_marker, Response, ResponseItem, Status, StatusLine,
};
use super::transport::Transport;
use crate::config::DEFAULT_PORT;
use crate::sasl::{self, SaslMechanism};

/// Where the session is in its lifecycle. Encryption is tracked by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Authenticated,
    Closed,
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Name the server certificate must match; defaults to `host`.
    pub tls_server_name: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
    /// Trust anchors added to the platform and webpki roots.
    pub extra_roots: Vec<CertificateDer<'static>>,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectOptions {
            host: host.into(),
            port,
            tls_server_name: None,
            connect_timeout: None,
            io_timeout: None,
            extra_roots: Vec::new(),
        }
    }

    pub fn with_tls_server_name(mut self, name: impl Into<String>) -> Self {
        self.tls_server_name = Some(name.into());
        self
    }

    pub fn with_timeouts(mut self, connect: Option<Duration>, io: Option<Duration>) -> Self {
        self.connect_timeout = connect;
        self.io_timeout = io;
        self
    }

    pub fn with_extra_root(mut self, cert: CertificateDer<'static>) -> Self {
        self.extra_roots.push(cert);
        self
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions::new("localhost", DEFAULT_PORT)
    }
}

/// Turn a non-OK response into a `ProtocolError` carrying the full server text.
fn expect_ok(command: &str, response: Response) -> Result<Response, SieveError> {
    if response.is_ok() {
        return Ok(response);
    }
    Err(ProtocolError::Rejected {
        command: command.to_string(),
        status: response.status.status,
        code: response.status.code.clone(),
        message: response.diagnostic(),
    }
    .into())
}

/// Payload lines in server order. A literal item becomes its prefix, the literal data as a
/// quoted string, then its suffix.
fn payload_lines(response: &Response) -> Vec<String> {
    response
        .items
        .iter()
        .map(|item| match item {
            ResponseItem::Line(line) => line.clone(),
            ResponseItem::Literal {
                prefix,
                data,
                suffix,
            } => {
                let mut line = prefix.clone();
                line.push_str(&quote(&String::from_utf8_lossy(data)));
                if let Some(s) = suffix {
                    line.push_str(s);
                }
                line
            }
        })
        .collect()
}

/// An open ManageSieve connection.
pub struct SieveSession {
    transport: Transport,
    tls_server_name: String,
    extra_roots: Vec<CertificateDer<'static>>,
    capabilities: Vec<String>,
    state: SessionState,
}

impl SieveSession {
    /// Connect over plain TCP. Call [`read_greeting`](Self::read_greeting) next.
    pub async fn connect(host: &str, port: u16) -> Result<Self, SieveError> {
        Self::connect_with(&ConnectOptions::new(host, port)).await
    }

    pub async fn connect_with(options: &ConnectOptions) -> Result<Self, SieveError> {
        let transport = Transport::connect(
            &options.host,
            options.port,
            options.connect_timeout,
            options.io_timeout,
        )
        .await?;
        info!("ManageSieve connection to {}:{}", transport.host(), transport.port());
        Ok(SieveSession {
            transport,
            tls_server_name: options
                .tls_server_name
                .clone()
                .unwrap_or_else(|| options.host.clone()),
            extra_roots: options.extra_roots.clone(),
            capabilities: Vec::new(),
            state: SessionState::Connected,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn host(&self) -> &str {
        self.transport.host()
    }

    pub fn port(&self) -> u16 {
        self.transport.port()
    }

    /// Name the certificate is checked against on STARTTLS.
    pub fn tls_server_name(&self) -> &str {
        &self.tls_server_name
    }

    pub fn is_encrypted(&self) -> bool {
        self.transport.is_encrypted()
    }

    /// Raw capability strings from the latest greeting, CAPABILITY or STARTTLS exchange.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Parsed view of [`capabilities`](Self::capabilities).
    pub fn capability_set(&self) -> Capabilities {
        Capabilities::parse(&self.capabilities)
    }

    fn ensure_open(&self) -> Result<(), SieveError> {
        if self.state == SessionState::Closed || self.transport.is_closed() {
            return Err(TransportError::Closed.into());
        }
        Ok(())
    }

    /// Mark the session closed if `result` failed; transport errors are always fatal.
    fn check<T>(&mut self, result: Result<T, TransportError>) -> Result<T, SieveError> {
        if result.is_err() {
            self.state = SessionState::Closed;
        }
        result.map_err(SieveError::from)
    }

    async fn send(&mut self, command: &Command<'_>) -> Result<(), SieveError> {
        self.ensure_open()?;
        debug!("C: {}", command.redacted());
        let result = self.transport.write(&command.encode()).await;
        self.check(result)
    }

    async fn receive(&mut self, first: Option<String>) -> Result<Response, SieveError> {
        let result = match first {
            Some(line) => self.transport.read_response_after(line).await,
            None => self.transport.read_response().await,
        };
        let response = self.check(result)?;
        if response.status.status == Status::Bye {
            warn!("server closed the session: {}", response.status.message);
            self.close().await;
        }
        Ok(response)
    }

    /// Send a command and require `OK`.
    async fn execute(&mut self, command: Command<'_>) -> Result<Response, SieveError> {
        self.send(&command).await?;
        let response = self.receive(None).await?;
        expect_ok(command.name(), response)
    }

    /// Read the server greeting: capability lines up to the status, which must be `OK`.
    pub async fn read_greeting(&mut self) -> Result<&[String], SieveError> {
        self.ensure_open()?;
        let response = self.receive(None).await?;
        let response = expect_ok("greeting", response)?;
        self.capabilities = payload_lines(&response);
        debug!("greeting: {} capabilities", self.capabilities.len());
        Ok(&self.capabilities)
    }

    /// CAPABILITY: refresh and return the capability list.
    pub async fn capability(&mut self) -> Result<&[String], SieveError> {
        let response = self.execute(Command::new("CAPABILITY")).await?;
        self.capabilities = payload_lines(&response);
        Ok(&self.capabilities)
    }

    /// STARTTLS, then the TLS handshake, then the fresh capability list the server sends.
    ///
    /// With `verify == false` any certificate is accepted.
    pub async fn start_tls(&mut self, verify: bool) -> Result<&[String], SieveError> {
        self.ensure_open()?;
        if self.transport.is_encrypted() {
            return Err(ProtocolError::AlreadyEncrypted.into());
        }
        self.execute(Command::new("STARTTLS")).await?;
        let upgraded = self
            .transport
            .upgrade_to_tls(&self.tls_server_name, verify, &self.extra_roots)
            .await;
        if let Err(e) = upgraded {
            self.close().await;
            return Err(e);
        }
        self.capabilities.clear();
        let response = self.receive(None).await?;
        let response = expect_ok("STARTTLS", response)?;
        self.capabilities = payload_lines(&response);
        info!("TLS active, {} capabilities", self.capabilities.len());
        Ok(&self.capabilities)
    }

    /// AUTHENTICATE "PLAIN" with the initial response inline. Requires an encrypted connection.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), SieveError> {
        self.ensure_open()?;
        if self.state == SessionState::Authenticated {
            return Err(ProtocolError::AlreadyAuthenticated.into());
        }
        let mechanism = SaslMechanism::Plain;
        if mechanism.requires_tls() && !self.transport.is_encrypted() {
            return Err(ProtocolError::NotEncrypted.into());
        }
        let blob = sasl::initial_client_response_b64(mechanism, "", username, password)
            .map_err(ProtocolError::Credentials)?;
        let command = Command::new("AUTHENTICATE")
            .string(mechanism.name())
            .secret_string(blob);
        self.send(&command).await?;

        let first = loop {
            let result = self.transport.read_line().await;
            let line = self.check(result)?;
            if !line.trim().is_empty() {
                break line;
            }
        };
        let marker = split_literal_marker(&first);
        let (head, literal) = self.check(marker)?;
        if StatusLine::parse(head).is_none() {
            return self.cancel_challenge(literal).await;
        }
        let response = self.receive(Some(first)).await?;
        expect_ok("AUTHENTICATE", response)?;
        self.state = SessionState::Authenticated;
        info!("authenticated as {}", username);
        Ok(())
    }

    /// PLAIN is single-round; a server challenge is answered with `"*"` (abort).
    async fn cancel_challenge(&mut self, literal: Option<u64>) -> Result<(), SieveError> {
        if let Some(len) = literal {
            let result = self.transport.read_exact(len).await;
            self.check(result)?;
            let result = self.transport.read_line().await;
            self.check(result)?;
        }
        warn!("unexpected SASL challenge, cancelling authentication");
        let result = self.transport.write(b"\"*\"\r\n").await;
        self.check(result)?;
        let response = self.receive(None).await?;
        let status = match response.status.status {
            Status::Ok => Status::No,
            other => other,
        };
        let mut message = String::from("unexpected SASL challenge, authentication cancelled");
        let diagnostic = response.diagnostic();
        if !diagnostic.is_empty() {
            message.push_str(": ");
            message.push_str(&diagnostic);
        }
        Err(ProtocolError::Rejected {
            command: "AUTHENTICATE".to_string(),
            status,
            code: response.status.code,
            message,
        }
        .into())
    }

    /// UNAUTHENTICATE: back to the non-authenticated state; the TLS layer stays.
    pub async fn unauthenticate(&mut self) -> Result<(), SieveError> {
        self.execute(Command::new("UNAUTHENTICATE")).await?;
        self.state = SessionState::Connected;
        Ok(())
    }

    /// LISTSCRIPTS: one line per script, verbatim and in server order, e.g. `"main" ACTIVE`.
    pub async fn list_scripts(&mut self) -> Result<Vec<String>, SieveError> {
        let response = self.execute(Command::new("LISTSCRIPTS")).await?;
        Ok(payload_lines(&response))
    }

    /// HAVESPACE: `Ok(true)` if the server would accept a script of `size` bytes.
    pub async fn have_space(&mut self, name: &str, size: u64) -> Result<bool, SieveError> {
        self.execute(Command::new("HAVESPACE").string(name).number(size))
            .await?;
        Ok(true)
    }

    /// PUTSCRIPT: store `content` under `name`.
    pub async fn put_script(&mut self, name: &str, content: &[u8]) -> Result<(), SieveError> {
        let response = self
            .execute(Command::new("PUTSCRIPT").string(name).literal(content))
            .await?;
        if !response.status.message.is_empty() {
            debug!("PUTSCRIPT {}: {}", name, response.status.message);
        }
        Ok(())
    }

    /// CHECKSCRIPT: validate without storing. Returns server warnings, if any.
    pub async fn check_script(&mut self, content: &[u8]) -> Result<Option<String>, SieveError> {
        let response = self
            .execute(Command::new("CHECKSCRIPT").literal(content))
            .await?;
        let text = response.diagnostic();
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    /// GETSCRIPT: the script body, byte for byte.
    pub async fn get_script(&mut self, name: &str) -> Result<Vec<u8>, SieveError> {
        let response = self.execute(Command::new("GETSCRIPT").string(name)).await?;
        if let Some(data) = response.literals().next() {
            return Ok(data.to_vec());
        }
        if let Some((body, _)) = response
            .lines()
            .next()
            .and_then(parse_quoted)
        {
            return Ok(body.into_bytes());
        }
        self.close().await;
        Err(TransportError::Desync("GETSCRIPT response carries no script".to_string()).into())
    }

    pub async fn delete_script(&mut self, name: &str) -> Result<(), SieveError> {
        self.execute(Command::new("DELETESCRIPT").string(name))
            .await?;
        Ok(())
    }

    pub async fn rename_script(&mut self, old_name: &str, new_name: &str) -> Result<(), SieveError> {
        self.execute(Command::new("RENAMESCRIPT").string(old_name).string(new_name))
            .await?;
        Ok(())
    }

    /// SETACTIVE; an empty name deactivates all scripts.
    pub async fn set_active(&mut self, name: &str) -> Result<(), SieveError> {
        self.execute(Command::new("SETACTIVE").string(name)).await?;
        Ok(())
    }

    /// NOOP, optionally with a tag the server echoes in its resp-code.
    pub async fn noop(&mut self, text: Option<&str>) -> Result<StatusLine, SieveError> {
        let command = match text {
            Some(t) => Command::new("NOOP").string(t),
            None => Command::new("NOOP"),
        };
        Ok(self.execute(command).await?.status)
    }

    /// LOGOUT. The connection is closed whatever the server answers.
    pub async fn logout(&mut self) -> Result<(), SieveError> {
        let sent = self.send(&Command::new("LOGOUT")).await;
        let received = match sent {
            Ok(()) => self.receive(None).await,
            Err(e) => Err(e),
        };
        self.close().await;
        expect_ok("LOGOUT", received?)?;
        Ok(())
    }

    /// Close the connection without LOGOUT. Safe to call more than once.
    pub async fn close(&mut self) {
        self.transport.close().await;
        self.state = SessionState::Closed;
    }
}
