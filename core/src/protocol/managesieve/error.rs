/*
 * error.rs
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

//! ManageSieve client errors.
//!
//! Connect, TLS and transport errors are fatal: the session is closed and every later command
//! fails with [`TransportError::Closed`]. Protocol errors are server refusals (`NO`/`BYE`) or
//! local preconditions; the session stays usable after a `NO`.

use std::io;

use thiserror::Error;

use super::response::Status;
use crate::sasl::SaslError;

/// TCP connect failed (DNS, refused, timeout). Nothing was exchanged with the server.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("cannot connect to {host}:{port}: {source}")]
    Io {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("connect to {host}:{port} timed out")]
    Timeout { host: String, port: u16 },
}

/// TLS upgrade failed. There is no fallback to plaintext.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),
    #[error("TLS handshake with {server_name} failed: {source}")]
    Handshake {
        server_name: String,
        #[source]
        source: io::Error,
    },
}

/// The byte stream is unusable: closed, cut short, timed out or out of sync with the framing.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("connection closed after {received} of {expected} literal bytes")]
    Truncated { expected: u64, received: u64 },
    #[error("I/O deadline expired")]
    Timeout,
    #[error("protocol stream out of sync: {0}")]
    Desync(String),
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportError::Closed,
            io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(e),
        }
    }
}

/// A well-formed refusal from the server, or a command the session refuses to send.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("refusing to authenticate: connection is not encrypted")]
    NotEncrypted,
    #[error("connection is already encrypted")]
    AlreadyEncrypted,
    #[error("session is already authenticated")]
    AlreadyAuthenticated,
    #[error("invalid credentials: {0}")]
    Credentials(#[from] SaslError),
    #[error("{command} failed - {status}{}{}", code_suffix(.code), message_suffix(.message))]
    Rejected {
        command: String,
        status: Status,
        code: Option<String>,
        message: String,
    },
}

fn code_suffix(code: &Option<String>) -> String {
    match code {
        Some(c) => format!(" ({})", c),
        None => String::new(),
    }
}

fn message_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" {}", message)
    }
}

/// Any failure of a ManageSieve operation.
#[derive(Debug, Error)]
pub enum SieveError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<io::Error> for SieveError {
    fn from(e: io::Error) -> Self {
        SieveError::Transport(e.into())
    }
}

impl SieveError {
    /// True when the connection can no longer be used.
    pub fn is_fatal(&self) -> bool {
        match self {
            SieveError::Connect(_) | SieveError::Tls(_) | SieveError::Transport(_) => true,
            SieveError::Protocol(ProtocolError::Rejected { status, .. }) => *status == Status::Bye,
            SieveError::Protocol(_) => false,
        }
    }

    /// Server-supplied diagnostic text, if this error came from a `NO`/`BYE` response.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            SieveError::Protocol(ProtocolError::Rejected { message, .. }) => Some(message),
            _ => None,
        }
    }

    /// Response code (e.g. `QUOTA/MAXSIZE`), if the server sent one.
    pub fn response_code(&self) -> Option<&str> {
        match self {
            SieveError::Protocol(ProtocolError::Rejected { code, .. }) => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_carries_code_and_text() {
        let e = ProtocolError::Rejected {
            command: "HAVESPACE".to_string(),
            status: Status::No,
            code: Some("QUOTA/MAXSIZE".to_string()),
            message: "Quota exceeded".to_string(),
        };
        assert_eq!(e.to_string(), "HAVESPACE failed - NO (QUOTA/MAXSIZE) Quota exceeded");
    }

    #[test]
    fn eof_maps_to_closed() {
        let e: TransportError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(e, TransportError::Closed));
    }

    #[test]
    fn bye_is_fatal_no_is_not() {
        let no = SieveError::Protocol(ProtocolError::Rejected {
            command: "DELETESCRIPT".to_string(),
            status: Status::No,
            code: None,
            message: "Active script".to_string(),
        });
        assert!(!no.is_fatal());
        assert_eq!(no.server_message(), Some("Active script"));

        let bye = SieveError::Protocol(ProtocolError::Rejected {
            command: "NOOP".to_string(),
            status: Status::Bye,
            code: None,
            message: "shutting down".to_string(),
        });
        assert!(bye.is_fatal());
        assert!(SieveError::Transport(TransportError::Closed).is_fatal());
    }
}
