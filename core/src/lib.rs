/*
 * lib.rs
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

//! Core backend for mgsieve: ManageSieve (RFC 5804) protocol engine, in-band STARTTLS
//! transport, SASL PLAIN and server profiles.
//!
//! The engine never prints. Failures come back as [`SieveError`] values carrying the
//! server's text; wire traffic is reported through `tracing` events only.

pub mod config;
pub mod net;
pub mod protocol;
pub mod sasl;

pub use protocol::managesieve::{
    Capabilities, ConnectError, ConnectOptions, ProtocolError, Response, ResponseItem,
    ScriptEntry, SessionState, SieveError, SieveSession, Status, StatusLine, TlsError,
    TransportError,
};
