/*
 * mod.rs
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

//! ManageSieve client (RFC 5804): remote management of Sieve scripts over port 4190.

mod capabilities;
mod command;
mod error;
mod hexdump;
mod response;
mod session;
mod transport;

pub use capabilities::{Capabilities, ScriptEntry};
pub use command::{quote, Command};
pub use error::{ConnectError, ProtocolError, SieveError, TlsError, TransportError};
pub use hexdump::hexdump;
pub use response::{
    parse_quoted, read_line, read_literal, read_response, read_response_from,
    split_literal_marker, Response, ResponseItem, Status, StatusLine, MAX_LINE_LENGTH,
};
pub use session::{ConnectOptions, SessionState, SieveSession};
pub use transport::{SieveStream, Transport};
