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

//! SASL client side. ManageSieve sends the initial response inline with AUTHENTICATE, so only
//! single-round mechanisms are needed; PLAIN is the one the engine speaks.

mod mechanism;
mod plain;

pub use mechanism::SaslMechanism;
pub use plain::{encode_plain, initial_response_plain, parse_plain_credentials};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct SaslError {
    pub message: String,
}

impl SaslError {
    pub fn invalid(msg: &str) -> Self {
        Self { message: msg.to_string() }
    }

    pub fn plain_invalid() -> Self {
        Self::invalid("invalid PLAIN credentials format")
    }
}

/// Build the initial client response for the given mechanism, base64-encoded for the wire
/// (ManageSieve: `AUTHENTICATE "PLAIN" "<base64>"`).
pub fn initial_client_response_b64(
    mechanism: SaslMechanism,
    authzid: &str,
    authcid: &str,
    password: &str,
) -> Result<String, SaslError> {
    match mechanism {
        SaslMechanism::Plain => {
            let bytes = initial_response_plain(authzid, authcid, password)?;
            Ok(STANDARD.encode(bytes))
        }
    }
}

/// Decode a base64 SASL payload (server side of the exchange, used by test servers).
pub fn decode_b64(encoded: &str) -> Result<Vec<u8>, SaslError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| SaslError::invalid("invalid base64"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_response_is_base64_of_nul_separated_triple() {
        let b64 = initial_client_response_b64(SaslMechanism::Plain, "", "tim", "tanstaaftanstaaf").unwrap();
        assert_eq!(b64, "AHRpbQB0YW5zdGFhZnRhbnN0YWFm");
        let decoded = decode_b64(&b64).unwrap();
        assert_eq!(decoded, b"\0tim\0tanstaaftanstaaf");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_b64("***").is_err());
    }
}
