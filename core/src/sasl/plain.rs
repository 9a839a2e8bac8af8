/*
 * plain.rs
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

//! PLAIN SASL (RFC 4616). Requires TLS.

use super::SaslError;

/// Build PLAIN initial response: authzid NUL authcid NUL password (UTF-8).
/// Caller must base64-encode for the wire.
pub fn encode_plain(authzid: &str, authcid: &str, password: &str) -> Vec<u8> {
    format!("{}\0{}\0{}", authzid, authcid, password).into_bytes()
}

/// Same as encode_plain, but rejects values that would shift the NUL separators.
pub fn initial_response_plain(authzid: &str, authcid: &str, password: &str) -> Result<Vec<u8>, SaslError> {
    if authzid.contains('\0') || authcid.contains('\0') || password.contains('\0') {
        return Err(SaslError::invalid("PLAIN values must not contain NUL"));
    }
    Ok(encode_plain(authzid, authcid, password))
}

/// Parse PLAIN credentials (authzid NUL authcid NUL password). Used when validating.
pub fn parse_plain_credentials(credentials: &[u8]) -> Result<(String, String, String), SaslError> {
    let mut first = None;
    let mut second = None;
    for (i, &b) in credentials.iter().enumerate() {
        if b == 0 {
            if first.is_none() {
                first = Some(i);
            } else {
                second = Some(i);
                break;
            }
        }
    }
    let (f, s) = first.and_then(|f| second.map(|s| (f, s))).ok_or_else(SaslError::plain_invalid)?;
    let authzid = String::from_utf8(credentials[..f].to_vec()).map_err(|_| SaslError::plain_invalid())?;
    let authcid = String::from_utf8(credentials[f + 1..s].to_vec()).map_err(|_| SaslError::plain_invalid())?;
    let password = String::from_utf8(credentials[s + 1..].to_vec()).map_err(|_| SaslError::plain_invalid())?;
    Ok((authzid, authcid, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_authzid_starts_with_nul() {
        assert_eq!(encode_plain("", "user", "pw"), b"\0user\0pw");
    }

    #[test]
    fn utf8_credentials_survive_parse() {
        let blob = encode_plain("", "jürgen", "pässwörd");
        let (authzid, authcid, password) = parse_plain_credentials(&blob).unwrap();
        assert_eq!(authzid, "");
        assert_eq!(authcid, "jürgen");
        assert_eq!(password, "pässwörd");
    }

    #[test]
    fn nul_in_password_is_rejected() {
        assert!(initial_response_plain("", "user", "a\0b").is_err());
    }

    #[test]
    fn missing_separator_is_invalid() {
        assert!(parse_plain_credentials(b"\0onlyuser").is_err());
    }
}
