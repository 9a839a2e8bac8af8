/*
 * net.rs
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

//! TCP and TLS helpers: plain connect, then in-band upgrade of the same socket (STARTTLS).
//!
//! ManageSieve never uses implicit TLS; the socket always starts in plaintext and is wrapped
//! with rustls after the server accepts STARTTLS.

use std::io;
use std::sync::{Arc, OnceLock};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::ClientConfig;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
/// `extra` anchors (private CAs, test certificates) are always added.
fn build_root_store(extra: &[CertificateDer<'static>]) -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    for cert in extra {
        let _ = root_store.add(cert.clone());
    }
    root_store
}

fn verifying_client_config(extra: &[CertificateDer<'static>]) -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .with_root_certificates(build_root_store(extra))
        .with_no_client_auth();
    Arc::new(config)
}

/// Client config that accepts any certificate. Only reachable through `verify == false`.
fn insecure_client_config() -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    Arc::new(config)
}

static DEFAULT_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

/// TLS connector for the upgrade. The verifying connector without extra anchors is built once
/// and shared, since loading native roots is slow.
pub fn tls_connector(verify: bool, extra_roots: &[CertificateDer<'static>]) -> TlsConnector {
    if !verify {
        return TlsConnector::from(insecure_client_config());
    }
    if extra_roots.is_empty() {
        return DEFAULT_CONNECTOR
            .get_or_init(|| TlsConnector::from(verifying_client_config(&[])))
            .clone();
    }
    TlsConnector::from(verifying_client_config(extra_roots))
}

/// Parse the name the peer certificate must match (DNS name or IP address).
pub fn server_name(name: &str) -> io::Result<ServerName<'static>> {
    ServerName::try_from(name.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))
}

/// Connect without TLS. ManageSieve upgrades later with STARTTLS.
pub async fn connect_plain(host: &str, port: u16) -> io::Result<TcpStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true)?;
    Ok(tcp)
}

/// Upgrade a plain socket to TLS in-band (after STARTTLS was accepted).
/// Consumes the socket; the TCP connection is not reopened.
pub async fn upgrade_to_tls(
    tcp: TcpStream,
    name: ServerName<'static>,
    connector: &TlsConnector,
) -> io::Result<TlsStream<TcpStream>> {
    connector.connect(name, tcp).await
}

/// Certificate verifier that accepts every certificate and signature.
///
/// Disables all authentication of the server: anyone on the path can read the credentials
/// sent after the upgrade. Used only when the caller explicitly ignores TLS errors.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_name_accepts_dns_and_ip() {
        assert!(server_name("sieve.example.org").is_ok());
        assert!(server_name("127.0.0.1").is_ok());
        assert!(server_name("::1").is_ok());
    }

    #[test]
    fn server_name_rejects_garbage() {
        let err = server_name("not a host name").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn root_store_is_never_empty() {
        let store = build_root_store(&[]);
        assert!(!store.is_empty());
    }
}
