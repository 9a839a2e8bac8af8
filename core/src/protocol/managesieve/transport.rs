/*
 * transport.rs
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

//! Byte transport for a ManageSieve connection: plain TCP that can be upgraded in-band to TLS.
//!
//! Any failure poisons the transport: the stream is dropped and later calls fail with
//! [`TransportError::Closed`].

use std::future::Future;
use std::io;
use std::time::Duration;

use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{debug, trace, warn};

use super::error::{ConnectError, SieveError, TlsError, TransportError};
use super::hexdump::hexdump;
use super::response::{self, Response};
use crate::net;

/// ManageSieve stream: plain or TLS (after STARTTLS).
pub enum SieveStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for SieveStream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            SieveStream::Plain(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            SieveStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SieveStream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        match self.get_mut() {
            SieveStream::Plain(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            SieveStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            SieveStream::Plain(s) => std::pin::Pin::new(s).poll_flush(cx),
            SieveStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            SieveStream::Plain(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            SieveStream::Tls(s) => std::pin::Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Run `fut` under an optional deadline; expiry is a fatal timeout.
async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match limit {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| TransportError::Timeout)?,
        None => fut.await,
    }
}

/// One connection to one server endpoint.
pub struct Transport {
    host: String,
    port: u16,
    stream: Option<BufReader<SieveStream>>,
    io_timeout: Option<Duration>,
}

impl Transport {
    /// Open a plaintext TCP connection.
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Option<Duration>,
        io_timeout: Option<Duration>,
    ) -> Result<Self, ConnectError> {
        let attempt = net::connect_plain(host, port);
        let result = match connect_timeout {
            Some(d) => tokio::time::timeout(d, attempt)
                .await
                .map_err(|_| ConnectError::Timeout {
                    host: host.to_string(),
                    port,
                })?,
            None => attempt.await,
        };
        let tcp = result.map_err(|source| ConnectError::Io {
            host: host.to_string(),
            port,
            source,
        })?;
        debug!("connected to {}:{}", host, port);
        Ok(Transport {
            host: host.to_string(),
            port,
            stream: Some(BufReader::new(SieveStream::Plain(tcp))),
            io_timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(&self.stream, Some(r) if matches!(r.get_ref(), SieveStream::Tls(_)))
    }

    fn reader(&mut self) -> Result<&mut BufReader<SieveStream>, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }

    /// Drop the stream after a failure and hand the error back.
    fn poison<T>(&mut self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        if let Err(e) = &result {
            debug!("closing {}:{} after error: {}", self.host, self.port, e);
            self.stream = None;
        }
        result
    }

    pub async fn read_line(&mut self) -> Result<String, TransportError> {
        let limit = self.io_timeout;
        let reader = self.reader()?;
        let result = with_deadline(limit, response::read_line(reader)).await;
        self.poison(result)
    }

    pub async fn read_exact(&mut self, len: u64) -> Result<Vec<u8>, TransportError> {
        let limit = self.io_timeout;
        let reader = self.reader()?;
        let result = with_deadline(limit, response::read_literal(reader, len)).await;
        self.poison(result)
    }

    /// Write all bytes and flush.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let limit = self.io_timeout;
        let stream = self.reader()?.get_mut();
        if tracing::enabled!(tracing::Level::TRACE) {
            trace!("C: {} bytes\n{}", bytes.len(), hexdump(bytes));
        }
        let result = with_deadline(limit, async {
            stream.write_all(bytes).await?;
            stream.flush().await?;
            Ok::<(), TransportError>(())
        })
        .await;
        self.poison(result)
    }

    /// Read a complete response (payload and status line).
    pub async fn read_response(&mut self) -> Result<Response, TransportError> {
        self.read_response_from(None).await
    }

    /// Read a complete response whose first line was already consumed.
    pub async fn read_response_after(&mut self, first: String) -> Result<Response, TransportError> {
        self.read_response_from(Some(first)).await
    }

    async fn read_response_from(
        &mut self,
        first: Option<String>,
    ) -> Result<Response, TransportError> {
        let limit = self.io_timeout;
        let reader = self.reader()?;
        let result = with_deadline(limit, response::read_response_from(reader, first)).await;
        self.poison(result)
    }

    /// Wrap the socket in TLS in place.
    ///
    /// `verify == false` accepts any certificate. `extra_roots` are trusted in addition to the
    /// platform and webpki roots. Any failure closes the connection; there is no fallback.
    pub async fn upgrade_to_tls(
        &mut self,
        server_name: &str,
        verify: bool,
        extra_roots: &[CertificateDer<'static>],
    ) -> Result<(), SieveError> {
        let reader = self.stream.take().ok_or(TransportError::Closed)?;
        if !reader.buffer().is_empty() {
            return Err(TransportError::Desync(format!(
                "{} plaintext bytes buffered ahead of TLS handshake",
                reader.buffer().len()
            ))
            .into());
        }
        let tcp = match reader.into_inner() {
            SieveStream::Plain(tcp) => tcp,
            SieveStream::Tls(_) => {
                return Err(TransportError::Desync("stream is already TLS".to_string()).into())
            }
        };
        let name = net::server_name(server_name)
            .map_err(|_| TlsError::InvalidServerName(server_name.to_string()))?;
        if !verify {
            warn!(
                "TLS certificate verification disabled for {}: the server is not authenticated",
                server_name
            );
        }
        let connector = net::tls_connector(verify, extra_roots);
        let handshake = async {
            net::upgrade_to_tls(tcp, name, &connector)
                .await
                .map_err(|source| TlsError::Handshake {
                    server_name: server_name.to_string(),
                    source,
                })
        };
        let tls = match self.io_timeout {
            Some(d) => tokio::time::timeout(d, handshake)
                .await
                .map_err(|_| TransportError::Timeout)??,
            None => handshake.await?,
        };
        debug!("TLS established with {} ({}:{})", server_name, self.host, self.port);
        self.stream = Some(BufReader::new(SieveStream::Tls(Box::new(tls))));
        Ok(())
    }

    /// Shut the stream down once; later calls are no-ops.
    pub async fn close(&mut self) {
        if let Some(mut reader) = self.stream.take() {
            let limit = self.io_timeout.unwrap_or(Duration::from_secs(5));
            let _ = tokio::time::timeout(limit, reader.get_mut().shutdown()).await;
            debug!("closed {}:{}", self.host, self.port);
        }
    }
}
