//! The SMTP transport: plain TCP or TLS over TCP.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

/// SMTP transport stream.
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Opens a plaintext connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection fails.
    pub async fn connect(hostname: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((hostname, port)).await?;
        Ok(Self::Tcp(stream))
    }

    /// Opens a connection that is TLS-encrypted from the first byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or TLS handshake fails.
    pub async fn connect_tls(
        hostname: &str,
        port: u16,
        connector: TlsConnector,
        server_name: ServerName<'static>,
    ) -> Result<Self> {
        let stream = TcpStream::connect((hostname, port)).await?;
        let tls = connector.connect(server_name, stream).await?;
        Ok(Self::Tls(Box::new(tls)))
    }

    /// Wraps the plaintext stream in TLS, consuming it.
    ///
    /// This is the transport-stage swap at the STARTTLS boundary: it
    /// must only run between two command exchanges, with no write in
    /// flight, which the session task guarantees.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS handshake fails, or a protocol
    /// error if the stream is already encrypted.
    pub async fn upgrade_to_tls(
        self,
        connector: TlsConnector,
        server_name: ServerName<'static>,
    ) -> Result<Self> {
        let tcp = match self {
            Self::Tcp(stream) => stream,
            Self::Tls(_) => {
                return Err(Error::Protocol("transport is already encrypted".to_string()));
            }
        };
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Self::Tls(Box::new(tls)))
    }

    /// Returns true if the transport is encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}
