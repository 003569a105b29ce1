//! The SMTP client facade.

use super::queue::SessionQueue;
use super::stream::SmtpStream;
use super::tls::{self, Security};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::{Address, Handshake, Response};

/// An established SMTP session.
///
/// Created by [`SmtpClient::connect`], which only returns once the
/// greeting exchange (and, in opportunistic mode, the STARTTLS upgrade)
/// has completed; a client value therefore always represents a usable
/// session. The connection is owned by a background task; dropping the
/// client closes it and fails any requests still in flight, the same as
/// an explicit [`close`](Self::close).
pub struct SmtpClient {
    queue: SessionQueue,
    hostname: String,
    security: Security,
    handshake: Handshake,
}

impl SmtpClient {
    /// Connects to a server and performs the handshake.
    ///
    /// `hostname` is used for the TCP connection, for certificate
    /// verification, and as the name announced in EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened, the server's
    /// banner or EHLO reply is not in the accepted class
    /// ([`Error::InvalidHandshake`]), or the STARTTLS upgrade fails. No
    /// partial session is ever returned.
    pub async fn connect(hostname: &str, port: u16, security: Security) -> Result<Self> {
        let stream = match &security {
            Security::Implicit(params) => {
                let connector = params.connector()?;
                let server_name = tls::server_name(hostname)?;
                SmtpStream::connect_tls(hostname, port, connector, server_name).await?
            }
            Security::Insecure | Security::StartTls(_) => {
                SmtpStream::connect(hostname, port).await?
            }
        };
        tracing::debug!(hostname, port, "connected");

        let queue = SessionQueue::spawn(stream);
        match negotiate(&queue, hostname, &security).await {
            Ok(handshake) => Ok(Self {
                queue,
                hostname: hostname.to_string(),
                security,
                handshake,
            }),
            Err(err) => {
                queue.close().await;
                Err(err)
            }
        }
    }

    /// Sends a command and awaits its reply.
    ///
    /// May be called concurrently from any task; replies correlate to
    /// calls by submission order.
    ///
    /// # Errors
    ///
    /// Returns the transport error that failed the exchange, or
    /// [`Error::Disconnected`] if the session closed before the reply
    /// arrived. The reply itself is returned whatever its code;
    /// rejection handling is the caller's.
    pub async fn send(&self, command: Command) -> Result<Response> {
        self.queue.exchange(command).await
    }

    /// The latest handshake snapshot (post-upgrade when one happened).
    #[must_use]
    pub const fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// The server hostname this session is connected to.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The security mode the session was opened with.
    #[must_use]
    pub const fn security(&self) -> &Security {
        &self.security
    }

    /// Returns true once the session has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the server rejects it.
    pub async fn noop(&self) -> Result<()> {
        let response = self.send(Command::Noop).await?;
        ensure_accepted(&response)?;
        Ok(())
    }

    /// Submits one message: MAIL FROM, RCPT TO per recipient, DATA,
    /// then the dot-stuffed message content. Every step flows through
    /// the session queue like any other command.
    ///
    /// # Errors
    ///
    /// Returns an error on the first rejected step or transport
    /// failure; the transaction is not retried or reset automatically.
    pub async fn send_mail(
        &self,
        from: &Address,
        recipients: &[Address],
        message: &[u8],
    ) -> Result<Response> {
        if recipients.is_empty() {
            return Err(Error::Protocol("a mail needs at least one recipient".to_string()));
        }

        // Announce the size when the server stated a limit.
        let size = self
            .handshake
            .max_message_size()
            .map(|_| message.len());
        let response = self
            .send(Command::MailFrom {
                from: from.clone(),
                size,
            })
            .await?;
        ensure_accepted(&response)?;

        for to in recipients {
            let response = self.send(Command::RcptTo { to: to.clone() }).await?;
            ensure_accepted(&response)?;
        }

        let response = self.send(Command::Data).await?;
        if !response.code.is_intermediate() {
            return Err(Error::unexpected(response.code.as_u16(), response.text()));
        }

        let response = self
            .send(Command::Payload {
                body: message.to_vec(),
            })
            .await?;
        ensure_accepted(&response)?;
        Ok(response)
    }

    /// Sends QUIT, then closes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails or is rejected. The
    /// session is closed either way.
    pub async fn quit(self) -> Result<()> {
        let result = self.queue.exchange(Command::Quit).await;
        self.queue.close().await;
        let response = result?;
        ensure_accepted(&response)?;
        Ok(())
    }

    /// Closes the session, failing any pending requests with a
    /// disconnection error. Idempotent.
    pub async fn close(&self) {
        self.queue.close().await;
    }
}

impl std::fmt::Debug for SmtpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpClient")
            .field("hostname", &self.hostname)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Drives the greeting exchange and the conditional transport upgrade.
///
/// Reads the 220 banner, exchanges EHLO, and, when the mode is
/// opportunistic and the server advertises STARTTLS, exchanges STARTTLS,
/// swaps the transport between the acknowledgement and the next write,
/// and exchanges EHLO once more for a fresh snapshot. Any failure is
/// terminal for the connect.
async fn negotiate(
    queue: &SessionQueue,
    hostname: &str,
    security: &Security,
) -> Result<Handshake> {
    let banner = queue.greeting().await?;
    if !banner.is_accepted() {
        return Err(Error::InvalidHandshake(format!(
            "service banner {}: {}",
            banner.code,
            banner.text()
        )));
    }

    let response = queue
        .exchange(Command::Ehlo {
            hello_name: hostname.to_string(),
        })
        .await?;
    let handshake = Handshake::from_response(&response)?;

    let Security::StartTls(params) = security else {
        return Ok(handshake);
    };
    if !handshake.supports_starttls() {
        tracing::debug!("server does not advertise STARTTLS; staying in plaintext");
        return Ok(handshake);
    }

    // Build the TLS stage up front so a bad configuration fails before
    // the server is told to switch.
    let connector = params.connector()?;
    let server_name = tls::server_name(hostname)?;

    let response = queue.exchange(Command::StartTls).await?;
    if !response.is_accepted() {
        return Err(Error::unexpected(response.code.as_u16(), response.text()));
    }
    queue.upgrade_tls(connector, server_name).await?;

    // Capabilities may differ over the encrypted channel.
    let response = queue
        .exchange(Command::Ehlo {
            hello_name: hostname.to_string(),
        })
        .await?;
    Handshake::from_response(&response)
}

fn ensure_accepted(response: &Response) -> Result<()> {
    if response.is_accepted() {
        Ok(())
    } else {
        Err(Error::unexpected(response.code.as_u16(), response.text()))
    }
}
