//! The session queue: serialized command/response exchange for one
//! connection.
//!
//! A dedicated task owns the transport, the reply decoder, and the read
//! buffer; every queue mutation happens on that task. Callers hold a
//! cloneable handle and submit requests over an unbounded channel, each
//! carrying a single-assignment result slot. Because the task processes
//! one request at a time, at most one command is ever awaiting a reply,
//! and replies correlate to commands purely by submission order.

use super::stream::SmtpStream;
use crate::codec::ResponseDecoder;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::Response;
use bytes::BytesMut;
use rustls::pki_types::ServerName;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_rustls::TlsConnector;

/// One outstanding request, owned by the session task until resolved.
enum SessionRequest {
    /// Read one unprompted reply (the 220 service banner).
    Greeting {
        reply: oneshot::Sender<Result<Response>>,
    },
    /// Write a command, then read exactly one reply.
    Exchange {
        command: Command,
        reply: oneshot::Sender<Result<Response>>,
    },
    /// Swap the plaintext transport for TLS. Sequenced like any other
    /// request, so it runs strictly between two command exchanges.
    StartTls {
        connector: TlsConnector,
        server_name: ServerName<'static>,
        done: oneshot::Sender<Result<()>>,
    },
    /// Shut the transport down and stop the task.
    Close { done: oneshot::Sender<()> },
}

/// Handle to the session task. Cheap to clone; enqueuing never blocks.
#[derive(Clone)]
pub(crate) struct SessionQueue {
    requests: mpsc::UnboundedSender<SessionRequest>,
}

impl SessionQueue {
    /// Spawns the session task around a connected transport.
    pub(crate) fn spawn(stream: SmtpStream) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(stream, rx));
        Self { requests }
    }

    /// Reads the server's unprompted greeting banner.
    pub(crate) async fn greeting(&self) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        self.submit(SessionRequest::Greeting { reply: tx })?;
        rx.await.map_err(|_| Error::Disconnected)?
    }

    /// Enqueues a command and awaits its reply.
    pub(crate) async fn exchange(&self, command: Command) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        self.submit(SessionRequest::Exchange { command, reply: tx })?;
        rx.await.map_err(|_| Error::Disconnected)?
    }

    /// Swaps in the TLS stage, after the STARTTLS acknowledgement and
    /// before any further write.
    pub(crate) async fn upgrade_tls(
        &self,
        connector: TlsConnector,
        server_name: ServerName<'static>,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(SessionRequest::StartTls {
            connector,
            server_name,
            done: tx,
        })?;
        rx.await.map_err(|_| Error::Disconnected)?
    }

    /// Shuts the session down. Safe to call more than once and on a
    /// session that already disconnected.
    pub(crate) async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.requests.send(SessionRequest::Close { done: tx }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Returns true once the session task has stopped.
    pub(crate) fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    fn submit(&self, request: SessionRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| Error::Disconnected)
    }
}

/// The session task. Exits on close, on the last handle dropping, or on
/// the first I/O or protocol failure, then fails every request still
/// queued.
async fn run(mut stream: SmtpStream, mut requests: mpsc::UnboundedReceiver<SessionRequest>) {
    let mut decoder = ResponseDecoder::new();
    let mut read_buf = BytesMut::with_capacity(4096);
    let mut write_buf = BytesMut::with_capacity(1024);

    while let Some(request) = requests.recv().await {
        match request {
            SessionRequest::Greeting { reply } => {
                let result = read_response(&mut stream, &mut decoder, &mut read_buf).await;
                if resolve(reply, result) {
                    break;
                }
            }
            SessionRequest::Exchange { command, reply } => {
                let result = exchange(
                    &mut stream,
                    &command,
                    &mut decoder,
                    &mut read_buf,
                    &mut write_buf,
                )
                .await;
                if resolve(reply, result) {
                    break;
                }
            }
            SessionRequest::StartTls {
                connector,
                server_name,
                done,
            } => match stream.upgrade_to_tls(connector, server_name).await {
                Ok(upgraded) => {
                    stream = upgraded;
                    decoder.reset();
                    read_buf.clear();
                    tracing::debug!("transport upgraded to TLS");
                    let _ = done.send(Ok(()));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "TLS upgrade failed; closing session");
                    let _ = done.send(Err(err));
                    drain(&mut requests);
                    return;
                }
            },
            SessionRequest::Close { done } => {
                let _ = stream.shutdown().await;
                let _ = done.send(());
                break;
            }
        }
    }

    // The transport drops here, which force-closes the connection.
    drain(&mut requests);
}

/// Sends `result` into the request's slot. Returns true if the session
/// must stop because the exchange failed.
fn resolve(reply: oneshot::Sender<Result<Response>>, result: Result<Response>) -> bool {
    let failed = result.is_err();
    if let Err(err) = &result {
        tracing::warn!(error = %err, "exchange failed; closing session");
    }
    let _ = reply.send(result);
    failed
}

/// Fails every request still queued with a disconnection error.
fn drain(requests: &mut mpsc::UnboundedReceiver<SessionRequest>) {
    requests.close();
    let mut pending = 0usize;
    while let Ok(request) = requests.try_recv() {
        pending += 1;
        match request {
            SessionRequest::Greeting { reply } | SessionRequest::Exchange { reply, .. } => {
                let _ = reply.send(Err(Error::Disconnected));
            }
            SessionRequest::StartTls { done, .. } => {
                let _ = done.send(Err(Error::Disconnected));
            }
            SessionRequest::Close { done } => {
                let _ = done.send(());
            }
        }
    }
    if pending > 0 {
        tracing::debug!(pending, "session closed with requests outstanding");
    }
}

/// Writes one encoded command, then reads exactly one complete reply.
async fn exchange<S>(
    stream: &mut S,
    command: &Command,
    decoder: &mut ResponseDecoder,
    read_buf: &mut BytesMut,
    write_buf: &mut BytesMut,
) -> Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_buf.clear();
    command.encode(write_buf);
    stream.write_all(write_buf).await?;
    stream.flush().await?;
    read_response(stream, decoder, read_buf).await
}

/// Reads until the decoder yields one complete reply.
async fn read_response<S>(
    stream: &mut S,
    decoder: &mut ResponseDecoder,
    read_buf: &mut BytesMut,
) -> Result<Response>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(response) = decoder.decode(read_buf)? {
            return Ok(response);
        }
        let read = stream.read_buf(read_buf).await?;
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
    }
}
