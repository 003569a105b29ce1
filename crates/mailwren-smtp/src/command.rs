//! SMTP commands and their wire encoding.

use crate::types::Address;
use bytes::{BufMut, BytesMut};

/// A command the client can send.
///
/// The session engine treats these opaquely except for [`Command::Ehlo`]
/// and [`Command::StartTls`], which it issues itself during the
/// handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - greeting, announces the client and requests capabilities
    Ehlo {
        /// Name the client announces itself as
        hello_name: String,
    },
    /// STARTTLS - request the in-band upgrade to TLS
    StartTls,
    /// MAIL FROM - open a mail transaction
    MailFrom {
        /// Envelope sender
        from: Address,
        /// SIZE parameter, when the server advertised SIZE
        size: Option<usize>,
    },
    /// RCPT TO - add a recipient
    RcptTo {
        /// Envelope recipient
        to: Address,
    },
    /// DATA - request to send the message content
    Data,
    /// Message content after a 354 reply, terminated with `<CRLF>.<CRLF>`
    Payload {
        /// RFC 5322 message bytes; lines may end in LF or CRLF
        body: Vec<u8>,
    },
    /// RSET - abort the current transaction
    Rset,
    /// NOOP - no operation
    Noop,
    /// QUIT - end the session
    Quit,
}

impl Command {
    /// Encodes the command into `buf` as CRLF-terminated protocol lines.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Ehlo { hello_name } => {
                buf.put_slice(b"EHLO ");
                buf.put_slice(hello_name.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Self::StartTls => buf.put_slice(b"STARTTLS\r\n"),
            Self::MailFrom { from, size } => {
                buf.put_slice(b"MAIL FROM:<");
                buf.put_slice(from.as_str().as_bytes());
                buf.put_slice(b">");
                if let Some(size) = size {
                    buf.put_slice(format!(" SIZE={size}").as_bytes());
                }
                buf.put_slice(b"\r\n");
            }
            Self::RcptTo { to } => {
                buf.put_slice(b"RCPT TO:<");
                buf.put_slice(to.as_str().as_bytes());
                buf.put_slice(b">\r\n");
            }
            Self::Data => buf.put_slice(b"DATA\r\n"),
            Self::Payload { body } => encode_payload(body, buf),
            Self::Rset => buf.put_slice(b"RSET\r\n"),
            Self::Noop => buf.put_slice(b"NOOP\r\n"),
            Self::Quit => buf.put_slice(b"QUIT\r\n"),
        }
    }
}

/// Writes message content with CRLF normalization and dot-stuffing,
/// followed by the terminating `.` line.
fn encode_payload(body: &[u8], buf: &mut BytesMut) {
    let mut lines = body.split(|&b| b == b'\n').peekable();
    while let Some(line) = lines.next() {
        // A trailing newline yields an empty last segment, not a line.
        if line.is_empty() && lines.peek().is_none() {
            break;
        }
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        // Lines beginning with '.' get an extra dot (RFC 5321 4.5.2)
        if line.first() == Some(&b'.') {
            buf.put_u8(b'.');
        }
        buf.put_slice(line);
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b".\r\n");
}
