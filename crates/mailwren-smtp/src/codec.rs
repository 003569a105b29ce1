//! Incremental decoder for SMTP replies.
//!
//! Replies are one or more CRLF-terminated lines carrying the same
//! three-digit code: `250-...` continuation lines followed by a final
//! `250 ...` line. The decoder consumes complete lines from a byte
//! buffer and yields a [`Response`] once the final line arrives,
//! keeping partial state across calls.

use crate::error::{Error, Result};
use crate::types::{Response, ResponseCode};
use bytes::{Buf, BytesMut};

/// Maximum accepted reply line length, to bound buffering on a
/// misbehaving server.
const MAX_LINE_LENGTH: usize = 8192;

/// Stateful reply decoder.
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    lines: Vec<String>,
    code: Option<u16>,
}

impl ResponseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards any partially assembled reply.
    ///
    /// Used when the transport is swapped at the STARTTLS boundary: the
    /// protocol guarantees the server has nothing in flight there.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.code = None;
    }

    /// Consumes complete lines from `buf` and returns a full reply, or
    /// `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on a malformed reply line.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Response>> {
        loop {
            let Some(pos) = find_crlf(buf) else {
                if buf.len() > MAX_LINE_LENGTH {
                    return Err(Error::Protocol("reply line too long".to_string()));
                }
                return Ok(None);
            };

            let line = buf.split_to(pos + 2);
            let line = std::str::from_utf8(&line[..line.len() - 2])
                .map_err(|_| Error::Protocol("reply is not valid UTF-8".to_string()))?;

            let (code, last, text) = parse_line(line)?;
            match self.code {
                None => self.code = Some(code),
                Some(expected) if expected != code => {
                    return Err(Error::Protocol(format!(
                        "reply code changed mid-reply: {expected} then {code}"
                    )));
                }
                Some(_) => {}
            }
            self.lines.push(text.to_string());

            if last {
                self.code = None;
                let lines = std::mem::take(&mut self.lines);
                return Ok(Some(Response::new(ResponseCode::new(code), lines)));
            }
        }
    }
}

fn find_crlf(buf: &BytesMut) -> Option<usize> {
    buf.chunk().windows(2).position(|w| w == b"\r\n")
}

/// Splits one reply line into (code, is-last-line, text).
fn parse_line(line: &str) -> Result<(u16, bool, &str)> {
    if line.len() < 3 || !line.is_char_boundary(3) {
        return Err(Error::Protocol(format!("reply line too short: {line:?}")));
    }

    let code = line[..3]
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("invalid reply code in {line:?}")))?;

    match line.as_bytes().get(3) {
        None => Ok((code, true, "")),
        Some(b' ') => Ok((code, true, &line[4..])),
        Some(b'-') => Ok((code, false, &line[4..])),
        Some(_) => Err(Error::Protocol(format!(
            "invalid reply separator in {line:?}"
        ))),
    }
}
