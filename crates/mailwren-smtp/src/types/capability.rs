//! EHLO capability parsing and the handshake snapshot.

use crate::error::{Error, Result};
use crate::types::Response;
use std::collections::HashSet;

/// A capability advertised in an EHLO reply line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// STARTTLS - in-band upgrade to TLS
    StartTls,
    /// SIZE - maximum accepted message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit message bodies
    EightBitMime,
    /// PIPELINING - command pipelining
    Pipelining,
    /// SMTPUTF8 - UTF-8 addresses and headers
    SmtpUtf8,
    /// Anything this crate does not interpret
    Other(String),
}

impl Capability {
    /// Parses one EHLO capability line, case-insensitively.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default().to_uppercase();
        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "SIZE" => Self::Size(words.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Other(line.to_string()),
        }
    }
}

/// Immutable snapshot of one greeting exchange.
///
/// Derived once per connection from the EHLO reply, and once more after
/// a successful STARTTLS upgrade. Never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    /// The server's greeting name from the first reply line.
    pub server_name: String,
    capabilities: HashSet<Capability>,
}

impl Handshake {
    /// Builds a snapshot from an EHLO response.
    ///
    /// The first reply line is the server's greeting and is not a
    /// capability; every following line is parsed as one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the response is not in
    /// the accepted class.
    pub fn from_response(response: &Response) -> Result<Self> {
        if !response.is_accepted() {
            return Err(Error::InvalidHandshake(format!(
                "greeting rejected with {}: {}",
                response.code,
                response.text()
            )));
        }

        let server_name = response
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or_default()
            .to_string();

        let capabilities = response
            .lines
            .iter()
            .skip(1)
            .map(|line| Capability::parse(line))
            .collect();

        Ok(Self {
            server_name,
            capabilities,
        })
    }

    /// Checks whether a capability was advertised.
    #[must_use]
    pub fn supports(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns true if the server advertised STARTTLS.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Capability::StartTls)
    }

    /// Returns the advertised maximum message size, if any.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.capabilities.iter().find_map(|capability| {
            if let Capability::Size(size) = capability {
                *size
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ResponseCode;

    fn ehlo_response(lines: &[&str]) -> Response {
        Response::new(
            ResponseCode::OK,
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn parse_starttls_any_case() {
        assert_eq!(Capability::parse("STARTTLS"), Capability::StartTls);
        assert_eq!(Capability::parse("starttls"), Capability::StartTls);
        assert_eq!(Capability::parse("StartTls"), Capability::StartTls);
    }

    #[test]
    fn parse_size() {
        assert_eq!(
            Capability::parse("SIZE 52428800"),
            Capability::Size(Some(52_428_800))
        );
        assert_eq!(Capability::parse("SIZE"), Capability::Size(None));
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            Capability::parse("DSN"),
            Capability::Other("DSN".to_string())
        );
    }

    #[test]
    fn snapshot_reports_starttls() {
        let handshake =
            Handshake::from_response(&ehlo_response(&["mail.example.com", "STARTTLS"])).unwrap();
        assert!(handshake.supports_starttls());
        assert_eq!(handshake.server_name, "mail.example.com");
    }

    #[test]
    fn snapshot_without_starttls() {
        let handshake =
            Handshake::from_response(&ehlo_response(&["mail.example.com", "SIZE 1000", "8BITMIME"]))
                .unwrap();
        assert!(!handshake.supports_starttls());
        assert_eq!(handshake.max_message_size(), Some(1000));
        assert!(handshake.supports(&Capability::EightBitMime));
    }

    #[test]
    fn first_line_is_not_a_capability() {
        // A server whose greeting line happens to start with STARTTLS
        // must not be treated as upgrade-capable.
        let handshake = Handshake::from_response(&ehlo_response(&["STARTTLS.example.com"])).unwrap();
        assert!(!handshake.supports_starttls());
    }

    #[test]
    fn rejected_greeting_is_invalid_handshake() {
        let response = Response::new(
            ResponseCode::TRANSACTION_FAILED,
            vec!["go away".to_string()],
        );
        let err = Handshake::from_response(&response).unwrap_err();
        assert!(matches!(err, Error::InvalidHandshake(_)));
    }
}
