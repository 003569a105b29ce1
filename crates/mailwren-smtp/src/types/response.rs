//! Server reply types.

/// A complete reply from the server: one status code and the text of
/// every line that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Reply code (e.g. 250).
    pub code: ResponseCode,
    /// Text of each reply line, in wire order, code prefix stripped.
    pub lines: Vec<String>,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub const fn new(code: ResponseCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if the command was accepted (2xx).
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.code.is_completion()
    }

    /// Returns all reply lines joined into one string.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResponseCode(u16);

impl ResponseCode {
    /// Creates a reply code from its numeric value.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Positive completion, the "command accepted" class (2xx).
    #[must_use]
    pub const fn is_completion(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Intermediate reply (3xx), e.g. 354 after DATA.
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Transient negative completion (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Permanent negative completion (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Codes the session engine itself looks at.
impl ResponseCode {
    /// 220 Service ready (banner, STARTTLS acknowledgement)
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_MAIL_INPUT: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}
