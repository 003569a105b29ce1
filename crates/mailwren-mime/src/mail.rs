//! Top-level mail construction.

use crate::body::{MultipartBody, Part};
use crate::error::{Error, Result};

/// A complete, rendered mail ready for submission.
#[derive(Debug, Clone)]
pub struct Mail {
    headers: Vec<(String, String)>,
    body: MultipartBody,
}

impl Mail {
    /// Starts building a mail.
    #[must_use]
    pub fn builder() -> MailBuilder {
        MailBuilder::default()
    }

    /// Renders the message as CRLF-delimited bytes, suitable for
    /// passing to an SMTP DATA phase.
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        let mut out = String::new();
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&self.body.render());
        out.push_str("\r\n");
        out.into_bytes()
    }
}

/// Builder for [`Mail`].
#[derive(Debug, Default)]
pub struct MailBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    subject: Option<String>,
    parts: Vec<Part>,
}

impl MailBuilder {
    /// Sets the From header.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Adds a To recipient.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Adds a Cc recipient.
    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    /// Sets the Subject header.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a plain-text part.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }

    /// Adds plain-text and HTML renderings of the same content.
    #[must_use]
    pub fn alternative(mut self, plain: impl Into<String>, html: impl Into<String>) -> Self {
        self.parts.push(Part::Alternative {
            plain: plain.into(),
            html: html.into(),
        });
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(
        mut self,
        content_type: impl Into<String>,
        file_name: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        self.parts.push(Part::Attachment {
            content_type: content_type.into(),
            file_name: file_name.into(),
            content,
        });
        self
    }

    /// Builds the mail, generating Date, MIME-Version, and the
    /// multipart Content-Type headers.
    ///
    /// # Errors
    ///
    /// Returns an error if From or To is missing, or if any header
    /// value contains a line break.
    pub fn build(self) -> Result<Mail> {
        let from = self.from.ok_or(Error::MissingField("from"))?;
        if self.to.is_empty() {
            return Err(Error::MissingField("to"));
        }

        let body = MultipartBody::new(&self.parts);
        let mut headers = vec![
            ("From".to_string(), from),
            ("To".to_string(), self.to.join(", ")),
        ];
        if !self.cc.is_empty() {
            headers.push(("Cc".to_string(), self.cc.join(", ")));
        }
        if let Some(subject) = self.subject {
            headers.push(("Subject".to_string(), subject));
        }
        headers.push(("Date".to_string(), chrono::Utc::now().to_rfc2822()));
        headers.push(("MIME-Version".to_string(), "1.0".to_string()));
        headers.push(("Content-Type".to_string(), body.content_type()));

        for (name, value) in &headers {
            if value.contains('\r') || value.contains('\n') {
                return Err(Error::InvalidHeaderValue(format!(
                    "{name} contains a line break"
                )));
            }
        }

        Ok(Mail { headers, body })
    }
}
