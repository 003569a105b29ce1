//! Multipart body assembly.

use crate::encoding::encode_base64_wrapped;
use std::sync::atomic::{AtomicU64, Ordering};

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a boundary unlikely to collide with message content.
fn make_boundary(prefix: &str) -> String {
    let stamp = chrono::Utc::now().timestamp_millis();
    let unique = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("--------=_{prefix}_{:x}{unique:04x}.{stamp}", std::process::id())
}

/// One part of a multipart body.
#[derive(Debug, Clone)]
pub enum Part {
    /// A plain-text part.
    Text(String),
    /// Plain-text and HTML renderings of the same content, packed as
    /// multipart/alternative.
    Alternative {
        /// Plain-text rendering.
        plain: String,
        /// HTML rendering.
        html: String,
    },
    /// A base64-encoded attachment.
    Attachment {
        /// MIME type of the content, e.g. `application/pdf`.
        content_type: String,
        /// File name presented to the recipient.
        file_name: String,
        /// Raw attachment bytes.
        content: Vec<u8>,
    },
}

impl Part {
    fn render(&self, lines: &mut Vec<String>) {
        match self {
            Self::Text(text) => {
                lines.push("Content-Transfer-Encoding: 8BIT".to_string());
                lines.push("Content-Type: text/plain; charset=utf-8".to_string());
                lines.push(String::new());
                lines.push(text.clone());
            }
            Self::Alternative { plain, html } => {
                let boundary = make_boundary("Alternative");
                lines.push(format!(
                    "Content-Type: multipart/alternative; boundary={boundary}"
                ));
                lines.push(String::new());
                lines.push(format!("--{boundary}"));
                lines.push("Content-Transfer-Encoding: 8BIT".to_string());
                lines.push("Content-Type: text/plain; charset=utf-8".to_string());
                lines.push(String::new());
                lines.push(plain.clone());
                lines.push(format!("--{boundary}"));
                lines.push("Content-Transfer-Encoding: 8BIT".to_string());
                lines.push("Content-Type: text/html; charset=utf-8".to_string());
                lines.push(String::new());
                lines.push(html.clone());
                lines.push(format!("--{boundary}--"));
            }
            Self::Attachment {
                content_type,
                file_name,
                content,
            } => {
                lines.push("Content-Transfer-Encoding: base64".to_string());
                lines.push(format!("Content-Type: {content_type}; name=\"{file_name}\""));
                lines.push(format!(
                    "Content-Disposition: attachment; filename=\"{file_name}\""
                ));
                lines.push(String::new());
                lines.push(encode_base64_wrapped(content));
            }
        }
    }
}

/// A rendered multipart/mixed body.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    lines: Vec<String>,
}

impl MultipartBody {
    /// Assembles the given parts under one multipart/mixed boundary.
    #[must_use]
    pub fn new(parts: &[Part]) -> Self {
        let boundary = make_boundary("Part");
        let mut lines = Vec::new();
        for part in parts {
            lines.push(format!("--{boundary}"));
            part.render(&mut lines);
        }
        lines.push(format!("--{boundary}--"));
        Self { boundary, lines }
    }

    /// The value for the message's `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }

    /// The body as CRLF-joined text.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines.join("\r\n")
    }
}
