//! # mailwren-mime
//!
//! Multipart MIME message building for email.
//!
//! This crate is pure templating: it renders message headers and
//! multipart bodies to bytes and knows nothing about the wire protocol.
//!
//! ## Quick Start
//!
//! ```
//! use mailwren_mime::Mail;
//!
//! # fn main() -> mailwren_mime::Result<()> {
//! let mail = Mail::builder()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Report")
//!     .alternative("See the attached report.", "<p>See the attached report.</p>")
//!     .attach("application/pdf", "report.pdf", vec![0x25, 0x50, 0x44, 0x46])
//!     .build()?;
//!
//! let bytes = mail.render();
//! # assert!(!bytes.is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod body;
mod error;
mod mail;

pub mod encoding;

pub use body::{MultipartBody, Part};
pub use error::{Error, Result};
pub use mail::{Mail, MailBuilder};
