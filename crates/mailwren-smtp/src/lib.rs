//! # mailwren-smtp
//!
//! An async SMTP client library (RFC 5321) built on tokio and rustls.
//!
//! The heart of the crate is the **session engine**: one background task
//! per connection owns the transport and serializes command/response
//! exchange strictly first-in-first-out, so replies always correlate to
//! the command that prompted them and a disconnect fails every pending
//! request instead of leaving waiters dangling.
//!
//! ## Features
//!
//! - **Strict single-flight exchange**: one command in flight per
//!   connection, enforced by construction
//! - **Opportunistic STARTTLS**: the transport is swapped for TLS
//!   between command boundaries when the server advertises it
//! - **Implicit TLS** (port 465) and plaintext modes
//! - **Capability discovery**: EHLO parsing into an immutable snapshot,
//!   re-derived after the upgrade
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwren_smtp::{Address, Security, SmtpClient, TlsParameters};
//!
//! #[tokio::main]
//! async fn main() -> mailwren_smtp::Result<()> {
//!     let security = Security::StartTls(TlsParameters::DefaultRoots);
//!     let client = SmtpClient::connect("smtp.example.com", 587, security).await?;
//!
//!     let from = Address::new("sender@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!
//!     client.send_mail(&from, &[to], message).await?;
//!     client.quit().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP commands and their wire encoding
//! - [`codec`]: incremental reply decoder
//! - [`connection`]: transport, TLS configuration, session queue, client
//! - [`types`]: replies, capabilities, envelope addresses

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod command;
pub mod connection;
mod error;
pub mod types;

pub use command::Command;
pub use connection::{Security, SmtpClient, SmtpStream, TlsParameters};
pub use error::{Error, Result};
pub use types::{Address, Capability, Handshake, Response, ResponseCode};
