//! Connection management: transport, TLS configuration, the session
//! queue, and the client facade.

mod client;
mod queue;
mod stream;
mod tls;

pub use client::SmtpClient;
pub use stream::SmtpStream;
pub use tls::{Security, TlsParameters};
