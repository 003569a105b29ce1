//! Core SMTP types.

mod address;
mod capability;
mod response;

pub use address::Address;
pub use capability::{Capability, Handshake};
pub use response::{Response, ResponseCode};
