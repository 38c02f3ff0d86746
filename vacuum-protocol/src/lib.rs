//! Outer frame codec and secure inner framing for the cloud vacuum protocol.
//!
//! This crate is a pure function of its inputs — no sockets, no state, no
//! concurrency. [`vacuum_bus`](https://docs.rs/vacuum-bus) builds the
//! connection lifecycle and request dispatcher on top of it.

#![deny(unsafe_code)]

mod error;
mod frame;
mod secure;

pub use error::ProtocolError;
pub use frame::{Frame, FrameFields, ProtocolId, VERSION, decode, encode};
pub use secure::{SecurePrelude, decode_secure, parse_secure_prelude};
