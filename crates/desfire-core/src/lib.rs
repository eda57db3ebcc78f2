//! Transport-agnostic APDU plumbing for smart card communication.
//!
//! This crate provides the [`CardTransport`] trait and its supporting error
//! types: the seam between a physical reader (PC/SC, NFC, a mock) and a
//! protocol layer built on top of it. It has no knowledge of any particular
//! card's command set or secure channel.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod transport;

mod error;
pub use error::{Error, Result};

pub use transport::CardTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{transport::CardTransport, Bytes, BytesMut, Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn mock_transport_round_trip() {
        let mut transport = MockTransport::with_success();
        let resp = transport.transmit_raw(&[0x00, 0xA4, 0x04, 0x00]).unwrap();
        assert_eq!(&resp[..], &[0x90, 0x00]);
        assert_eq!(transport.commands.len(), 1);
    }
}
