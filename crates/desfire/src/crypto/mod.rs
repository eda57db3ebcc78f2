//! Pure cryptographic building blocks: cipher dispatch, CRCs, and key material.
//!
//! Everything here is a pure function of its arguments; session state and
//! IV bookkeeping live one layer up in [`crate::session`] and
//! [`crate::channel`].

pub mod algorithm;
pub mod crc;
pub mod key;

pub use algorithm::KeyAlgorithm;
pub use key::Key;
