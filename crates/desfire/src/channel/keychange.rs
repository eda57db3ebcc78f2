//! `ChangeKey` cryptogram construction (spec §4.3).
//!
//! The plaintext differs depending on whether the key being changed is the
//! one currently authenticated, and the CRC differs by variant.

use bytes::{Bytes, BytesMut};

use crate::crypto::algorithm::{cbc_encrypt, ecb_decrypt_block};
use crate::crypto::crc::{crc16, crc32};
use crate::crypto::{Key, KeyAlgorithm};
use crate::error::Result;
use crate::session::SessionState;

/// Build the key-change cryptogram and return it ciphertext, ready to
/// append to a `ChangeKey` command body.
///
/// `key_no_byte` is the wire key-number byte, already carrying the new
/// algorithm in bits 7-6 for a PICC master-key change.
pub fn build(
    session: &SessionState,
    key_no_byte: u8,
    new_key: &Key,
    old_key: Option<&Key>,
) -> Result<Bytes> {
    let changing_current = old_key.is_none();
    let use_crc32 = !matches!(session.variant(), crate::session::SecureChannelVariant::D40);

    let mut plaintext = BytesMut::new();

    if changing_current {
        plaintext.extend_from_slice(&new_key.versioned_bytes());
        if new_key.algorithm() == KeyAlgorithm::Aes {
            plaintext.extend_from_slice(&[new_key.version()]);
        }
    } else {
        let old = old_key.expect("changing_current is false implies old_key is Some");
        let xored: Vec<u8> = new_key
            .versioned_bytes()
            .iter()
            .zip(old.versioned_bytes().iter())
            .map(|(a, b)| a ^ b)
            .collect();
        plaintext.extend_from_slice(&xored);
        if new_key.algorithm() == KeyAlgorithm::Aes {
            plaintext.extend_from_slice(&[new_key.version()]);
        }
    }

    let mut crc_input = vec![crate::constants::cmd::CHANGE_KEY, key_no_byte];
    crc_input.extend_from_slice(&plaintext);
    if use_crc32 {
        plaintext.extend_from_slice(&crc32(&crc_input).to_le_bytes());
    } else {
        plaintext.extend_from_slice(&crc16(&crc_input).to_le_bytes());
    }

    if !changing_current {
        // A second CRC, over the new key alone, lets the card verify the
        // XOR'd cryptogram decoded to the intended key even when it can't
        // decrypt with the (unknown, being-replaced) old key's session state.
        let new_key_crc_input = new_key.versioned_bytes();
        if use_crc32 {
            plaintext.extend_from_slice(&crc32(&new_key_crc_input).to_le_bytes());
        } else {
            plaintext.extend_from_slice(&crc16(&new_key_crc_input).to_le_bytes());
        }
    }

    let block_len = session.algorithm().block_len();
    let pad = (block_len - (plaintext.len() % block_len)) % block_len;
    plaintext.extend(core::iter::repeat_n(0u8, pad));

    let mut buf = plaintext.to_vec();
    match session.variant() {
        crate::session::SecureChannelVariant::D40 => {
            // Legacy key change reuses the auth-step "decrypt as encrypt"
            // primitive, block by block, zero IV.
            for block in buf.chunks_mut(block_len) {
                ecb_decrypt_block(session.algorithm(), session.enc_key(), block)?;
            }
        }
        _ => {
            cbc_encrypt(session.algorithm(), session.enc_key(), session.iv(), &mut buf)?;
        }
    }

    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CommandSet, SecureChannelVariant};

    #[test]
    fn current_key_change_has_no_trailing_new_key_crc() {
        let session = SessionState::established(
            SecureChannelVariant::Ev1,
            CommandSet::Native,
            KeyAlgorithm::Aes,
            0,
            vec![0u8; 16],
            vec![0u8; 16],
            None,
        );
        let new_key = Key::new(KeyAlgorithm::Aes, vec![1u8; 16], 1).unwrap();
        let cryptogram = build(&session, 0x00, &new_key, None).unwrap();
        // key(16) + version(1) + crc32(4) = 21, padded to 32
        assert_eq!(cryptogram.len(), 32);
    }

    #[test]
    fn other_key_change_is_longer() {
        let session = SessionState::established(
            SecureChannelVariant::Ev1,
            CommandSet::Native,
            KeyAlgorithm::Aes,
            0,
            vec![0u8; 16],
            vec![0u8; 16],
            None,
        );
        let new_key = Key::new(KeyAlgorithm::Aes, vec![1u8; 16], 1).unwrap();
        let old_key = Key::new(KeyAlgorithm::Aes, vec![0u8; 16], 0).unwrap();
        let cryptogram = build(&session, 0x01, &new_key, Some(&old_key)).unwrap();
        // xor(16) + version(1) + crc32(4) + crc32-of-newkey(4) = 25, padded to 32
        assert_eq!(cryptogram.len(), 32);
    }
}
