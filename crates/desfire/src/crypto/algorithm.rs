//! Block-cipher and CMAC dispatch across the four DESFire key algorithms.
//!
//! DESFire branches on the active algorithm at every crypto touchpoint
//! (auth, secure-channel encode/decode, key change, KDF). This module is
//! the one place that match happens: everything above calls these free
//! functions with a [`KeyAlgorithm`] tag instead of re-dispatching.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use cmac::{Cmac, Mac};
use des::{Des, TdesEde2, TdesEde3};

use crate::error::{Error, Result};

/// The four key algorithms a DESFire PICC can authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// Single DES, 8-byte key, 8-byte block.
    Des,
    /// 2-key triple DES, 16-byte key, 8-byte block.
    Tdea2,
    /// 3-key triple DES, 24-byte key, 8-byte block.
    Tdea3,
    /// AES-128, 16-byte key, 16-byte block.
    Aes,
}

impl KeyAlgorithm {
    /// Raw key length in bytes.
    pub const fn key_len(self) -> usize {
        match self {
            Self::Des => 8,
            Self::Tdea2 => 16,
            Self::Tdea3 => 24,
            Self::Aes => 16,
        }
    }

    /// Cipher block length in bytes.
    pub const fn block_len(self) -> usize {
        match self {
            Self::Aes => 16,
            Self::Des | Self::Tdea2 | Self::Tdea3 => 8,
        }
    }

    /// True for the AES family (16-byte blocks); false for the DES family.
    pub const fn is_aes(self) -> bool {
        matches!(self, Self::Aes)
    }
}

fn check_block_aligned(algo: KeyAlgorithm, data: &[u8]) -> Result<()> {
    if data.len() % algo.block_len() != 0 {
        return Err(Error::EncodingFailure("data not block-aligned for cipher"));
    }
    Ok(())
}

/// CBC-encrypt `data` in place under `key`/`iv`, no padding (caller pads).
pub fn cbc_encrypt(algo: KeyAlgorithm, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    check_block_aligned(algo, data)?;
    macro_rules! go {
        ($Cipher:ty) => {{
            let mut enc = cbc::Encryptor::<$Cipher>::new_from_slices(key, iv)
                .map_err(|_| Error::EncodingFailure("invalid key/iv length"))?;
            let _ = enc
                .encrypt_padded_mut::<NoPadding>(data, data.len())
                .map_err(|_| Error::EncodingFailure("cbc encrypt failed"))?;
        }};
    }
    match algo {
        KeyAlgorithm::Des => go!(Des),
        KeyAlgorithm::Tdea2 => go!(TdesEde2),
        KeyAlgorithm::Tdea3 => go!(TdesEde3),
        KeyAlgorithm::Aes => go!(Aes128),
    }
    Ok(())
}

/// CBC-decrypt `data` in place under `key`/`iv`, no padding (caller strips).
pub fn cbc_decrypt(algo: KeyAlgorithm, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    check_block_aligned(algo, data)?;
    macro_rules! go {
        ($Cipher:ty) => {{
            let mut dec = cbc::Decryptor::<$Cipher>::new_from_slices(key, iv)
                .map_err(|_| Error::EncodingFailure("invalid key/iv length"))?;
            let _ = dec
                .decrypt_padded_mut::<NoPadding>(data)
                .map_err(|_| Error::EncodingFailure("cbc decrypt failed"))?;
        }};
    }
    match algo {
        KeyAlgorithm::Des => go!(Des),
        KeyAlgorithm::Tdea2 => go!(TdesEde2),
        KeyAlgorithm::Tdea3 => go!(TdesEde3),
        KeyAlgorithm::Aes => go!(Aes128),
    }
    Ok(())
}

/// Single-block ECB decrypt, the legacy D40 "encryption" primitive
/// (see [`crate::auth::legacy`]). Block length must match the algorithm.
pub fn ecb_decrypt_block(algo: KeyAlgorithm, key: &[u8], block: &mut [u8]) -> Result<()> {
    check_block_aligned(algo, block)?;
    macro_rules! go {
        ($Cipher:ty) => {{
            let cipher = <$Cipher>::new_from_slice(key)
                .map_err(|_| Error::EncodingFailure("invalid key length"))?;
            let ga = GenericArray::from_mut_slice(block);
            cipher.decrypt_block(ga);
        }};
    }
    match algo {
        KeyAlgorithm::Des => go!(Des),
        KeyAlgorithm::Tdea2 => go!(TdesEde2),
        KeyAlgorithm::Tdea3 => go!(TdesEde3),
        KeyAlgorithm::Aes => go!(Aes128),
    }
    Ok(())
}

/// Single-block ECB encrypt.
pub fn ecb_encrypt_block(algo: KeyAlgorithm, key: &[u8], block: &mut [u8]) -> Result<()> {
    check_block_aligned(algo, block)?;
    macro_rules! go {
        ($Cipher:ty) => {{
            let cipher = <$Cipher>::new_from_slice(key)
                .map_err(|_| Error::EncodingFailure("invalid key length"))?;
            let ga = GenericArray::from_mut_slice(block);
            cipher.encrypt_block(ga);
        }};
    }
    match algo {
        KeyAlgorithm::Des => go!(Des),
        KeyAlgorithm::Tdea2 => go!(TdesEde2),
        KeyAlgorithm::Tdea3 => go!(TdesEde3),
        KeyAlgorithm::Aes => go!(Aes128),
    }
    Ok(())
}

/// Full-width CMAC (OMAC1) over `data` under `key`. Returns a tag of
/// `algo.block_len()` bytes; callers needing the wire MAC truncate to 8.
pub fn cmac(algo: KeyAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    macro_rules! go {
        ($Cipher:ty) => {{
            let mut mac = Cmac::<$Cipher>::new_from_slice(key)
                .map_err(|_| Error::EncodingFailure("invalid key length"))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }};
    }
    Ok(match algo {
        KeyAlgorithm::Des => go!(Des),
        KeyAlgorithm::Tdea2 => go!(TdesEde2),
        KeyAlgorithm::Tdea3 => go!(TdesEde3),
        KeyAlgorithm::Aes => go!(Aes128),
    })
}

/// Truncate a full CMAC tag to the 8-byte wire format DESFire uses.
///
/// AES/3K3DES CMAC produces a 16-byte tag, and DESFire's truncation takes
/// the odd-indexed bytes rather than a prefix. The TDEA families' CMAC
/// block size is already 8 bytes, so there the full tag *is* the wire
/// format and is passed through unchanged.
pub fn truncate_mac(full: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    if full.len() <= 8 {
        out[..full.len()].copy_from_slice(full);
    } else {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = full[2 * i + 1];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_and_key_lengths() {
        assert_eq!(KeyAlgorithm::Des.key_len(), 8);
        assert_eq!(KeyAlgorithm::Des.block_len(), 8);
        assert_eq!(KeyAlgorithm::Tdea2.key_len(), 16);
        assert_eq!(KeyAlgorithm::Tdea3.key_len(), 24);
        assert_eq!(KeyAlgorithm::Aes.key_len(), 16);
        assert_eq!(KeyAlgorithm::Aes.block_len(), 16);
        assert!(KeyAlgorithm::Aes.is_aes());
        assert!(!KeyAlgorithm::Des.is_aes());
    }

    #[test]
    fn des_ecb_roundtrip() {
        let key = [0u8; 8];
        let mut block = *b"ABCDEFGH";
        let plain = block;
        ecb_encrypt_block(KeyAlgorithm::Des, &key, &mut block).unwrap();
        assert_ne!(block, plain);
        ecb_decrypt_block(KeyAlgorithm::Des, &key, &mut block).unwrap();
        assert_eq!(block, plain);
    }

    #[test]
    fn aes_cbc_roundtrip() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        let plain = [0x11u8; 32];
        let mut buf = plain;
        cbc_encrypt(KeyAlgorithm::Aes, &key, &iv, &mut buf).unwrap();
        assert_ne!(buf, plain);
        cbc_decrypt(KeyAlgorithm::Aes, &key, &iv, &mut buf).unwrap();
        assert_eq!(buf, plain);
    }

    #[test]
    fn truncate_takes_odd_bytes() {
        let full: Vec<u8> = (0u8..16).collect();
        let t = truncate_mac(&full);
        assert_eq!(t, [1, 3, 5, 7, 9, 11, 13, 15]);
    }

    #[test]
    fn truncate_passes_through_tdea_block_sized_tag() {
        // TDEA-CMAC's block size is 8 bytes: already the wire format.
        let full: Vec<u8> = (0u8..8).collect();
        let t = truncate_mac(&full);
        assert_eq!(t, [0, 1, 2, 3, 4, 5, 6, 7]);
    }
}
