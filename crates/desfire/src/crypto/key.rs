//! Key material: raw bytes, algorithm tag, version byte, and the two KDFs.

use zeroize::Zeroize;

use super::algorithm::{KeyAlgorithm, cmac, truncate_mac};
use crate::error::{Error, Result};

/// A DESFire key: raw bytes sized to its algorithm, plus a version byte.
///
/// For DES/TDEA families the version is folded into the parity bits of the
/// key bytes on the wire (see [`Key::versioned_bytes`]); for AES it travels
/// as a separate byte. The in-memory representation always keeps them
/// apart so callers never have to reason about parity munging.
#[derive(Clone)]
pub struct Key {
    algorithm: KeyAlgorithm,
    bytes: Vec<u8>,
    version: u8,
}

impl Drop for Key {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl core::fmt::Debug for Key {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Key")
            .field("algorithm", &self.algorithm)
            .field("version", &self.version)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl Key {
    /// Build a key from raw bytes; the length must match the algorithm's
    /// [`KeyAlgorithm::key_len`].
    pub fn new(algorithm: KeyAlgorithm, bytes: impl Into<Vec<u8>>, version: u8) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() != algorithm.key_len() {
            return Err(Error::InvalidArgument("key length does not match algorithm"));
        }
        Ok(Self {
            algorithm,
            bytes,
            version,
        })
    }

    /// Convenience constructor for an all-zero key of the given algorithm,
    /// the common PICC factory default.
    pub fn zero(algorithm: KeyAlgorithm) -> Self {
        Self {
            algorithm,
            bytes: vec![0u8; algorithm.key_len()],
            version: 0,
        }
    }

    /// The key's algorithm.
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// The raw key bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The key's stored version byte.
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Change the stored version byte (e.g. after a `ChangeKey`).
    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    /// DES/TDEA wire bytes with the version folded into the parity bit of
    /// every other byte. Key versions `>= 256` can't occur (the type is a
    /// `u8`) but per spec a version byte carries through untouched when the
    /// caller explicitly opts out via [`Key::versioned_bytes_raw`].
    pub fn versioned_bytes(&self) -> Vec<u8> {
        if self.algorithm.is_aes() {
            return self.bytes.clone();
        }
        let mut out = self.bytes.clone();
        for (i, byte) in out.iter_mut().enumerate() {
            let version_bit = (self.version >> (7 - (i % 8))) & 1;
            *byte = (*byte & 0xFE) | version_bit;
        }
        out
    }

    /// Raw key bytes, bypassing parity/version encoding entirely.
    pub fn versioned_bytes_raw(&self) -> &[u8] {
        &self.bytes
    }

    /// AN10922 key diversification: truncated CMAC(self, 0x01 || input) for
    /// AES/3K3DES, or two CMAC invocations with context bytes `0x21`/`0x22`
    /// (one per half) for 2TDEA, producing a diversified key of the same
    /// algorithm and length.
    pub fn diversify_an10922(&self, diversification_input: &[u8]) -> Result<Self> {
        if diversification_input.is_empty() || diversification_input.len() > 31 {
            return Err(Error::InvalidArgument(
                "AN10922 diversification input must be 1..=31 bytes",
            ));
        }

        let diversified = if self.algorithm == KeyAlgorithm::Tdea2 {
            let mut half1 = vec![0x21u8];
            half1.extend_from_slice(diversification_input);
            let mut half2 = vec![0x22u8];
            half2.extend_from_slice(diversification_input);

            let mut out = cmac(self.algorithm, &self.bytes, &half1)?;
            out.truncate(8);
            let mut second = cmac(self.algorithm, &self.bytes, &half2)?;
            second.truncate(8);
            out.extend_from_slice(&second);
            out
        } else {
            let mut input = vec![0x01u8];
            input.extend_from_slice(diversification_input);
            let full = cmac(self.algorithm, &self.bytes, &input)?;
            full[..self.algorithm.key_len()].to_vec()
        };

        Self::new(self.algorithm, diversified, self.version)
    }

    /// Gallagher-site key diversification: builds an 11-byte input from the
    /// PICC UID, key number, and selected AID, then runs the AN10922 KDF
    /// over it. The concrete 11-byte layout is deployment-specific and not
    /// pinned down by the source this crate was built from; callers with a
    /// site specification should construct the input themselves and call
    /// [`Key::diversify_an10922`] directly. This hook exists so that shape
    /// of integration is discoverable.
    pub fn diversify_gallagher(&self, uid: &[u8], key_no: u8, aid: u32) -> Result<Self> {
        if uid.len() > 7 {
            return Err(Error::InvalidArgument("UID too long for Gallagher KDF input"));
        }
        let mut input = Vec::with_capacity(11);
        input.extend_from_slice(uid);
        input.resize(7, 0);
        input.push(key_no);
        input.extend_from_slice(&aid.to_le_bytes()[..3]);
        self.diversify_an10922(&input)
    }

    /// Truncated CMAC tag over `data` under this key (8 bytes, DESFire wire
    /// format).
    pub fn mac(&self, data: &[u8]) -> Result<[u8; 8]> {
        let full = cmac(self.algorithm, &self.bytes, data)?;
        Ok(truncate_mac(&full))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(Key::new(KeyAlgorithm::Aes, vec![0u8; 8], 0).is_err());
    }

    #[test]
    fn aes_versioned_bytes_is_identity() {
        let key = Key::new(KeyAlgorithm::Aes, vec![7u8; 16], 3).unwrap();
        assert_eq!(key.versioned_bytes(), vec![7u8; 16]);
    }

    #[test]
    fn des_version_folds_into_parity() {
        let key = Key::new(KeyAlgorithm::Des, vec![0u8; 8], 0xFF).unwrap();
        let versioned = key.versioned_bytes();
        // every byte's parity bit should now be set to 1 per the 0xFF version
        for byte in versioned {
            assert_eq!(byte & 1, 1);
        }
    }

    #[test]
    fn an10922_tdea2_produces_two_halves() {
        let key = Key::new(KeyAlgorithm::Tdea2, vec![0u8; 16], 0).unwrap();
        let diversified = key.diversify_an10922(&[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(diversified.bytes().len(), 16);
    }

    #[test]
    fn an10922_rejects_oversized_input() {
        let key = Key::new(KeyAlgorithm::Aes, vec![0u8; 16], 0).unwrap();
        assert!(key.diversify_an10922(&[0u8; 32]).is_err());
    }
}
