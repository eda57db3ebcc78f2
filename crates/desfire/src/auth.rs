//! Authentication engine: the three challenge-response variants (legacy
//! D40, EV1, EV2) plus the ISO external/internal-authenticate variant, and
//! the dispatcher that picks one from `(command set, algorithm)`.
//!
//! All four share the outer skeleton from spec §4.4: send `Authenticate`,
//! decrypt `RndB`, couple it with a freshly chosen `RndA` via left
//! rotation, send the encrypted pair, verify the card's echoed `RndA'`,
//! then derive session keys. Any failure at any step tears the session
//! back down to `Unauth` — callers never see a half-authenticated session.

use desfire_core::CardTransport;
use rand::RngCore;

use crate::constants::{auth_cmd, ADDITIONAL_FRAME, OPERATION_OK};
use crate::crypto::algorithm::{cbc_decrypt, cbc_encrypt, cmac, ecb_decrypt_block, truncate_mac};
use crate::crypto::{Key, KeyAlgorithm};
use crate::error::{AuthFailureReason, Error, Result};
use crate::session::{CommandSet, SecureChannelVariant, SessionState};
use crate::util::rol;

use crate::transport::FrameTransport;

fn fail(reason: AuthFailureReason) -> Error {
    Error::AuthenticationFailed(reason)
}

/// A source of reader-chosen random nonces. Production callers use
/// [`RandRng`]; tests substitute a fixed sequence to replay the scenarios
/// in spec §8.
pub trait NonceSource {
    fn next_nonce(&mut self, len: usize) -> Vec<u8>;
}

/// The default nonce source, backed by the system RNG.
#[derive(Debug, Default)]
pub struct RandRng;

impl NonceSource for RandRng {
    fn next_nonce(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        rand::rng().fill_bytes(&mut buf);
        buf
    }
}

/// Fixed-nonce source for deterministic tests.
#[cfg(test)]
#[derive(Debug)]
pub struct FixedRng(pub Vec<u8>);

#[cfg(test)]
impl NonceSource for FixedRng {
    fn next_nonce(&mut self, len: usize) -> Vec<u8> {
        self.0[..len].to_vec()
    }
}

/// Run the legacy D40 authentication variant (sub-command `0x0A`).
///
/// Step 3's "encryption" is DES/3DES *decrypt* applied as the forward
/// primitive, a historical quirk this crate preserves exactly rather than
/// "fixing" to encrypt (see spec §9's retained questions).
pub fn legacy<T: CardTransport>(
    ft: &mut FrameTransport<T>,
    command_set: CommandSet,
    key: &Key,
    key_no: u8,
    rng: &mut dyn NonceSource,
) -> Result<SessionState> {
    let algo = key.algorithm();
    let block_len = algo.block_len();
    let key_bytes = key.versioned_bytes();

    let first = ft.exchange(command_set, auth_cmd::LEGACY, &[key_no], false)?;
    if first.status != ADDITIONAL_FRAME {
        return Err(fail(AuthFailureReason::NoAdditionalFrame));
    }
    if first.data.len() != block_len {
        return Err(fail(AuthFailureReason::BadChallengeLength));
    }

    let mut rnd_b = first.data.to_vec();
    ecb_decrypt_block(algo, &key_bytes, &mut rnd_b)?;

    let rnd_a = rng.next_nonce(block_len);
    let rot_rnd_b = rol(&rnd_b);

    // enc_rnd_a = DES_dec(RndA); enc_rnd_b = DES_dec(rotRndB XOR enc_rnd_a)
    let mut enc_rnd_a = rnd_a.clone();
    ecb_decrypt_block(algo, &key_bytes, &mut enc_rnd_a)?;

    let mut chained: Vec<u8> = rot_rnd_b.iter().zip(enc_rnd_a.iter()).map(|(a, b)| a ^ b).collect();
    ecb_decrypt_block(algo, &key_bytes, &mut chained)?;

    let mut both = enc_rnd_a.clone();
    both.extend_from_slice(&chained);

    let second = ft.exchange(command_set, ADDITIONAL_FRAME, &both, false)?;
    if second.status != OPERATION_OK {
        return Err(fail(AuthFailureReason::FinalStatusNotOk));
    }
    if second.data.len() != block_len {
        return Err(fail(AuthFailureReason::BadResponseLength));
    }

    let mut rnd_a_prime = second.data.to_vec();
    ecb_decrypt_block(algo, &key_bytes, &mut rnd_a_prime)?;
    if rnd_a_prime != rol(&rnd_a) {
        return Err(fail(AuthFailureReason::RndAMismatch));
    }

    let session_key = legacy_session_key(&rnd_a, &rnd_b, algo);
    Ok(SessionState::established(
        SecureChannelVariant::D40,
        command_set,
        algo,
        key_no,
        session_key.clone(),
        session_key,
        None,
    ))
}

/// D40 session-key construction: `RndA[0..4] || RndB[0..4]` repeated for
/// single DES (the key has no "second half" to draw from); the true
/// 3DES halves `RndA[0..4]||RndB[0..4]||RndA[4..8]||RndB[4..8]` otherwise.
fn legacy_session_key(rnd_a: &[u8], rnd_b: &[u8], algo: KeyAlgorithm) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&rnd_a[0..4]);
    out.extend_from_slice(&rnd_b[0..4]);
    if algo == KeyAlgorithm::Des {
        out.extend_from_slice(&rnd_a[0..4]);
        out.extend_from_slice(&rnd_b[0..4]);
    } else {
        out.extend_from_slice(&rnd_a[4..8]);
        out.extend_from_slice(&rnd_b[4..8]);
    }
    out
}

/// Run the EV1 authentication variant (sub-command `0x1A` TDEA, `0xAA` AES).
pub fn ev1<T: CardTransport>(
    ft: &mut FrameTransport<T>,
    command_set: CommandSet,
    key: &Key,
    key_no: u8,
    rng: &mut dyn NonceSource,
) -> Result<SessionState> {
    let algo = key.algorithm();
    let block_len = algo.block_len();
    let key_bytes = key.versioned_bytes();
    let subcmd = if algo == KeyAlgorithm::Aes { auth_cmd::EV1_AES } else { auth_cmd::EV1_ISO };

    let first = ft.exchange(command_set, subcmd, &[key_no], false)?;
    if first.status != ADDITIONAL_FRAME {
        return Err(fail(AuthFailureReason::NoAdditionalFrame));
    }
    if first.data.len() != block_len {
        return Err(fail(AuthFailureReason::BadChallengeLength));
    }

    let zero_iv = vec![0u8; block_len];
    let mut rnd_b = first.data.to_vec();
    cbc_decrypt(algo, &key_bytes, &zero_iv, &mut rnd_b)?;

    let rnd_a = rng.next_nonce(block_len);
    let rot_rnd_b = rol(&rnd_b);

    let mut both = rnd_a.clone();
    both.extend_from_slice(&rot_rnd_b);
    cbc_encrypt(algo, &key_bytes, &zero_iv, &mut both)?;

    let second = ft.exchange(command_set, ADDITIONAL_FRAME, &both, false)?;
    if second.status != OPERATION_OK {
        return Err(fail(AuthFailureReason::FinalStatusNotOk));
    }
    if second.data.len() != block_len {
        return Err(fail(AuthFailureReason::BadResponseLength));
    }

    let mut rnd_a_prime = second.data.to_vec();
    cbc_decrypt(algo, &key_bytes, &zero_iv, &mut rnd_a_prime)?;
    if rnd_a_prime != rol(&rnd_a) {
        return Err(fail(AuthFailureReason::RndAMismatch));
    }

    let session_key = ev1_session_key(&rnd_a, &rnd_b, algo);
    Ok(SessionState::established(
        SecureChannelVariant::Ev1,
        command_set,
        algo,
        key_no,
        session_key.clone(),
        session_key,
        None,
    ))
}

/// EV1 session-key construction: first and last 4-byte chunks of `RndA`/
/// `RndB`, interleaved. AES/2TDEA per spec §4.4 verbatim; for 8-byte
/// DES-family nonces "first" and "last" are the same two halves, so the
/// natural 16-byte result is `A[0..4]||B[0..4]||A[4..8]||B[4..8]`. 3K3DES
/// needs a third 8-byte key and has no third nonce half to draw from, so
/// its session key appends the first chunk again
/// (`A[0..4]||B[0..4]||A[4..8]||B[4..8]||A[0..4]||B[0..4]`), the standard
/// NXP 3K3DES EV1 session-key slicing. This is this crate's resolution of
/// a detail the distilled spec leaves implicit.
fn ev1_session_key(rnd_a: &[u8], rnd_b: &[u8], algo: KeyAlgorithm) -> Vec<u8> {
    let n = rnd_a.len();
    let mut out = Vec::with_capacity(algo.key_len());
    out.extend_from_slice(&rnd_a[0..4]);
    out.extend_from_slice(&rnd_b[0..4]);
    out.extend_from_slice(&rnd_a[n - 4..n]);
    out.extend_from_slice(&rnd_b[n - 4..n]);
    if algo == KeyAlgorithm::Tdea3 {
        out.extend_from_slice(&rnd_a[0..4]);
        out.extend_from_slice(&rnd_b[0..4]);
    }
    out
}

/// Run an EV2 authentication (sub-command `0x71` first, `0x77` non-first).
pub fn ev2<T: CardTransport>(
    ft: &mut FrameTransport<T>,
    command_set: CommandSet,
    key: &Key,
    key_no: u8,
    first_auth: bool,
    existing_ti: Option<[u8; 4]>,
    rng: &mut dyn NonceSource,
) -> Result<SessionState> {
    if key.algorithm() != KeyAlgorithm::Aes {
        return Err(Error::InvalidArgument("EV2 authentication requires an AES key"));
    }
    let algo = KeyAlgorithm::Aes;
    let key_bytes = key.versioned_bytes();
    let subcmd = if first_auth { auth_cmd::EV2_FIRST } else { auth_cmd::EV2_NON_FIRST };

    let payload: Vec<u8> = if first_auth { vec![key_no, 0x00] } else { vec![key_no] };
    let first = ft.exchange(command_set, subcmd, &payload, false)?;
    if first.status != ADDITIONAL_FRAME {
        return Err(fail(AuthFailureReason::NoAdditionalFrame));
    }
    if first.data.len() != 16 {
        return Err(fail(AuthFailureReason::BadChallengeLength));
    }

    let zero_iv = vec![0u8; 16];
    let mut rnd_b = first.data.to_vec();
    cbc_decrypt(algo, &key_bytes, &zero_iv, &mut rnd_b)?;

    let rnd_a = rng.next_nonce(16);
    let rot_rnd_b = rol(&rnd_b);

    let mut both = rnd_a.clone();
    both.extend_from_slice(&rot_rnd_b);
    cbc_encrypt(algo, &key_bytes, &zero_iv, &mut both)?;

    let second = ft.exchange(command_set, ADDITIONAL_FRAME, &both, false)?;
    if second.status != OPERATION_OK {
        return Err(fail(AuthFailureReason::FinalStatusNotOk));
    }
    let expected_len = if first_auth { 32 } else { 16 };
    if second.data.len() != expected_len {
        return Err(fail(AuthFailureReason::BadResponseLength));
    }

    let mut decrypted = second.data.to_vec();
    cbc_decrypt(algo, &key_bytes, &zero_iv, &mut decrypted)?;

    let (ti, rnd_a_prime) = if first_auth {
        let mut ti = [0u8; 4];
        ti.copy_from_slice(&decrypted[0..4]);
        (Some(ti), decrypted[4..20].to_vec())
    } else {
        (existing_ti, decrypted[0..16].to_vec())
    };

    if rnd_a_prime != rol(&rnd_a) {
        return Err(fail(AuthFailureReason::RndAMismatch));
    }
    let ti = ti.ok_or_else(|| fail(AuthFailureReason::NoChannelAfterSuccess))?;

    let enc_key = derive_ev2_session_key(&key_bytes, &rnd_a, &rnd_b, true)?;
    let mac_key = derive_ev2_session_key(&key_bytes, &rnd_a, &rnd_b, false)?;

    Ok(SessionState::established(
        SecureChannelVariant::Ev2,
        command_set,
        algo,
        key_no,
        enc_key,
        mac_key,
        Some(ti),
    ))
}

/// EV2 session-key derivation (spec §4.4): AES-CMAC under the long-term
/// key, input `RndA[0..2] || (RndA[2..8] XOR RndB[0..6]) || RndB[6..16] ||
/// RndA[8..16]`, with a fixed context prefix distinguishing the encryption
/// key (`0xA5 0x5A`) from the MAC key (`0x5A 0xA5`).
fn derive_ev2_session_key(key: &[u8], rnd_a: &[u8], rnd_b: &[u8], for_enc: bool) -> Result<Vec<u8>> {
    let mut sv = if for_enc { vec![0xA5, 0x5A] } else { vec![0x5A, 0xA5] };
    sv.extend_from_slice(&[0x00, 0x01, 0x00, 0x80]);
    sv.extend_from_slice(&rnd_a[0..2]);

    let xored: Vec<u8> = rnd_a[2..8].iter().zip(rnd_b[0..6].iter()).map(|(a, b)| a ^ b).collect();
    sv.extend_from_slice(&xored);
    sv.extend_from_slice(&rnd_b[6..16]);
    sv.extend_from_slice(&rnd_a[8..16]);

    let full = cmac(KeyAlgorithm::Aes, key, &sv)?;
    Ok(full)
}

/// Run the ISO authentication variant: `GET_CHALLENGE` → `EXTERNAL_AUTHENTICATE`
/// → `INTERNAL_AUTHENTICATE`, secure channel EV1.
pub fn iso<T: CardTransport>(
    ft: &mut FrameTransport<T>,
    command_set: CommandSet,
    key: &Key,
    key_no: u8,
    rng: &mut dyn NonceSource,
) -> Result<SessionState> {
    let algo = key.algorithm();
    let block_len = algo.block_len();
    let key_bytes = key.versioned_bytes();

    let host_rnd = rng.next_nonce(block_len);
    let host_rnd2 = rng.next_nonce(block_len);

    let picc_rnd = iso_get_challenge(ft, block_len)
        .map_err(|_| fail(AuthFailureReason::IsoGetChallengeFailed))?;

    let mut both = host_rnd.clone();
    both.extend_from_slice(&picc_rnd);
    let zero_iv = vec![0u8; block_len];
    cbc_encrypt(algo, &key_bytes, &zero_iv, &mut both)?;

    iso_external_authenticate(ft, key_no, &both)
        .map_err(|_| fail(AuthFailureReason::IsoExternalAuthFailed))?;

    let mut challenge = host_rnd2.clone();
    cbc_encrypt(algo, &key_bytes, &zero_iv, &mut challenge)?;
    let rnd_data = iso_internal_authenticate(ft, key_no, &challenge)
        .map_err(|_| fail(AuthFailureReason::IsoInternalAuthFailed))?;

    if rnd_data.len() != block_len * 2 {
        return Err(fail(AuthFailureReason::BadResponseLength));
    }
    let mut decoded = rnd_data;
    cbc_decrypt(algo, &key_bytes, &zero_iv, &mut decoded)?;

    let picc_rnd2 = &decoded[0..block_len];
    let echoed_host_rnd2 = &decoded[block_len..];
    if echoed_host_rnd2 != host_rnd2 {
        return Err(fail(AuthFailureReason::IsoHostRandomMismatch));
    }

    let session_key = ev1_session_key(&host_rnd, picc_rnd2, algo);
    Ok(SessionState::established(
        SecureChannelVariant::Ev1,
        command_set,
        algo,
        key_no,
        session_key.clone(),
        session_key,
        None,
    ))
}

pub(crate) fn iso_get_challenge<T: CardTransport>(ft: &mut FrameTransport<T>, len: usize) -> Result<Vec<u8>> {
    let apdu = [0x00, crate::constants::cmd::ISO_GET_CHALLENGE, 0x00, 0x00, len as u8];
    let resp = ft.transmit_iso(&apdu)?;
    if resp.len() < 2 + len {
        return Err(Error::UnexpectedResponseLength(resp.len(), len + 2));
    }
    Ok(resp[..len].to_vec())
}

pub(crate) fn iso_external_authenticate<T: CardTransport>(
    ft: &mut FrameTransport<T>,
    key_no: u8,
    cryptogram: &[u8],
) -> Result<()> {
    let mut apdu = vec![0x00, crate::constants::cmd::ISO_EXTERNAL_AUTHENTICATE, 0x00, key_no, cryptogram.len() as u8];
    apdu.extend_from_slice(cryptogram);
    let resp = ft.transmit_iso(&apdu)?;
    if resp.len() < 2 || resp[resp.len() - 2] != 0x90 || resp[resp.len() - 1] != 0x00 {
        return Err(Error::from_status_byte(*resp.last().unwrap_or(&0xFF)));
    }
    Ok(())
}

pub(crate) fn iso_internal_authenticate<T: CardTransport>(
    ft: &mut FrameTransport<T>,
    key_no: u8,
    challenge: &[u8],
) -> Result<Vec<u8>> {
    let mut apdu = vec![0x00, crate::constants::cmd::ISO_INTERNAL_AUTHENTICATE, 0x00, key_no, challenge.len() as u8];
    apdu.extend_from_slice(challenge);
    apdu.push(0x00);
    let resp = ft.transmit_iso(&apdu)?;
    if resp.len() < 2 {
        return Err(Error::UnexpectedResponseLength(resp.len(), 2));
    }
    let split = resp.len() - 2;
    if resp[split] != 0x90 || resp[split + 1] != 0x00 {
        return Err(Error::from_status_byte(resp[split + 1]));
    }
    Ok(resp[..split].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use desfire_core::transport::MockTransport;

    #[test]
    fn legacy_des_auth_matches_scenario() {
        // spec §8 scenario 1
        let key = Key::zero(KeyAlgorithm::Des);
        let mock = MockTransport::new(vec![
            Bytes::from_static(&[0xAF, 0x5D, 0x99, 0x4C, 0xE0, 0x85, 0xF2, 0x40, 0x89]),
            Bytes::from_static(&[0x00, 0x1E, 0x4F, 0x8C, 0x90, 0x8A, 0x8B, 0x02]),
        ]);
        let mut ft = FrameTransport::new(mock);
        let mut rng = FixedRng(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);

        let session = legacy(&mut ft, CommandSet::Native, &key, 0, &mut rng).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.enc_key().len(), 16);
        assert_eq!(&session.enc_key()[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&session.enc_key()[4..8], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&session.enc_key()[8..12], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&session.enc_key()[12..16], &[0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn legacy_bad_first_status_fails() {
        let key = Key::zero(KeyAlgorithm::Des);
        let mock = MockTransport::with_response(Bytes::from_static(&[0x1C]));
        let mut ft = FrameTransport::new(mock);
        let mut rng = FixedRng(vec![0u8; 8]);
        let err = legacy(&mut ft, CommandSet::Native, &key, 0, &mut rng).unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(AuthFailureReason::NoAdditionalFrame)));
    }

    #[test]
    fn ev2_requires_aes() {
        let key = Key::zero(KeyAlgorithm::Des);
        let mock = MockTransport::with_success();
        let mut ft = FrameTransport::new(mock);
        let mut rng = FixedRng(vec![0u8; 16]);
        assert!(ev2(&mut ft, CommandSet::Native, &key, 0, true, None, &mut rng).is_err());
    }
}
