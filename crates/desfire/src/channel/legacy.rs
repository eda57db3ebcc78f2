//! D40 (legacy) secure-channel cryptogram codec.

use bytes::{Bytes, BytesMut};

use crate::crypto::algorithm::{cbc_decrypt, cbc_encrypt};
use crate::crypto::crc::crc16;
use crate::error::{Error, Result};
use crate::session::SessionState;

/// Encode an outgoing `(cmd, payload)` under D40 Plain/MACed/Enciphered.
pub fn encode(session: &SessionState, payload: &[u8], mac: bool, enciphered: bool) -> Result<Bytes> {
    if enciphered {
        let mut plain = BytesMut::from(payload);
        let crc = crc16(payload);
        plain.extend_from_slice(&crc.to_le_bytes());

        let block_len = session.algorithm().block_len();
        let pad = (block_len - (plain.len() % block_len)) % block_len;
        plain.extend(core::iter::repeat_n(0u8, pad));

        let zero_iv = vec![0u8; block_len];
        let mut buf = plain.to_vec();
        cbc_encrypt(session.algorithm(), session.enc_key(), &zero_iv, &mut buf)?;
        Ok(Bytes::from(buf))
    } else if mac {
        // D40 has no real CMAC; a CRC16 trailer stands in for the MAC, the
        // reader's running IV still advances but nothing beyond the CRC is
        // put on the wire.
        let mut out = BytesMut::from(payload);
        let crc = crc16(payload);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(out.freeze())
    } else {
        Ok(Bytes::copy_from_slice(payload))
    }
}

/// Decode an incoming response under D40 Plain/MACed/Enciphered.
pub fn decode(session: &SessionState, raw: &[u8], mac: bool, enciphered: bool) -> Result<Bytes> {
    if enciphered {
        let block_len = session.algorithm().block_len();
        if raw.is_empty() {
            return Ok(Bytes::new());
        }
        if raw.len() % block_len != 0 {
            return Err(Error::UnexpectedResponseLength(raw.len(), raw.len()));
        }
        let zero_iv = vec![0u8; block_len];
        let mut buf = raw.to_vec();
        cbc_decrypt(session.algorithm(), session.enc_key(), &zero_iv, &mut buf)?;

        // Strip trailing zero padding, then the last two bytes are the CRC16.
        while buf.last() == Some(&0) {
            buf.pop();
        }
        if buf.len() < 2 {
            return Err(Error::CryptoVerify);
        }
        let crc_offset = buf.len() - 2;
        let expected = u16::from_le_bytes([buf[crc_offset], buf[crc_offset + 1]]);
        let payload = &buf[..crc_offset];
        if crc16(payload) != expected {
            return Err(Error::CryptoVerify);
        }
        Ok(Bytes::copy_from_slice(payload))
    } else if mac {
        if raw.len() < 2 {
            return Err(Error::CryptoVerify);
        }
        let crc_offset = raw.len() - 2;
        let expected = u16::from_le_bytes([raw[crc_offset], raw[crc_offset + 1]]);
        let payload = &raw[..crc_offset];
        if crc16(payload) != expected {
            return Err(Error::CryptoVerify);
        }
        Ok(Bytes::copy_from_slice(payload))
    } else {
        Ok(Bytes::copy_from_slice(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyAlgorithm;
    use crate::session::{CommandSet, SecureChannelVariant};

    fn des_session() -> SessionState {
        SessionState::established(
            SecureChannelVariant::D40,
            CommandSet::Native,
            KeyAlgorithm::Des,
            0,
            vec![0u8; 8],
            vec![0u8; 8],
            None,
        )
    }

    #[test]
    fn maced_roundtrip() {
        let session = des_session();
        let payload = [0x01u8, 0x02, 0x03, 0x04];
        let wire = encode(&session, &payload, true, false).unwrap();
        let decoded = decode(&session, &wire, true, false).unwrap();
        assert_eq!(decoded.as_ref(), &payload);
    }

    #[test]
    fn enciphered_roundtrip() {
        let session = des_session();
        let payload = [0xAAu8; 5];
        let wire = encode(&session, &payload, false, true).unwrap();
        let decoded = decode(&session, &wire, false, true).unwrap();
        assert_eq!(decoded.as_ref(), &payload);
    }

    #[test]
    fn maced_tamper_detected() {
        let session = des_session();
        let payload = [0x01u8, 0x02, 0x03];
        let mut wire = encode(&session, &payload, true, false).unwrap().to_vec();
        wire[0] ^= 0xFF;
        assert!(decode(&session, &wire, true, false).is_err());
    }
}
