//! Secure-channel codec: dispatches `encode`/`decode` to the active
//! variant's implementation and advances session IV/counter state.

pub mod ev1;
pub mod ev2;
pub mod keychange;
pub mod legacy;

use bytes::Bytes;

use crate::constants::CommMode;
use crate::error::{Error, Result};
use crate::session::{SecureChannelVariant, SessionState};

/// Encode an outgoing `(cmd, payload)` pair into wire bytes per the
/// session's active `(variant, commMode)`.
pub fn encode(session: &mut SessionState, cmd: u8, payload: &[u8], comm_mode: CommMode) -> Result<Bytes> {
    match session.variant() {
        SecureChannelVariant::None => Err(Error::NotAuthenticated),
        SecureChannelVariant::D40 => {
            let (mac, enc) = match comm_mode {
                CommMode::Plain => (false, false),
                CommMode::Maced => (true, false),
                CommMode::Enciphered => (false, true),
            };
            legacy::encode(session, payload, mac, enc)
        }
        SecureChannelVariant::Ev1 => {
            let (mac, enc) = match comm_mode {
                CommMode::Plain => (false, false),
                CommMode::Maced => (true, false),
                CommMode::Enciphered => (false, true),
            };
            let (wire, new_iv) = ev1::encode(session, cmd, payload, mac, enc)?;
            if let Some(iv) = new_iv {
                session.set_iv(iv);
            }
            Ok(wire)
        }
        SecureChannelVariant::Ev2 => {
            let enciphered = matches!(comm_mode, CommMode::Enciphered);
            ev2::encode(session, cmd, payload, enciphered)
        }
    }
}

/// Decode an incoming response into verified plaintext per the session's
/// active `(variant, commMode)`. On success, EV2 sessions advance their
/// command counter; on any verification failure the caller is expected to
/// clear the session (auth engine and command layer both do this).
pub fn decode(
    session: &mut SessionState,
    raw: &[u8],
    status: u8,
    comm_mode: CommMode,
) -> Result<Bytes> {
    let result = match session.variant() {
        SecureChannelVariant::None => Err(Error::NotAuthenticated),
        SecureChannelVariant::D40 => {
            let (mac, enc) = match comm_mode {
                CommMode::Plain => (false, false),
                CommMode::Maced => (true, false),
                CommMode::Enciphered => (false, true),
            };
            legacy::decode(session, raw, mac, enc)
        }
        SecureChannelVariant::Ev1 => {
            let (mac, enc) = match comm_mode {
                CommMode::Plain => (false, false),
                CommMode::Maced => (true, false),
                CommMode::Enciphered => (false, true),
            };
            ev1::decode(session, raw, status, mac, enc).map(|(bytes, new_iv)| {
                if let Some(iv) = new_iv {
                    session.set_iv(iv);
                }
                bytes
            })
        }
        SecureChannelVariant::Ev2 => {
            let enciphered = matches!(comm_mode, CommMode::Enciphered);
            ev2::decode(session, raw, status, enciphered)
        }
    };

    if result.is_ok() && matches!(session.variant(), SecureChannelVariant::Ev2) {
        session.increment_counter();
    }

    result
}
