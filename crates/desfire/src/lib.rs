//! MIFARE DESFire secure messaging, authentication, and command core.
//!
//! [`Desfire`] ties together the three layers described in the module
//! docs of their own files: [`transport::FrameTransport`] (frame
//! chaining), [`channel`] (the secure-channel codec), and
//! [`session::SessionState`] (the secrets and counters that exist only
//! while authenticated). The `command` module groups the typed
//! command-surface wrappers built on top of [`Desfire::exchange`].

pub mod auth;
pub mod channel;
pub mod command;
pub mod constants;
pub mod crypto;
pub mod descriptor;
pub mod error;
pub mod file_settings;
pub mod session;
pub mod transport;
pub mod util;

use bytes::Bytes;
use desfire_core::CardTransport;
use tracing::debug;

pub use crate::auth::NonceSource;
pub use crate::command::{ComponentVersion, VersionInfo};
pub use crate::constants::CommMode;
pub use crate::crypto::{Key, KeyAlgorithm};
pub use crate::error::{AuthFailureReason, Error, Result};
pub use crate::session::{CommandSet, SecureChannelVariant, SessionState};
pub use crate::transport::FrameTransport;

use crate::auth::RandRng;
use crate::constants::{ADDITIONAL_FRAME, NO_CHANGES, OPERATION_OK, SIGNATURE};

/// Which authentication variant/algorithm pair to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Legacy D40 authentication (sub-command `0x0A`).
    Legacy,
    /// EV1 authentication (sub-command `0x1A`/`0xAA`).
    Ev1,
    /// EV2 first authentication on a fresh session (sub-command `0x71`).
    Ev2First,
    /// EV2 non-first authentication, reusing the session's transaction id
    /// (sub-command `0x77`).
    Ev2NonFirst,
    /// ISO `GET_CHALLENGE`/`EXTERNAL_AUTHENTICATE`/`INTERNAL_AUTHENTICATE`.
    Iso,
}

/// The top-level DESFire driver: a frame transport plus the session state
/// that the secure-channel codec and command surface share.
#[derive(Debug)]
pub struct Desfire<T: CardTransport> {
    frame: FrameTransport<T>,
    session: SessionState,
}

impl<T: CardTransport> Desfire<T> {
    /// Build a driver over a caller-supplied transport, with no session
    /// established and the `Native` command set active.
    pub fn new(transport: T) -> Self {
        Self {
            frame: FrameTransport::new(transport),
            session: SessionState::default(),
        }
    }

    /// Override the maximum TX frame payload length (card-dependent).
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.frame = self.frame.with_max_frame_len(max_frame_len);
        self
    }

    /// Select the outer command-set framing for subsequent exchanges.
    /// Does not by itself talk to the card; see [`Self::select_application`]
    /// for the `SELECT_APPLICATION`/`ISO SELECT FILE` variants that also
    /// switch framing atomically with the select.
    pub fn set_command_set(&mut self, command_set: CommandSet) {
        self.session.set_command_set(command_set);
    }

    pub const fn command_set(&self) -> CommandSet {
        self.session.command_set()
    }

    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn frame_transport(&self) -> &FrameTransport<T> {
        &self.frame
    }

    pub fn frame_transport_mut(&mut self) -> &mut FrameTransport<T> {
        &mut self.frame
    }

    pub fn into_transport(self) -> T {
        self.frame.into_transport()
    }

    /// Run one of the authentication variants against `key_no` with `key`,
    /// replacing the current session on success and leaving it untouched
    /// (still whatever it was) on failure — the auth engine itself never
    /// returns a half-established session, so there is nothing to tear
    /// down here beyond what the callee already did internally.
    pub fn authenticate(&mut self, method: AuthMethod, key: &Key, key_no: u8) -> Result<()> {
        self.authenticate_with_rng(method, key, key_no, &mut RandRng)
    }

    /// As [`Self::authenticate`], but with an explicit nonce source (tests
    /// substitute a fixed sequence to replay known-answer vectors).
    pub fn authenticate_with_rng(
        &mut self,
        method: AuthMethod,
        key: &Key,
        key_no: u8,
        rng: &mut dyn NonceSource,
    ) -> Result<()> {
        let command_set = self.session.command_set();
        let existing_ti = self.session.transaction_id();
        let session = match method {
            AuthMethod::Legacy => auth::legacy(&mut self.frame, command_set, key, key_no, rng)?,
            AuthMethod::Ev1 => auth::ev1(&mut self.frame, command_set, key, key_no, rng)?,
            AuthMethod::Ev2First => {
                auth::ev2(&mut self.frame, command_set, key, key_no, true, None, rng)?
            }
            AuthMethod::Ev2NonFirst => {
                auth::ev2(&mut self.frame, command_set, key, key_no, false, existing_ti, rng)?
            }
            AuthMethod::Iso => auth::iso(&mut self.frame, command_set, key, key_no, rng)?,
        };
        debug!(?method, key_no, variant = ?session.variant(), "authenticated");
        self.session = session;
        Ok(())
    }

    /// Select an application by AID, optionally combined with a second AID
    /// forming the two-AID ISO-DF select form. Always clears the session
    /// first (the card itself requires re-authentication after any select),
    /// and on success updates `appSelected` per spec §3's invariant: AID
    /// `0x000000` clears it, any other AID sets it. The active command set
    /// is preserved across the clear.
    pub fn select_application(&mut self, aid: u32, second_aid: Option<u32>) -> Result<()> {
        debug!(aid, second_aid, "selecting application, clearing session");
        let command_set = self.session.command_set();
        self.session.clear();
        self.session.set_command_set(command_set);

        let mut data = Vec::with_capacity(6);
        data.extend_from_slice(&crate::util::aid_to_bytes(aid));
        if let Some(aid2) = second_aid {
            data.extend_from_slice(&crate::util::aid_to_bytes(aid2));
        }

        let raw = self.frame.exchange(command_set, constants::cmd::SELECT_APPLICATION, &data, true)?;
        if raw.status != OPERATION_OK {
            return Err(Error::from_status_byte(raw.status));
        }
        if !raw.data.is_empty() {
            return Err(Error::UnexpectedResponseLength(raw.data.len(), 0));
        }

        self.session.set_app_selected(aid != constants::PICC_AID);
        Ok(())
    }

    /// Combinator: select `aid`, then authenticate with `(method, key,
    /// key_no)`. If the select fails, the session is left cleared (as
    /// `select_application` already does) and the auth step never runs.
    pub fn select_and_authenticate(
        &mut self,
        aid: u32,
        method: AuthMethod,
        key: &Key,
        key_no: u8,
    ) -> Result<()> {
        self.select_application(aid, None)
            .map_err(|_| Error::AuthenticationFailed(AuthFailureReason::SelectFailed))?;
        self.authenticate(method, key, key_no)
    }

    /// Run one logical command exchange: encode `payload` under the
    /// session's active secure channel (or pass it through unchanged if no
    /// session exists and `comm_mode` is `Plain`), transmit it with RX
    /// chaining, check the card's status, and decode the reply.
    ///
    /// Any cryptographic verification failure clears the session
    /// immediately (spec §7's propagation policy); a non-success card
    /// status is surfaced as `Error::CardStatus` without touching the
    /// session.
    pub fn exchange(&mut self, cmd: u8, payload: &[u8], comm_mode: CommMode) -> Result<Bytes> {
        let command_set = self.session.command_set();

        if !self.session.is_authenticated() {
            if !matches!(comm_mode, CommMode::Plain) {
                return Err(Error::NotAuthenticated);
            }
            let raw = self.frame.exchange(command_set, cmd, payload, true)?;
            check_status(raw.status)?;
            return Ok(raw.data);
        }

        let wire = channel::encode(&mut self.session, cmd, payload, comm_mode)?;
        let raw = self.frame.exchange(command_set, cmd, &wire, true)?;
        if let Err(err) = check_status(raw.status) {
            return Err(err);
        }

        match channel::decode(&mut self.session, &raw.data, raw.status, comm_mode) {
            Ok(plain) => Ok(plain),
            Err(err) => {
                self.session.clear();
                Err(err)
            }
        }
    }

    /// As [`Self::exchange`], but preserves per-frame record boundaries
    /// (spec §4.2's split-by-size mode) instead of concatenating the
    /// reassembled response. Used by `GET_DF_NAMES`.
    fn exchange_split_by_size(
        &mut self,
        cmd: u8,
        payload: &[u8],
        comm_mode: CommMode,
        record_size: usize,
    ) -> Result<Vec<Bytes>> {
        let command_set = self.session.command_set();
        if self.session.is_authenticated() {
            // Split-by-size responses are only used by commands issued
            // before authentication in practice (`GET_DF_NAMES`), but stay
            // general: encode/decode per-record if a channel is active.
            let wire = channel::encode(&mut self.session, cmd, payload, comm_mode)?;
            let records = self.frame.exchange_split_by_size(command_set, cmd, &wire, record_size)?;
            let mut out = Vec::with_capacity(records.len());
            for record in records {
                out.push(channel::decode(&mut self.session, &record, OPERATION_OK, comm_mode)?);
            }
            Ok(out)
        } else {
            if !matches!(comm_mode, CommMode::Plain) {
                return Err(Error::NotAuthenticated);
            }
            self.frame.exchange_split_by_size(command_set, cmd, payload, record_size)
        }
    }

    /// Explicitly clear the session (spec §3's "explicit clear" invariant
    /// trigger).
    pub fn clear_session(&mut self) {
        debug!("clearing session explicitly");
        self.session.clear();
    }
}

/// Translate a final card status byte into `Ok` for the four
/// success-family codes (spec §7's "graceful non-errors"), or the matching
/// `Error::CardStatus` otherwise.
fn check_status(status: u8) -> Result<u8> {
    match status {
        OPERATION_OK | ADDITIONAL_FRAME | SIGNATURE | NO_CHANGES => Ok(status),
        other => Err(Error::from_status_byte(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use desfire_core::transport::MockTransport;

    #[test]
    fn select_application_clears_and_sets_app_selected() {
        let mock = MockTransport::with_response(Bytes::from_static(&[0x00]));
        let mut df = Desfire::new(mock);
        df.select_application(0x00_01_02, None).unwrap();
        assert!(df.session().app_selected());
        assert!(!df.session().is_authenticated());
    }

    #[test]
    fn select_picc_clears_app_selected() {
        let mock = MockTransport::with_response(Bytes::from_static(&[0x00]));
        let mut df = Desfire::new(mock);
        df.select_application(0x00_00_00, None).unwrap();
        assert!(!df.session().app_selected());
    }

    #[test]
    fn exchange_before_auth_requires_plain() {
        let mock = MockTransport::with_response(Bytes::from_static(&[0x00]));
        let mut df = Desfire::new(mock);
        let err = df.exchange(0x60, &[], CommMode::Maced).unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }

    #[test]
    fn exchange_before_auth_passes_plain_through() {
        let mock = MockTransport::with_response(Bytes::from_static(&[0x00, 0x01, 0x02]));
        let mut df = Desfire::new(mock);
        let data = df.exchange(0x60, &[], CommMode::Plain).unwrap();
        assert_eq!(data.as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn exchange_surfaces_card_status_error() {
        let mock = MockTransport::with_response(Bytes::from_static(&[0x9D]));
        let mut df = Desfire::new(mock);
        let err = df.exchange(0x60, &[], CommMode::Plain).unwrap_err();
        assert!(matches!(err, Error::CardStatus(0x9D, _)));
    }
}
