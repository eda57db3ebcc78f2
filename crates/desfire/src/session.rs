//! Session state: the post-authentication secrets and the bookkeeping the
//! secure-channel codec advances on every exchange.

use zeroize::Zeroize;

use crate::crypto::{Key, KeyAlgorithm};

/// Which authentication/cryptogram protocol is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureChannelVariant {
    /// No session established.
    None,
    /// Legacy D40 (pre-EV1) protocol.
    D40,
    /// EV1 protocol.
    Ev1,
    /// EV2 protocol.
    Ev2,
}

/// The outer command-set framing in use for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSet {
    /// Bare `cmd || payload` native frames.
    Native,
    /// Native frames wrapped in a `CLA=0x90` ISO 7816 APDU.
    NativeIso,
    /// Full ISO 7816 APDUs.
    Iso,
}

/// Per-command communication mode requested by the caller.
pub use crate::constants::CommMode;

/// Holds the secrets and counters that exist only while a session is
/// authenticated. Constructing one is only possible through
/// [`SessionState::established`]; anything short of a full, verified
/// authentication leaves the session at `None` via [`SessionState::default`].
#[derive(Clone)]
pub struct SessionState {
    variant: SecureChannelVariant,
    command_set: CommandSet,
    algorithm: KeyAlgorithm,
    key_no: u8,
    enc_key: Vec<u8>,
    mac_key: Vec<u8>,
    iv: Vec<u8>,
    transaction_id: Option<[u8; 4]>,
    command_counter: u32,
    app_selected: bool,
}

impl core::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionState")
            .field("variant", &self.variant)
            .field("command_set", &self.command_set)
            .field("algorithm", &self.algorithm)
            .field("key_no", &self.key_no)
            .field("transaction_id", &self.transaction_id)
            .field("command_counter", &self.command_counter)
            .field("app_selected", &self.app_selected)
            .finish_non_exhaustive()
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        self.enc_key.zeroize();
        self.mac_key.zeroize();
        self.iv.zeroize();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            variant: SecureChannelVariant::None,
            command_set: CommandSet::Native,
            algorithm: KeyAlgorithm::Des,
            key_no: 0,
            enc_key: Vec::new(),
            mac_key: Vec::new(),
            iv: Vec::new(),
            transaction_id: None,
            command_counter: 0,
            app_selected: false,
        }
    }
}

impl SessionState {
    /// Build a freshly-authenticated session state. `iv` must already be
    /// sized to `algorithm.block_len()` (all-zero for a fresh session).
    #[allow(clippy::too_many_arguments)]
    pub fn established(
        variant: SecureChannelVariant,
        command_set: CommandSet,
        algorithm: KeyAlgorithm,
        key_no: u8,
        enc_key: Vec<u8>,
        mac_key: Vec<u8>,
        transaction_id: Option<[u8; 4]>,
    ) -> Self {
        Self {
            variant,
            command_set,
            algorithm,
            key_no,
            enc_key,
            mac_key,
            iv: vec![0u8; algorithm.block_len()],
            transaction_id,
            command_counter: 0,
            app_selected: true,
        }
    }

    /// Whether an authenticated secure channel currently exists.
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self.variant, SecureChannelVariant::None)
    }

    pub const fn variant(&self) -> SecureChannelVariant {
        self.variant
    }

    pub const fn command_set(&self) -> CommandSet {
        self.command_set
    }

    pub fn set_command_set(&mut self, command_set: CommandSet) {
        self.command_set = command_set;
    }

    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub const fn key_no(&self) -> u8 {
        self.key_no
    }

    pub fn enc_key(&self) -> &[u8] {
        &self.enc_key
    }

    pub fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn set_iv(&mut self, iv: Vec<u8>) {
        self.iv = iv;
    }

    pub const fn transaction_id(&self) -> Option<[u8; 4]> {
        self.transaction_id
    }

    pub fn set_transaction_id(&mut self, ti: [u8; 4]) {
        self.transaction_id = Some(ti);
    }

    pub const fn command_counter(&self) -> u32 {
        self.command_counter
    }

    /// Advance the EV2 command counter by one. Invoked only after a
    /// successful verification; on failure the session is torn down
    /// instead (the counter must never advance past a failed exchange).
    pub fn increment_counter(&mut self) {
        self.command_counter = self.command_counter.wrapping_add(1);
    }

    pub const fn app_selected(&self) -> bool {
        self.app_selected
    }

    pub fn set_app_selected(&mut self, selected: bool) {
        self.app_selected = selected;
    }

    /// Tear the session down to `Unauth`, zeroizing all secret material.
    /// Called after any card-status failure, verification failure,
    /// transport error, or application select.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
