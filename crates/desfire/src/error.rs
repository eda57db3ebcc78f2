//! Error types for the DESFire protocol core.

use desfire_core::transport::TransportError;

/// Result alias used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Fine-grained reason the authentication engine failed, preserved from the
/// source's integer diagnostic codes so callers can distinguish e.g. "RndA
/// mismatch" from "wrong response length" from "transport timeout".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureReason {
    /// Card did not answer the `Authenticate` sub-command with `ADDITIONAL_FRAME`.
    NoAdditionalFrame,
    /// `E(RndB)` arrived at the wrong length for the active algorithm's block size.
    BadChallengeLength,
    /// The card's final response was not `OPERATION_OK`.
    FinalStatusNotOk,
    /// `E(RndA')` arrived at the wrong length.
    BadResponseLength,
    /// Decrypted `RndA'` did not equal `rol(RndA)`.
    RndAMismatch,
    /// No authentication sub-command matches the requested algorithm/variant pair.
    NoMatchingMethod,
    /// `select_and_authenticate`'s select step failed.
    SelectFailed,
    /// Authentication succeeded but no secure channel resulted (should be unreachable).
    NoChannelAfterSuccess,
    /// ISO `GET_CHALLENGE` failed.
    IsoGetChallengeFailed,
    /// ISO `EXTERNAL_AUTHENTICATE` failed.
    IsoExternalAuthFailed,
    /// ISO `INTERNAL_AUTHENTICATE` failed.
    IsoInternalAuthFailed,
    /// ISO auth's echoed host random did not match.
    IsoHostRandomMismatch,
}

impl AuthFailureReason {
    /// The integer diagnostic code the original client used for this reason,
    /// preserved for readers cross-referencing vendor documentation.
    pub const fn code(self) -> u16 {
        match self {
            Self::NoAdditionalFrame => 1,
            Self::BadChallengeLength => 2,
            Self::FinalStatusNotOk => 3,
            Self::BadResponseLength => 4,
            Self::RndAMismatch => 5,
            Self::NoMatchingMethod => 100,
            Self::SelectFailed => 200,
            Self::NoChannelAfterSuccess => 201,
            Self::IsoGetChallengeFailed => 301,
            Self::IsoExternalAuthFailed => 305,
            Self::IsoInternalAuthFailed => 307,
            Self::IsoHostRandomMismatch => 308,
        }
    }
}

impl core::fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?} (code {})", self.code())
    }
}

/// Top-level error type surfaced by the DESFire protocol core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied argument was invalid for the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The underlying transport failed.
    #[error(transparent)]
    TransportFailure(TransportError),

    /// A lower-level APDU-plumbing error surfaced by `desfire-core`.
    #[error(transparent)]
    Core(#[from] desfire_core::Error),

    /// The transport reported a timeout.
    #[error("transport timeout")]
    Timeout,

    /// The transport reported a user-initiated abort.
    #[error("operation aborted by user")]
    UserAborted,

    /// The card returned a non-success status byte.
    #[error("card status error: {0:#04X} ({1})")]
    CardStatus(u8, &'static str),

    /// Frame-chaining bookkeeping was violated (unexpected continuation, etc).
    #[error("frame chaining mismatch")]
    ChainingMismatch,

    /// A CRC, MAC, or challenge-response verification failed.
    #[error("cryptographic verification failed")]
    CryptoVerify,

    /// The active command set doesn't support the requested operation.
    #[error("unsupported command set for this operation")]
    UnsupportedChannel,

    /// The operation requires an authenticated session and none exists.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A response arrived with an unexpected length.
    #[error("unexpected response length: got {0}, expected {1}")]
    UnexpectedResponseLength(usize, usize),

    /// A value could not be encoded onto the wire.
    #[error("encoding failure: {0}")]
    EncodingFailure(&'static str),

    /// The authentication engine failed at a specific, diagnosable step.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(AuthFailureReason),
}

impl From<TransportError> for Error {
    /// Timeouts and user-initiated aborts are dedicated error kinds (spec
    /// §5, §7); every other transport failure falls back to the generic
    /// wrapper.
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Cancelled => Self::UserAborted,
            other => Self::TransportFailure(other),
        }
    }
}

impl Error {
    /// Map a raw DESFire status byte to a [`Error::CardStatus`], naming the
    /// well-known codes from the status table.
    pub const fn from_status_byte(status: u8) -> Self {
        let name = match status {
            0x0C => "no changes",
            0x0E => "eeprom full",
            0x1C => "illegal command",
            0x1E => "integrity error",
            0x40 => "no such key",
            0x7E => "length error",
            0x9D => "permission denied",
            0x9E => "parameter error",
            0xA0 => "application not found",
            0xA1 => "application integrity error",
            0xAE => "authentication error",
            0xBE => "boundary error",
            0xC1 => "picc integrity error",
            0xCA => "command aborted",
            0xCD => "picc disabled",
            0xCE => "count error",
            0xDE => "duplicate error",
            0xEE => "eeprom rollback",
            0xF0 => "file not found",
            0xF1 => "file integrity error",
            _ => "unknown status",
        };
        Self::CardStatus(status, name)
    }
}
