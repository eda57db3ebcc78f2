//! Wire-level constants: status bytes, sub-commands, and sizing limits.

/// Command byte used as both the `ADDITIONAL_FRAME` continuation command
/// and the matching "more data to come" status byte.
pub const ADDITIONAL_FRAME: u8 = 0xAF;

/// Successful completion, no further frames.
pub const OPERATION_OK: u8 = 0x00;

/// Returned by `ChangeKeySettings`/value-debit style commands when the
/// card signed the response instead of just acknowledging it.
pub const SIGNATURE: u8 = 0x90;

/// A value/limited-credit operation completed without changing the stored value.
pub const NO_CHANGES: u8 = 0x0C;

/// PICC-level master application AID.
pub const PICC_AID: u32 = 0x00_0000;

/// Default max payload length per outgoing native frame before TX chaining
/// splits it. Conservative, card-independent value; callers talking to a
/// card with a larger `FRAME_MAX_LEN` negotiated out of band may override it.
pub const DESFIRE_TX_FRAME_MAX_LEN: usize = 56;

/// Authentication sub-command bytes, keyed by variant/algorithm.
pub mod auth_cmd {
    /// Legacy D40 authentication.
    pub const LEGACY: u8 = 0x0A;
    /// EV1 authentication, DES/2TDEA/3TDEA.
    pub const EV1_ISO: u8 = 0x1A;
    /// EV1 authentication, AES.
    pub const EV1_AES: u8 = 0xAA;
    /// EV2 first authentication on a fresh session.
    pub const EV2_FIRST: u8 = 0x71;
    /// EV2 subsequent authentication, reusing the session's TI.
    pub const EV2_NON_FIRST: u8 = 0x77;
}

/// Native command bytes used by the command surface.
pub mod cmd {
    pub const GET_VERSION: u8 = 0x60;
    pub const FORMAT_PICC: u8 = 0xFC;
    pub const SELECT_APPLICATION: u8 = 0x5A;
    pub const GET_APPLICATION_IDS: u8 = 0x6A;
    pub const GET_DF_NAMES: u8 = 0x6D;
    pub const CREATE_APPLICATION: u8 = 0xCA;
    pub const DELETE_APPLICATION: u8 = 0xDA;
    pub const GET_FILE_IDS: u8 = 0x6F;
    pub const GET_FILE_ISO_IDS: u8 = 0x61;
    pub const GET_FILE_SETTINGS: u8 = 0xF5;
    pub const CHANGE_FILE_SETTINGS: u8 = 0x5F;
    pub const CREATE_STD_DATA_FILE: u8 = 0xCD;
    pub const CREATE_BACKUP_DATA_FILE: u8 = 0xCB;
    pub const CREATE_VALUE_FILE: u8 = 0xCC;
    pub const CREATE_LINEAR_RECORD_FILE: u8 = 0xC1;
    pub const CREATE_CYCLIC_RECORD_FILE: u8 = 0xC0;
    pub const CREATE_TRANS_MAC_FILE: u8 = 0xCE;
    pub const DELETE_FILE: u8 = 0xDF;
    pub const READ_DATA: u8 = 0xBD;
    pub const WRITE_DATA: u8 = 0x3D;
    pub const GET_VALUE: u8 = 0x6C;
    pub const CREDIT: u8 = 0x0C;
    pub const DEBIT: u8 = 0xDC;
    pub const LIMITED_CREDIT: u8 = 0x1C;
    pub const WRITE_RECORD: u8 = 0x3B;
    pub const UPDATE_RECORD: u8 = 0xDB;
    pub const READ_RECORDS: u8 = 0xBB;
    pub const CLEAR_RECORD_FILE: u8 = 0xEB;
    pub const COMMIT_TRANSACTION: u8 = 0xC7;
    pub const ABORT_TRANSACTION: u8 = 0xA7;
    pub const CHANGE_KEY_SETTINGS: u8 = 0x54;
    pub const GET_KEY_SETTINGS: u8 = 0x45;
    pub const CHANGE_KEY: u8 = 0xC4;
    pub const GET_KEY_VERSION: u8 = 0x64;
    pub const FREE_MEM: u8 = 0x6E;
    pub const SET_CONFIGURATION: u8 = 0x5C;

    // ISO 7816 command-set primitives (used by the ISO auth variant and by
    // the `ISO` command set's application selection).
    pub const ISO_SELECT_FILE: u8 = 0xA4;
    pub const ISO_GET_CHALLENGE: u8 = 0x84;
    pub const ISO_EXTERNAL_AUTHENTICATE: u8 = 0x82;
    pub const ISO_INTERNAL_AUTHENTICATE: u8 = 0x88;
}

/// File types, as the low nibble of a `GetFileSettings`/`CreateXxxFile` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Standard = 0x00,
    Backup = 0x01,
    Value = 0x02,
    LinearRecord = 0x03,
    CyclicRecord = 0x04,
    TransactionMac = 0x05,
}

impl FileType {
    /// Decode from the wire byte.
    pub const fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => Self::Standard,
            0x01 => Self::Backup,
            0x02 => Self::Value,
            0x03 => Self::LinearRecord,
            0x04 => Self::CyclicRecord,
            0x05 => Self::TransactionMac,
            _ => return None,
        })
    }
}

/// Per-command communication mode, as set in `4.3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommMode {
    Plain,
    Maced,
    Enciphered,
}

impl CommMode {
    /// Decode from the low 2 bits of a file-settings `option` byte.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0x01 => Self::Maced,
            0x03 => Self::Enciphered,
            _ => Self::Plain,
        }
    }

    /// Encode to the low 2 bits of a file-settings `option` byte.
    pub const fn to_bits(self) -> u8 {
        match self {
            Self::Plain => 0x00,
            Self::Maced => 0x01,
            Self::Enciphered => 0x03,
        }
    }
}
