//! File-settings codec (spec §4.6): the variable-layout descriptor
//! returned by `GetFileSettings` and accepted by `ChangeFileSettings`,
//! whose body shape depends on the file type and whose access-rights
//! trailer is optional.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{CommMode, FileType};
use crate::error::{Error, Result};

/// The four access-right fields packed into a file's `accessRights` u16:
/// each nibble names a key number (0-13), "free" (14), or "deny" (15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights {
    pub read: u8,
    pub write: u8,
    pub read_write: u8,
    pub change: u8,
}

/// Sentinel nibble value meaning "no authentication required".
pub const ACCESS_FREE: u8 = 0x0E;
/// Sentinel nibble value meaning "operation always denied".
pub const ACCESS_DENY: u8 = 0x0F;

impl AccessRights {
    /// Decode from the wire's little-endian `[byte0, byte1]` pair:
    /// `byte0 = change | (readWrite << 4)`, `byte1 = write | (read << 4)`.
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            change: bytes[0] & 0x0F,
            read_write: (bytes[0] >> 4) & 0x0F,
            write: bytes[1] & 0x0F,
            read: (bytes[1] >> 4) & 0x0F,
        }
    }

    /// Encode to the wire's little-endian `[byte0, byte1]` pair.
    pub const fn to_bytes(self) -> [u8; 2] {
        [
            (self.change & 0x0F) | ((self.read_write & 0x0F) << 4),
            (self.write & 0x0F) | ((self.read & 0x0F) << 4),
        ]
    }

    /// Decode from the raw little-endian u16 as stored in a
    /// [`FileSettings::raw_access_rights`].
    pub const fn from_u16(raw: u16) -> Self {
        Self::from_bytes(raw.to_le_bytes())
    }

    /// Encode to the raw little-endian u16.
    pub const fn to_u16(self) -> u16 {
        u16::from_le_bytes(self.to_bytes())
    }
}

/// Type-dependent body of a file-settings record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBody {
    /// Standard or Backup data file.
    Data { size: u32 },
    /// Value file.
    Value {
        lower: u32,
        upper: u32,
        current: u32,
        limited_credit_enabled: u8,
    },
    /// Linear or Cyclic record file.
    Record {
        record_size: u32,
        max_records: u32,
        current_records: u32,
    },
    /// Transaction-MAC file.
    TransactionMac { key_type: u8, key_version: u8 },
}

/// A fully decoded `GetFileSettings` record (spec §3 "File descriptor",
/// §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSettings {
    pub file_type: FileType,
    pub comm_mode: CommMode,
    pub access_rights: AccessRights,
    pub additional_access_rights: Vec<u16>,
    pub body: FileBody,
}

impl FileSettings {
    /// Decode a `GetFileSettings` response body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::UnexpectedResponseLength(data.len(), 4));
        }
        let file_type = FileType::from_byte(data[0])
            .ok_or(Error::EncodingFailure("unknown file type byte"))?;
        let option = data[1];
        let comm_mode = CommMode::from_bits(option);
        let additional_enabled = option & 0x80 != 0;
        let access_rights = AccessRights::from_bytes([data[2], data[3]]);

        let (body, reclen) = match file_type {
            FileType::Standard | FileType::Backup => {
                let size = crate::util::read_le24(&data[4..])?;
                (FileBody::Data { size }, 4 + 3)
            }
            FileType::Value => {
                if data.len() < 4 + 13 {
                    return Err(Error::UnexpectedResponseLength(data.len(), 4 + 13));
                }
                let lower = crate::util::read_le32(&data[4..8])?;
                let upper = crate::util::read_le32(&data[8..12])?;
                let current = crate::util::read_le32(&data[12..16])?;
                let limited_credit_enabled = data[16];
                (
                    FileBody::Value {
                        lower,
                        upper,
                        current,
                        limited_credit_enabled,
                    },
                    4 + 13,
                )
            }
            FileType::LinearRecord | FileType::CyclicRecord => {
                if data.len() < 4 + 9 {
                    return Err(Error::UnexpectedResponseLength(data.len(), 4 + 9));
                }
                let record_size = crate::util::read_le24(&data[4..7])?;
                let max_records = crate::util::read_le24(&data[7..10])?;
                let current_records = crate::util::read_le24(&data[10..13])?;
                (
                    FileBody::Record {
                        record_size,
                        max_records,
                        current_records,
                    },
                    4 + 9,
                )
            }
            FileType::TransactionMac => {
                if data.len() < 6 {
                    return Err(Error::UnexpectedResponseLength(data.len(), 6));
                }
                (
                    FileBody::TransactionMac {
                        key_type: data[4],
                        key_version: data[5],
                    },
                    0,
                )
            }
        };

        let mut additional_access_rights = Vec::new();
        if additional_enabled && reclen > 0 && data.len() > reclen {
            let count = data[reclen] as usize;
            if data.len() != reclen + 1 + count * 2 {
                return Err(Error::UnexpectedResponseLength(data.len(), reclen + 1 + count * 2));
            }
            for i in 0..count {
                let off = reclen + 1 + i * 2;
                additional_access_rights.push(crate::util::read_le16(&data[off..off + 2])?);
            }
        }

        Ok(Self {
            file_type,
            comm_mode,
            access_rights,
            additional_access_rights,
            body,
        })
    }

    /// Encode back into a `GetFileSettings`-shaped byte string. Round-trips
    /// with [`Self::decode`] (spec §8 round-trip law), modulo the
    /// additional-access-rights length byte which is only emitted when the
    /// list is non-empty.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        out.put_u8(self.file_type as u8);
        let mut option = self.comm_mode.to_bits();
        if !self.additional_access_rights.is_empty() {
            option |= 0x80;
        }
        out.put_u8(option);
        out.put_slice(&self.access_rights.to_bytes());

        match &self.body {
            FileBody::Data { size } => {
                out.put_slice(&crate::util::write_le24(*size));
            }
            FileBody::Value {
                lower,
                upper,
                current,
                limited_credit_enabled,
            } => {
                out.put_slice(&crate::util::write_le32(*lower));
                out.put_slice(&crate::util::write_le32(*upper));
                out.put_slice(&crate::util::write_le32(*current));
                out.put_u8(*limited_credit_enabled);
            }
            FileBody::Record {
                record_size,
                max_records,
                current_records,
            } => {
                out.put_slice(&crate::util::write_le24(*record_size));
                out.put_slice(&crate::util::write_le24(*max_records));
                out.put_slice(&crate::util::write_le24(*current_records));
            }
            FileBody::TransactionMac { key_type, key_version } => {
                out.put_u8(*key_type);
                out.put_u8(*key_version);
            }
        }

        if !self.additional_access_rights.is_empty() {
            out.put_u8(self.additional_access_rights.len() as u8);
            for right in &self.additional_access_rights {
                out.put_u16_le(*right);
            }
        }

        out.freeze()
    }

    /// The body to send to `ChangeFileSettings`: `option || accessRights`,
    /// without the file type byte (which is implicit in the already-created
    /// file) or the body (which `ChangeFileSettings` cannot alter).
    pub fn change_settings_body(&self) -> Bytes {
        let mut out = BytesMut::new();
        let mut option = self.comm_mode.to_bits();
        if !self.additional_access_rights.is_empty() {
            option |= 0x80;
        }
        out.put_u8(option);
        out.put_slice(&self.access_rights.to_bytes());
        if !self.additional_access_rights.is_empty() {
            out.put_u8(self.additional_access_rights.len() as u8);
            for right in &self.additional_access_rights {
                out.put_u16_le(*right);
            }
        }
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_value_file_scenario() {
        // spec §8 scenario 6
        let data = hex_literal::hex!(
            "02 03 EE EE 10 00 00 00 00 00 00 00 10 00 00 00 00"
        );
        let settings = FileSettings::decode(&data).unwrap();
        assert_eq!(settings.file_type, FileType::Value);
        assert_eq!(settings.comm_mode, CommMode::Enciphered);
        assert_eq!(settings.access_rights.to_u16(), 0xEEEE);
        assert_eq!(
            settings.body,
            FileBody::Value {
                lower: 16,
                upper: 0,
                current: 16,
                limited_credit_enabled: 0,
            }
        );
    }

    #[test]
    fn roundtrip_data_file() {
        let settings = FileSettings {
            file_type: FileType::Standard,
            comm_mode: CommMode::Plain,
            access_rights: AccessRights {
                read: 0,
                write: 0,
                read_write: 0,
                change: 1,
            },
            additional_access_rights: Vec::new(),
            body: FileBody::Data { size: 256 },
        };
        let encoded = settings.encode();
        let decoded = FileSettings::decode(&encoded).unwrap();
        assert_eq!(decoded, settings);
    }

    #[test]
    fn roundtrip_record_file_with_additional_rights() {
        let settings = FileSettings {
            file_type: FileType::LinearRecord,
            comm_mode: CommMode::Maced,
            access_rights: AccessRights {
                read: ACCESS_FREE,
                write: 0,
                read_write: ACCESS_DENY,
                change: 1,
            },
            additional_access_rights: vec![0x1234, 0x5678],
            body: FileBody::Record {
                record_size: 16,
                max_records: 10,
                current_records: 3,
            },
        };
        let encoded = settings.encode();
        let decoded = FileSettings::decode(&encoded).unwrap();
        assert_eq!(decoded, settings);
    }

    #[test]
    fn roundtrip_transaction_mac_file() {
        let settings = FileSettings {
            file_type: FileType::TransactionMac,
            comm_mode: CommMode::Plain,
            access_rights: AccessRights {
                read: ACCESS_DENY,
                write: ACCESS_DENY,
                read_write: ACCESS_DENY,
                change: 0,
            },
            additional_access_rights: Vec::new(),
            body: FileBody::TransactionMac {
                key_type: 0x02,
                key_version: 1,
            },
        };
        let encoded = settings.encode();
        let decoded = FileSettings::decode(&encoded).unwrap();
        assert_eq!(decoded, settings);
    }

    #[test]
    fn access_rights_bit_layout() {
        let rights = AccessRights {
            read: 0x1,
            write: 0x2,
            read_write: 0x3,
            change: 0x4,
        };
        let bytes = rights.to_bytes();
        assert_eq!(bytes, [0x34, 0x21]);
        assert_eq!(AccessRights::from_bytes(bytes), rights);
    }
}
