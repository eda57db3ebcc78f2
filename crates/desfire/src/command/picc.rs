//! PICC-level housekeeping commands: version/memory queries, key settings
//! and key change, formatting, and EV1+ configuration.

use desfire_core::CardTransport;
use tracing::debug;

use crate::constants::cmd;
use crate::crypto::Key;
use crate::descriptor::KeySettings;
use crate::error::{Error, Result};
use crate::session::CommMode;
use crate::Desfire;

/// Hardware or software half of a `GetVersion` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentVersion {
    pub vendor_id: u8,
    pub hw_type: u8,
    pub hw_subtype: u8,
    pub major_version: u8,
    pub minor_version: u8,
    pub storage_size: u8,
    pub protocol: u8,
}

impl ComponentVersion {
    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(Error::UnexpectedResponseLength(data.len(), 7));
        }
        Ok(Self {
            vendor_id: data[0],
            hw_type: data[1],
            hw_subtype: data[2],
            major_version: data[3],
            minor_version: data[4],
            storage_size: data[5],
            protocol: data[6],
        })
    }
}

/// Full `GetVersion` response: hardware info, software info, and the
/// card's UID/batch/production-date tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub hardware: ComponentVersion,
    pub software: ComponentVersion,
    pub uid: [u8; 7],
    pub batch_no: [u8; 5],
    pub production_week: u8,
    pub production_year: u8,
}

impl<T: CardTransport> Desfire<T> {
    /// `GET_VERSION` (0x60): the three-frame hardware/software/UID record.
    pub fn get_version(&mut self) -> Result<VersionInfo> {
        let data = self.exchange(cmd::GET_VERSION, &[], CommMode::Plain)?;
        if data.len() < 28 {
            return Err(Error::UnexpectedResponseLength(data.len(), 28));
        }
        let hardware = ComponentVersion::decode(&data[0..7])?;
        let software = ComponentVersion::decode(&data[7..14])?;
        let mut uid = [0u8; 7];
        uid.copy_from_slice(&data[14..21]);
        let mut batch_no = [0u8; 5];
        batch_no.copy_from_slice(&data[21..26]);
        Ok(VersionInfo {
            hardware,
            software,
            uid,
            batch_no,
            production_week: data[26],
            production_year: data[27],
        })
    }

    /// `FREE_MEM` (0x6E): remaining EEPROM, 24-bit little-endian.
    pub fn free_memory(&mut self) -> Result<u32> {
        let data = self.exchange(cmd::FREE_MEM, &[], CommMode::Plain)?;
        crate::util::read_le24(&data)
    }

    /// `FORMAT_PICC` (0xFC): erase all applications and files. Requires
    /// PICC master-key authentication.
    pub fn format_picc(&mut self) -> Result<()> {
        self.exchange(cmd::FORMAT_PICC, &[], CommMode::Enciphered)?;
        Ok(())
    }

    /// `SET_CONFIGURATION` (0x5C): `option` selects which configuration
    /// byte/block is being written (PICC configuration, default key, or
    /// ATS), `data` is the option-specific payload.
    pub fn set_configuration(&mut self, option: u8, data: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(1 + data.len());
        payload.push(option);
        payload.extend_from_slice(data);
        self.exchange(cmd::SET_CONFIGURATION, &payload, CommMode::Enciphered)?;
        Ok(())
    }

    /// `GET_KEY_SETTINGS` (0x45): the currently selected application's (or
    /// PICC's) key-settings byte and raw num-keys byte.
    pub fn key_settings(&mut self) -> Result<KeySettings> {
        let data = self.exchange(cmd::GET_KEY_SETTINGS, &[], CommMode::Plain)?;
        KeySettings::decode(&data).ok_or(Error::UnexpectedResponseLength(data.len(), 2))
    }

    /// `CHANGE_KEY_SETTINGS` (0x54): replace the application's (or PICC's)
    /// key-settings byte. Always sent enciphered.
    pub fn change_key_settings(&mut self, key_settings: u8) -> Result<()> {
        self.exchange(cmd::CHANGE_KEY_SETTINGS, &[key_settings], CommMode::Enciphered)?;
        Ok(())
    }

    /// `GET_KEY_VERSION` (0x64): the version byte stored for `key_no`.
    pub fn key_version(&mut self, key_no: u8) -> Result<u8> {
        let data = self.exchange(cmd::GET_KEY_VERSION, &[key_no], CommMode::Plain)?;
        data.first().copied().ok_or(Error::UnexpectedResponseLength(0, 1))
    }

    /// `CHANGE_KEY` (0xC4): install `new_key` as `key_no`. `old_key` is
    /// required whenever `key_no` differs from the currently authenticated
    /// key (the cryptogram then carries the new key XORed with the old
    /// one, per spec §4.3); pass `None` when changing the authenticated
    /// key itself. `new_algorithm` only matters for a PICC master-key
    /// change, where it is folded into the key-number byte's high bits.
    pub fn change_key(
        &mut self,
        key_no: u8,
        new_key: &Key,
        old_key: Option<&Key>,
        new_algorithm_bits: u8,
    ) -> Result<()> {
        if !self.session().is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        debug!(key_no, changing_current = old_key.is_none(), "changing key");
        let key_no_byte = key_no | (new_algorithm_bits << 6);
        let cryptogram = crate::channel::keychange::build(self.session(), key_no_byte, new_key, old_key)?;

        let mut payload = Vec::with_capacity(1 + cryptogram.len());
        payload.push(key_no_byte);
        payload.extend_from_slice(&cryptogram);

        // The cryptogram is already fully formed ciphertext; send it plain
        // so the secure-channel codec doesn't double-encrypt it.
        self.exchange(cmd::CHANGE_KEY, &payload, CommMode::Plain)?;

        if old_key.is_none() {
            // Changed the currently-authenticated key: spec §8 requires the
            // session to transition back to Unauth.
            self.clear_session();
        }
        Ok(())
    }
}
