//! File lifecycle commands: listing, settings, creation (one wrapper per
//! file-type family), and deletion.

use bytes::BufMut;
use desfire_core::CardTransport;

use crate::constants::cmd;
use crate::file_settings::{AccessRights, FileSettings};
use crate::session::CommMode;
use crate::util::{read_le16, write_le24};
use crate::Desfire;
use crate::Result;

fn settings_header(file_no: u8, comm_mode: CommMode, access_rights: AccessRights) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    out.push(file_no);
    out.push(comm_mode.to_bits());
    out.extend_from_slice(&access_rights.to_bytes());
    out
}

impl<T: CardTransport> Desfire<T> {
    /// `GET_FILE_IDS` (0x6F): the currently selected application's file
    /// numbers.
    pub fn file_ids(&mut self) -> Result<Vec<u8>> {
        let data = self.exchange(cmd::GET_FILE_IDS, &[], CommMode::Plain)?;
        Ok(data.to_vec())
    }

    /// `GET_FILE_ISO_IDS` (0x61): one 16-bit big-endian ISO file ID per
    /// configured file.
    pub fn iso_file_ids(&mut self) -> Result<Vec<u16>> {
        let data = self.exchange(cmd::GET_FILE_ISO_IDS, &[], CommMode::Plain)?;
        data.chunks_exact(2).map(|c| read_le16(&[c[1], c[0]])).collect()
    }

    /// `GET_FILE_SETTINGS` (0xF5).
    pub fn get_file_settings(&mut self, file_no: u8) -> Result<FileSettings> {
        let data = self.exchange(cmd::GET_FILE_SETTINGS, &[file_no], CommMode::Plain)?;
        FileSettings::decode(&data)
    }

    /// `CHANGE_FILE_SETTINGS` (0x5F): overwrite comm mode, access rights,
    /// and the additional-access-rights list. The file's type and body
    /// (size, value limits, record geometry) cannot be changed this way.
    pub fn change_file_settings(&mut self, file_no: u8, settings: &FileSettings) -> Result<()> {
        let mut payload = Vec::with_capacity(1);
        payload.push(file_no);
        payload.extend_from_slice(&settings.change_settings_body());
        self.exchange(cmd::CHANGE_FILE_SETTINGS, &payload, CommMode::Enciphered)?;
        Ok(())
    }

    /// `CREATE_STD_DATA_FILE` / `CREATE_BACKUP_DATA_FILE` (0xCD / 0xCB),
    /// selected by `backup`.
    pub fn create_data_file(
        &mut self,
        backup: bool,
        file_no: u8,
        comm_mode: CommMode,
        access_rights: AccessRights,
        iso_file_id: Option<u16>,
        file_size: u32,
    ) -> Result<()> {
        let mut payload = vec![file_no];
        if let Some(id) = iso_file_id {
            payload.extend_from_slice(&id.to_be_bytes());
        }
        payload.push(comm_mode.to_bits());
        payload.extend_from_slice(&access_rights.to_bytes());
        payload.extend_from_slice(&write_le24(file_size));

        let command = if backup { cmd::CREATE_BACKUP_DATA_FILE } else { cmd::CREATE_STD_DATA_FILE };
        self.exchange(command, &payload, CommMode::Plain)?;
        Ok(())
    }

    /// `CREATE_VALUE_FILE` (0xCC).
    #[allow(clippy::too_many_arguments)]
    pub fn create_value_file(
        &mut self,
        file_no: u8,
        comm_mode: CommMode,
        access_rights: AccessRights,
        lower: u32,
        upper: u32,
        initial_value: u32,
        limited_credit_enabled: u8,
    ) -> Result<()> {
        let mut payload = vec![file_no];
        payload.push(comm_mode.to_bits());
        payload.extend_from_slice(&access_rights.to_bytes());
        payload.put_u32_le(lower);
        payload.put_u32_le(upper);
        payload.put_u32_le(initial_value);
        payload.push(limited_credit_enabled);
        self.exchange(cmd::CREATE_VALUE_FILE, &payload, CommMode::Plain)?;
        Ok(())
    }

    /// `CREATE_LINEAR_RECORD_FILE` / `CREATE_CYCLIC_RECORD_FILE` (0xC1 /
    /// 0xC0), selected by `cyclic`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_record_file(
        &mut self,
        cyclic: bool,
        file_no: u8,
        comm_mode: CommMode,
        access_rights: AccessRights,
        iso_file_id: Option<u16>,
        record_size: u32,
        max_records: u32,
    ) -> Result<()> {
        let mut payload = vec![file_no];
        if let Some(id) = iso_file_id {
            payload.extend_from_slice(&id.to_be_bytes());
        }
        payload.push(comm_mode.to_bits());
        payload.extend_from_slice(&access_rights.to_bytes());
        payload.extend_from_slice(&write_le24(record_size));
        payload.extend_from_slice(&write_le24(max_records));

        let command = if cyclic { cmd::CREATE_CYCLIC_RECORD_FILE } else { cmd::CREATE_LINEAR_RECORD_FILE };
        self.exchange(command, &payload, CommMode::Plain)?;
        Ok(())
    }

    /// `CREATE_TRANS_MAC_FILE` (0xCE): a transaction-MAC file carries its
    /// own dedicated AES key (`key_type`/`key_version`) rather than reusing
    /// an application key slot.
    pub fn create_transaction_mac_file(
        &mut self,
        file_no: u8,
        comm_mode: CommMode,
        access_rights: AccessRights,
        key_type: u8,
        key_version: u8,
    ) -> Result<()> {
        let mut payload = settings_header(file_no, comm_mode, access_rights);
        payload.push(key_type);
        payload.push(key_version);
        self.exchange(cmd::CREATE_TRANS_MAC_FILE, &payload, CommMode::Plain)?;
        Ok(())
    }

    /// `DELETE_FILE` (0xDF).
    pub fn delete_file(&mut self, file_no: u8) -> Result<()> {
        self.exchange(cmd::DELETE_FILE, &[file_no], CommMode::Plain)?;
        Ok(())
    }
}
