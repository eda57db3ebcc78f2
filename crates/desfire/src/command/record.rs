//! Record-file operations: write/update a record, read a record range, and
//! clear the file back to empty.

use desfire_core::CardTransport;

use crate::constants::cmd;
use crate::session::CommMode;
use crate::util::write_le24;
use crate::Desfire;
use crate::Result;

impl<T: CardTransport> Desfire<T> {
    /// `WRITE_RECORD` (0x3B): append/overwrite bytes within the file's most
    /// recent (not yet committed) record, starting at `offset`.
    pub fn write_record(
        &mut self,
        file_no: u8,
        offset: u32,
        data: &[u8],
        comm_mode: CommMode,
    ) -> Result<()> {
        let mut payload = Vec::with_capacity(7 + data.len());
        payload.push(file_no);
        payload.extend_from_slice(&write_le24(offset));
        payload.extend_from_slice(&write_le24(data.len() as u32));
        payload.extend_from_slice(data);
        self.exchange(cmd::WRITE_RECORD, &payload, comm_mode)?;
        Ok(())
    }

    /// `UPDATE_RECORD` (0xDB, EV2+): overwrite bytes within an already
    /// committed record `record_no`, starting at `offset`.
    pub fn update_record(
        &mut self,
        file_no: u8,
        record_no: u32,
        offset: u32,
        data: &[u8],
        comm_mode: CommMode,
    ) -> Result<()> {
        let mut payload = Vec::with_capacity(10 + data.len());
        payload.push(file_no);
        payload.extend_from_slice(&write_le24(record_no));
        payload.extend_from_slice(&write_le24(offset));
        payload.extend_from_slice(&write_le24(data.len() as u32));
        payload.extend_from_slice(data);
        self.exchange(cmd::UPDATE_RECORD, &payload, comm_mode)?;
        Ok(())
    }

    /// `READ_RECORDS` (0xBB): read `record_count` records starting at
    /// `record_no` (`0` for linear files means "the oldest"; cyclic files
    /// count backward from the newest).
    pub fn read_records(
        &mut self,
        file_no: u8,
        record_no: u32,
        record_count: u32,
        comm_mode: CommMode,
    ) -> Result<Vec<u8>> {
        let mut payload = vec![file_no];
        payload.extend_from_slice(&write_le24(record_no));
        payload.extend_from_slice(&write_le24(record_count));
        let data = self.exchange(cmd::READ_RECORDS, &payload, comm_mode)?;
        Ok(data.to_vec())
    }

    /// `CLEAR_RECORD_FILE` (0xEB): reset the record file to zero records.
    pub fn clear_record_file(&mut self, file_no: u8) -> Result<()> {
        self.exchange(cmd::CLEAR_RECORD_FILE, &[file_no], CommMode::Plain)?;
        Ok(())
    }
}
