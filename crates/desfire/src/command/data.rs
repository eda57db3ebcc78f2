//! Standard/backup data-file I/O: `READ_DATA`/`WRITE_DATA`.

use desfire_core::CardTransport;

use crate::constants::cmd;
use crate::session::CommMode;
use crate::util::write_le24;
use crate::Desfire;
use crate::Result;

impl<T: CardTransport> Desfire<T> {
    /// `READ_DATA` (0xBD): `offset`/`length` are 24-bit byte offsets into
    /// the file.
    pub fn read_data(
        &mut self,
        file_no: u8,
        offset: u32,
        length: u32,
        comm_mode: CommMode,
    ) -> Result<Vec<u8>> {
        let mut payload = vec![file_no];
        payload.extend_from_slice(&write_le24(offset));
        payload.extend_from_slice(&write_le24(length));
        let data = self.exchange(cmd::READ_DATA, &payload, comm_mode)?;
        Ok(data.to_vec())
    }

    /// `WRITE_DATA` (0x3D).
    pub fn write_data(
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
        self.exchange(cmd::WRITE_DATA, &payload, comm_mode)?;
        Ok(())
    }
}
