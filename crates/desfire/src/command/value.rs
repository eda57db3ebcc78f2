//! Value-file operations: `GET_VALUE`, `CREDIT`, `DEBIT`, `LIMITED_CREDIT`.

use desfire_core::CardTransport;

use crate::constants::cmd;
use crate::error::Error;
use crate::session::CommMode;
use crate::util::{read_le32, write_le32};
use crate::Desfire;
use crate::Result;

impl<T: CardTransport> Desfire<T> {
    /// `GET_VALUE` (0x6C): the file's current stored value.
    pub fn get_value(&mut self, file_no: u8, comm_mode: CommMode) -> Result<u32> {
        let data = self.exchange(cmd::GET_VALUE, &[file_no], comm_mode)?;
        read_le32(&data)
    }

    /// `CREDIT` (0x0C): add `amount` to the stored value.
    pub fn credit(&mut self, file_no: u8, amount: u32, comm_mode: CommMode) -> Result<()> {
        self.value_op(cmd::CREDIT, file_no, amount, comm_mode)
    }

    /// `DEBIT` (0xDC): subtract `amount` from the stored value.
    pub fn debit(&mut self, file_no: u8, amount: u32, comm_mode: CommMode) -> Result<()> {
        self.value_op(cmd::DEBIT, file_no, amount, comm_mode)
    }

    /// `LIMITED_CREDIT` (0x1C): credit usable without the `Credit` access
    /// right, capped by the file's `limitedCreditEnabled` flag.
    pub fn limited_credit(&mut self, file_no: u8, amount: u32, comm_mode: CommMode) -> Result<()> {
        self.value_op(cmd::LIMITED_CREDIT, file_no, amount, comm_mode)
    }

    fn value_op(&mut self, command: u8, file_no: u8, amount: u32, comm_mode: CommMode) -> Result<()> {
        let mut payload = vec![file_no];
        payload.extend_from_slice(&write_le32(amount));
        let data = self.exchange(command, &payload, comm_mode)?;
        if !data.is_empty() {
            return Err(Error::UnexpectedResponseLength(data.len(), 0));
        }
        Ok(())
    }
}
