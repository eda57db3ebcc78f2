//! Transaction boundary commands: `COMMIT_TRANSACTION`/`ABORT_TRANSACTION`.

use desfire_core::CardTransport;

use crate::constants::cmd;
use crate::session::CommMode;
use crate::Desfire;
use crate::Result;

impl<T: CardTransport> Desfire<T> {
    /// `COMMIT_TRANSACTION` (0xC7). `options`, when present, carries the
    /// EV2 "commit with continue" flags (bit 0 requests the transaction
    /// stay open for further commands); omitting it sends the bare
    /// zero-length legacy form.
    pub fn commit_transaction(&mut self, options: Option<u8>) -> Result<()> {
        let payload = options.map(|o| vec![o]).unwrap_or_default();
        self.exchange(cmd::COMMIT_TRANSACTION, &payload, CommMode::Plain)?;
        Ok(())
    }

    /// `ABORT_TRANSACTION` (0xA7): roll back every write since the last
    /// commit. The PICC's own backup mechanism handles any torn commit;
    /// this call only reports the resulting status.
    pub fn abort_transaction(&mut self) -> Result<()> {
        self.exchange(cmd::ABORT_TRANSACTION, &[], CommMode::Plain)?;
        Ok(())
    }
}
