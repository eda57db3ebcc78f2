//! Application directory commands: create/delete, and the two listing
//! commands that return one record per application.

use desfire_core::CardTransport;

use crate::constants::cmd;
use crate::descriptor::DfName;
use crate::session::CommMode;
use crate::util::aid_to_bytes;
use crate::Desfire;
use crate::Result;

impl<T: CardTransport> Desfire<T> {
    /// `CREATE_APPLICATION` (0xCA): `key_settings` and `num_keys` are the
    /// raw wire bytes (spec §3's `KeySettings`/`NumKeys`); `iso_df_id` and
    /// `df_name` are optional and appended only when present.
    pub fn create_application(
        &mut self,
        aid: u32,
        key_settings: u8,
        num_keys: u8,
        iso_df_id: Option<u16>,
        df_name: Option<&[u8]>,
    ) -> Result<()> {
        let mut payload = Vec::with_capacity(5 + 2 + 16);
        payload.extend_from_slice(&aid_to_bytes(aid));
        payload.push(key_settings);
        payload.push(num_keys);
        if let Some(id) = iso_df_id {
            payload.extend_from_slice(&id.to_be_bytes());
        }
        if let Some(name) = df_name {
            payload.extend_from_slice(name);
        }
        self.exchange(cmd::CREATE_APPLICATION, &payload, CommMode::Plain)?;
        Ok(())
    }

    /// `DELETE_APPLICATION` (0xDA).
    pub fn delete_application(&mut self, aid: u32) -> Result<()> {
        self.exchange(cmd::DELETE_APPLICATION, &aid_to_bytes(aid), CommMode::Plain)?;
        Ok(())
    }

    /// `GET_APPLICATION_IDS` (0x6A): the full AID directory, one 3-byte AID
    /// per entry, plainly concatenated across any RX-chained frames (unlike
    /// `GET_DF_NAMES`, this command does not need split-by-size framing).
    pub fn application_ids(&mut self) -> Result<Vec<u32>> {
        let data = self.exchange(cmd::GET_APPLICATION_IDS, &[], CommMode::Plain)?;
        Ok(data
            .chunks_exact(3)
            .map(|chunk| crate::util::aid_from_bytes([chunk[0], chunk[1], chunk[2]]))
            .collect())
    }

    /// `GET_DF_NAMES` (0x6D): one `DfName` record per chained frame, each
    /// frame packed as a fixed 24-byte split-by-size slot (spec §4.2).
    pub fn df_names(&mut self) -> Result<Vec<DfName>> {
        let records = self.exchange_split_by_size(cmd::GET_DF_NAMES, &[], CommMode::Plain, 24)?;
        records
            .into_iter()
            .map(|record| {
                let len = record.first().copied().unwrap_or(0) as usize;
                let body = &record[1..1 + len.min(record.len().saturating_sub(1))];
                DfName::decode(body)
            })
            .collect()
    }
}
