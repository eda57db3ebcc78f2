//! ISO 7816 command-set primitives, exposed standalone for callers driving
//! the `ISO` command set directly rather than through [`crate::AuthMethod::Iso`].

use desfire_core::CardTransport;

use crate::auth;
use crate::constants::cmd;
use crate::error::Error;
use crate::Desfire;
use crate::Result;

impl<T: CardTransport> Desfire<T> {
    /// `ISO SELECT FILE` (`INS=0xA4`), selecting by DF name (`P1=0x04`,
    /// "select by name", no FCI returned). Used to select the PICC or an
    /// application under the `ISO` command set, where `SELECT_APPLICATION`
    /// is unavailable.
    pub fn iso_select(&mut self, df_name: &[u8]) -> Result<Vec<u8>> {
        let mut apdu = vec![0x00, cmd::ISO_SELECT_FILE, 0x04, 0x0C, df_name.len() as u8];
        apdu.extend_from_slice(df_name);
        let resp = self.frame_transport_mut().transmit_iso(&apdu)?;
        if resp.len() < 2 {
            return Err(Error::UnexpectedResponseLength(resp.len(), 2));
        }
        let split = resp.len() - 2;
        if resp[split] != 0x90 || resp[split + 1] != 0x00 {
            return Err(Error::from_status_byte(resp[split + 1]));
        }
        self.clear_session();
        Ok(resp[..split].to_vec())
    }

    /// `ISO GET CHALLENGE` (`INS=0x84`): request `len` bytes of PICC
    /// randomness, the first step of the ISO auth handshake.
    pub fn iso_get_challenge(&mut self, len: usize) -> Result<Vec<u8>> {
        auth::iso_get_challenge(self.frame_transport_mut(), len)
    }

    /// `ISO EXTERNAL AUTHENTICATE` (`INS=0x82`): present a host-encrypted
    /// cryptogram under `key_no` for verification.
    pub fn iso_external_authenticate(&mut self, key_no: u8, cryptogram: &[u8]) -> Result<()> {
        auth::iso_external_authenticate(self.frame_transport_mut(), key_no, cryptogram)
    }

    /// `ISO INTERNAL AUTHENTICATE` (`INS=0x88`): request the PICC encrypt
    /// `challenge` under `key_no`, returning the raw (still-encrypted)
    /// response.
    pub fn iso_internal_authenticate(&mut self, key_no: u8, challenge: &[u8]) -> Result<Vec<u8>> {
        auth::iso_internal_authenticate(self.frame_transport_mut(), key_no, challenge)
    }
}
