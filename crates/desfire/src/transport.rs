//! Frame transport: the three DESFire command-set framings, each driving
//! TX and RX chaining over the `ADDITIONAL_FRAME` (0xAF) continuation
//! protocol on top of a generic [`CardTransport`].

use bytes::{Bytes, BytesMut};
use desfire_core::CardTransport;
use tracing::{debug, trace};

use crate::constants::ADDITIONAL_FRAME;
use crate::error::{Error, Result};
use crate::session::CommandSet;

/// A single logical exchange's raw result: the final status byte and the
/// concatenated response data, reassembled across any chained frames.
#[derive(Debug, Clone)]
pub struct RawExchange {
    pub status: u8,
    pub data: Bytes,
}

/// Convert a transport's associated error (only known generically to
/// satisfy `Into<desfire_core::Error>`) into this crate's [`Error`],
/// unwrapping `desfire_core::Error::Transport` so `Timeout`/`Cancelled`
/// still reach the dedicated error kinds spec §5/§7 call for instead of
/// being buried in [`Error::Core`].
fn convert_transport_err<E: Into<desfire_core::Error>>(err: E) -> Error {
    match err.into() {
        desfire_core::Error::Transport(t) => Error::from(t),
        other => Error::Core(other),
    }
}

/// Drives TX/RX frame chaining for the `Native` and `NativeISO` command
/// sets over a caller-supplied transport. The `ISO` command set bypasses
/// this entirely (see [`FrameTransport::transmit_iso`]).
#[derive(Debug)]
pub struct FrameTransport<T: CardTransport> {
    transport: T,
    max_frame_len: usize,
}

impl<T: CardTransport> FrameTransport<T> {
    /// Build a frame transport with the default maximum TX frame payload
    /// length ([`crate::constants::DESFIRE_TX_FRAME_MAX_LEN`]).
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_frame_len: crate::constants::DESFIRE_TX_FRAME_MAX_LEN,
        }
    }

    /// Override the maximum TX frame payload length for cards that
    /// negotiate a different `FRAME_MAX_LEN`.
    pub const fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run one logical command exchange: TX-chain `payload` out under
    /// `cmd`, then (if `rx_chaining`) RX-chain the reply until the status
    /// byte is no longer `ADDITIONAL_FRAME`.
    pub fn exchange(
        &mut self,
        command_set: CommandSet,
        cmd: u8,
        payload: &[u8],
        rx_chaining: bool,
    ) -> Result<RawExchange> {
        let (mut status, first) = self.tx_chain(command_set, cmd, payload)?;
        let mut data = BytesMut::from(first.as_ref());

        while rx_chaining && status == ADDITIONAL_FRAME {
            let (s, d) = self.transmit_one(command_set, ADDITIONAL_FRAME, &[])?;
            status = s;
            data.extend_from_slice(&d);
        }

        Ok(RawExchange {
            status,
            data: data.freeze(),
        })
    }

    /// Run one logical command exchange, but instead of concatenating the
    /// RX-chained frames into a single buffer, keep each frame's data as
    /// its own `[length, data[record_size-1]]` slot (spec §4.2's
    /// "split-by-size" mode, used by `GET_DF_NAMES`). TX chaining still
    /// behaves as in [`Self::exchange`].
    pub fn exchange_split_by_size(
        &mut self,
        command_set: CommandSet,
        cmd: u8,
        payload: &[u8],
        record_size: usize,
    ) -> Result<Vec<Bytes>> {
        let (mut status, first) = self.tx_chain(command_set, cmd, payload)?;
        let mut records = Vec::new();
        if !first.is_empty() {
            records.push(pack_record(&first, record_size));
        }

        while status == ADDITIONAL_FRAME {
            let (s, d) = self.transmit_one(command_set, ADDITIONAL_FRAME, &[])?;
            status = s;
            if !d.is_empty() {
                records.push(pack_record(&d, record_size));
            }
        }

        Ok(records)
    }

    /// TX-chain `payload` out under `cmd`, returning the final frame's
    /// status byte and data. Shared by [`Self::exchange`] and
    /// [`Self::exchange_split_by_size`], which differ only in how they
    /// RX-chain the reply.
    fn tx_chain(&mut self, command_set: CommandSet, cmd: u8, payload: &[u8]) -> Result<(u8, Bytes)> {
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![&[]]
        } else {
            payload.chunks(self.max_frame_len).collect()
        };
        let last_index = chunks.len() - 1;

        let mut status = 0u8;
        let mut data = Bytes::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let frame_cmd = if i == 0 { cmd } else { ADDITIONAL_FRAME };
            let (s, d) = self.transmit_one(command_set, frame_cmd, chunk)?;
            if i != last_index && s != ADDITIONAL_FRAME {
                debug!(status = s, "card truncated TX chaining early");
                return Err(Error::from_status_byte(s));
            }
            status = s;
            data = d;
        }

        Ok((status, data))
    }

    fn transmit_one(&mut self, command_set: CommandSet, cmd: u8, payload: &[u8]) -> Result<(u8, Bytes)> {
        let frame = match command_set {
            CommandSet::Native => native_frame(cmd, payload),
            CommandSet::NativeIso => nativeiso_frame(cmd, payload),
            CommandSet::Iso => {
                return Err(Error::UnsupportedChannel);
            }
        };

        let raw = self
            .transport
            .transmit_raw(&frame)
            .map_err(convert_transport_err)?;

        match command_set {
            CommandSet::Native => parse_native_response(&raw),
            CommandSet::NativeIso => parse_nativeiso_response(&raw),
            CommandSet::Iso => unreachable!(),
        }
    }

    /// Send a fully-formed ISO 7816 APDU as-is and return the raw response
    /// bytes (including the trailing `SW1 SW2`). The `ISO` command set
    /// does no chaining of its own; callers needing GET RESPONSE chaining
    /// compose with `desfire-core`'s processor chain instead.
    pub fn transmit_iso(&mut self, apdu: &[u8]) -> Result<Bytes> {
        trace!(apdu = ?hex::encode(apdu), "transmitting ISO APDU");
        self.transport.transmit_raw(apdu).map_err(convert_transport_err)
    }
}

/// Pack one split-by-size record as `[len, data..., 0-pad]`, matching the
/// original client's `resp[i*splitbysize] = buflen; memcpy(...)` layout.
fn pack_record(data: &[u8], record_size: usize) -> Bytes {
    let mut out = BytesMut::with_capacity(record_size);
    out.extend_from_slice(&[data.len().min(255) as u8]);
    let body_cap = record_size.saturating_sub(1);
    let take = data.len().min(body_cap);
    out.extend_from_slice(&data[..take]);
    out.resize(record_size, 0);
    out.freeze()
}

fn native_frame(cmd: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(cmd);
    frame.extend_from_slice(payload);
    frame
}

fn parse_native_response(raw: &[u8]) -> Result<(u8, Bytes)> {
    if raw.is_empty() {
        return Err(Error::UnexpectedResponseLength(0, 1));
    }
    Ok((raw[0], Bytes::copy_from_slice(&raw[1..])))
}

fn nativeiso_frame(cmd: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + payload.len() + 1);
    frame.push(0x90);
    frame.push(cmd);
    frame.push(0x00);
    frame.push(0x00);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(0x00);
    frame
}

fn parse_nativeiso_response(raw: &[u8]) -> Result<(u8, Bytes)> {
    if raw.len() < 2 {
        return Err(Error::UnexpectedResponseLength(raw.len(), 2));
    }
    let split = raw.len() - 2;
    let (data, sw) = raw.split_at(split);
    if sw[0] != 0x91 {
        return Err(Error::ChainingMismatch);
    }
    Ok((sw[1], Bytes::copy_from_slice(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use desfire_core::transport::MockTransport;

    #[test]
    fn single_frame_exchange() {
        let mock = MockTransport::with_response(Bytes::from_static(&[0x00, 0xAA, 0xBB]));
        let mut ft = FrameTransport::new(mock);
        let result = ft.exchange(CommandSet::Native, 0x60, &[], true).unwrap();
        assert_eq!(result.status, 0x00);
        assert_eq!(result.data.as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn tx_chaining_splits_at_boundary() {
        let mock = MockTransport::new(vec![
            Bytes::from_static(&[0xAF]),
            Bytes::from_static(&[0xAF]),
            Bytes::from_static(&[0xAF]),
            Bytes::from_static(&[0x00]),
        ]);
        let mut ft = FrameTransport::new(mock).with_max_frame_len(56);
        let payload = vec![0x41u8; 200];
        let result = ft.exchange(CommandSet::Native, 0x3D, &payload, true).unwrap();
        assert_eq!(result.status, 0x00);

        let commands = &ft.transport().commands;
        assert_eq!(commands.len(), 4);
        assert_eq!(commands[0][0], 0x3D);
        assert_eq!(commands[1][0], 0xAF);
        assert_eq!(commands[2][0], 0xAF);
        assert_eq!(commands[3][0], 0xAF);
    }

    #[test]
    fn rx_chaining_concatenates() {
        let mock = MockTransport::new(vec![
            Bytes::from_static(&[0xAF, 0x01, 0x02]),
            Bytes::from_static(&[0x00, 0x03, 0x04]),
        ]);
        let mut ft = FrameTransport::new(mock);
        let result = ft.exchange(CommandSet::Native, 0xBD, &[], true).unwrap();
        assert_eq!(result.status, 0x00);
        assert_eq!(result.data.as_ref(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn rx_chaining_disabled_surfaces_first_frame() {
        let mock = MockTransport::new(vec![Bytes::from_static(&[0xAF, 0x01, 0x02])]);
        let mut ft = FrameTransport::new(mock);
        let result = ft.exchange(CommandSet::Native, 0xBD, &[], false).unwrap();
        assert_eq!(result.status, 0xAF);
        assert_eq!(result.data.as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn split_by_size_keeps_per_frame_records() {
        // Two chained DF-name records of different lengths, record size 24
        // per GET_DF_NAMES.
        let mut first = vec![0xAF];
        first.extend_from_slice(&[0xAA; 8]);
        let mut second = vec![0x00];
        second.extend_from_slice(&[0xBB; 5]);
        let mock = MockTransport::new(vec![Bytes::from(first), Bytes::from(second)]);
        let mut ft = FrameTransport::new(mock);
        let records = ft
            .exchange_split_by_size(CommandSet::Native, 0x6D, &[], 24)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].len(), 24);
        assert_eq!(records[0][0], 8);
        assert_eq!(&records[0][1..9], &[0xAA; 8]);
        assert_eq!(records[1][0], 5);
        assert_eq!(&records[1][1..6], &[0xBB; 5]);
    }

    #[test]
    fn nativeiso_wraps_and_unwraps() {
        let mock = MockTransport::with_response(Bytes::from_static(&[0xAA, 0xBB, 0x91, 0x00]));
        let mut ft = FrameTransport::new(mock);
        let result = ft.exchange(CommandSet::NativeIso, 0x60, &[], true).unwrap();
        assert_eq!(result.status, 0x00);
        assert_eq!(result.data.as_ref(), &[0xAA, 0xBB]);

        let sent = &ft.transport().commands[0];
        assert_eq!(sent[0], 0x90);
        assert_eq!(sent[1], 0x60);
    }
}
