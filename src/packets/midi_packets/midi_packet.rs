use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    network_endian::{U16, U32},
};

use crate::packets::error::PacketError;

/// RTP flags for the short-form MIDI payload: version 2, payload type 97.
const RTP_MIDI_FLAGS: [u8; 2] = [0x80, 0x61];

/// Fixed 12-byte RTP header. The SSRC field carries the session's endpoint
/// identifier; receivers demultiplex on it.
#[derive(Debug, KnownLayout, Unaligned, IntoBytes, Immutable, FromBytes)]
#[repr(C)]
pub struct MidiPacketHeader {
    flags: [u8; 2],
    pub sequence_number: U16,
    pub timestamp: U32,
    pub ssrc: U32,
}

/// One inbound RTP-MIDI datagram: the parsed header plus the MIDI command
/// section that follows the one-byte section header.
#[derive(Debug)]
pub struct MidiPacket<'a> {
    header: &'a MidiPacketHeader,
    payload: &'a [u8],
}

impl MidiPacket<'_> {
    /// Longest command section the short-form section header can describe.
    pub const MAX_PAYLOAD: usize = 16;

    pub fn parse(buffer: &[u8]) -> Result<MidiPacket<'_>, PacketError> {
        let (header, remainder) =
            MidiPacketHeader::ref_from_prefix(buffer).map_err(|_| PacketError::NotEnoughData(buffer.len()))?;
        // The byte after the header is the RTP-MIDI section header; its low
        // nibble is the section length, which is not trusted over the
        // datagram length itself.
        let payload = remainder.get(1..).unwrap_or(&[]);
        Ok(MidiPacket { header, payload })
    }

    pub fn ssrc(&self) -> u32 {
        self.header.ssrc.get()
    }

    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number.get()
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp.get()
    }

    pub fn payload(&self) -> &[u8] {
        self.payload
    }

    /// Builds an outbound short-form datagram for one MIDI command run.
    pub fn new_as_bytes(sequence_number: u16, timestamp: u32, ssrc: u32, payload: &[u8]) -> Bytes {
        let header = MidiPacketHeader {
            flags: RTP_MIDI_FLAGS,
            sequence_number: U16::new(sequence_number),
            timestamp: U32::new(timestamp),
            ssrc: U32::new(ssrc),
        };
        let mut buffer = BytesMut::with_capacity(size_of::<MidiPacketHeader>() + 1 + payload.len());
        buffer.put_slice(header.as_bytes());
        buffer.put_u8((payload.len() & 0x0F) as u8);
        buffer.put_slice(payload);
        buffer.freeze()
    }
}
