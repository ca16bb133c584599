use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    network_endian::{U32, U64},
};

use super::control_packet::ControlPacketHeader;

/// 32-byte body of the `CK` clock synchronisation command: the SSRC field,
/// the exchange count and three timestamps in 100-µs units.
///
/// Outbound exchanges put the session's current endpoint identifier in the
/// SSRC field; receivers demultiplex on it.
#[derive(Debug, KnownLayout, Unaligned, IntoBytes, Immutable, FromBytes)]
#[repr(C)]
pub struct ClockSyncBody {
    pub sender_ssrc: U32,
    pub count: u8,
    reserved: [u8; 3],
    pub timestamps: [U64; 3],
}

impl ClockSyncBody {
    pub fn new(sender_ssrc: u32, count: u8, timestamps: [u64; 3]) -> Self {
        ClockSyncBody {
            sender_ssrc: U32::new(sender_ssrc),
            count,
            reserved: [0; 3],
            timestamps: timestamps.map(U64::new),
        }
    }

    /// Builds the complete 36-byte `CK` datagram.
    pub fn new_packet(sender_ssrc: u32, count: u8, timestamps: [u64; 3]) -> Bytes {
        let header = ControlPacketHeader::new(*b"CK");
        let body = ClockSyncBody::new(sender_ssrc, count, timestamps);
        let mut buffer = BytesMut::with_capacity(size_of::<ControlPacketHeader>() + size_of::<ClockSyncBody>());
        buffer.put_slice(header.as_bytes());
        buffer.put_slice(body.as_bytes());
        buffer.freeze()
    }
}
