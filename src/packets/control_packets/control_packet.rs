use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::clock_sync_packet::ClockSyncBody;
use super::session_initiation_packet::SessionInitiationBody;
use crate::packets::error::PacketError;

const CONTROL_PACKET_MARKER: [u8; 2] = [0xFF, 0xFF];

#[derive(Debug, KnownLayout, Unaligned, IntoBytes, Immutable, FromBytes)]
#[repr(C)]
pub struct ControlPacketHeader {
    marker: [u8; 2],
    pub command: [u8; 2],
}

impl ControlPacketHeader {
    pub fn new(command: [u8; 2]) -> ControlPacketHeader {
        ControlPacketHeader {
            marker: CONTROL_PACKET_MARKER,
            command,
        }
    }
}

/// One parsed AppleMIDI control command, borrowing from the datagram buffer.
#[derive(Debug)]
pub enum ControlPacket<'a> {
    Invitation { body: &'a SessionInitiationBody, name: &'a str },
    Acceptance { body: &'a SessionInitiationBody, name: &'a str },
    Rejection(&'a SessionInitiationBody),
    Termination(&'a SessionInitiationBody),
    ClockSync(&'a ClockSyncBody),
}

impl ControlPacket<'_> {
    /// Two leading `0xFF` bytes distinguish a control command from an
    /// RTP-MIDI datagram.
    pub fn is_control_packet(buffer: &[u8]) -> bool {
        buffer.starts_with(&CONTROL_PACKET_MARKER)
    }

    pub fn parse(buffer: &[u8]) -> Result<ControlPacket<'_>, PacketError> {
        let (header, remainder) =
            ControlPacketHeader::ref_from_prefix(buffer).map_err(|_| PacketError::NotEnoughData(buffer.len()))?;

        match &header.command {
            b"CK" => {
                let (body, _) =
                    ClockSyncBody::ref_from_prefix(remainder).map_err(|_| PacketError::NotEnoughData(buffer.len()))?;
                Ok(ControlPacket::ClockSync(body))
            }
            b"IN" | b"OK" => {
                let (body, payload) = SessionInitiationBody::ref_from_prefix(remainder)
                    .map_err(|_| PacketError::NotEnoughData(buffer.len()))?;
                let name = parse_name(payload)?;
                if header.command == *b"IN" {
                    Ok(ControlPacket::Invitation { body, name })
                } else {
                    Ok(ControlPacket::Acceptance { body, name })
                }
            }
            b"NO" | b"BY" => {
                // A rejection may carry a name the way an acceptance does;
                // nothing consults it, so trailing bytes are ignored.
                let (body, _) = SessionInitiationBody::ref_from_prefix(remainder)
                    .map_err(|_| PacketError::NotEnoughData(buffer.len()))?;
                if header.command == *b"NO" {
                    Ok(ControlPacket::Rejection(body))
                } else {
                    Ok(ControlPacket::Termination(body))
                }
            }
            command => Err(PacketError::UnknownCommand(u16::from_be_bytes(*command))),
        }
    }

    fn new_session_command(command: [u8; 2], initiator_token: u32, sender_ssrc: u32, name: Option<&str>) -> Bytes {
        let header = ControlPacketHeader::new(command);
        let body = SessionInitiationBody::new(initiator_token, sender_ssrc);
        let name_length = name.map_or(0, |n| n.len() + 1);
        let mut buffer =
            BytesMut::with_capacity(size_of::<ControlPacketHeader>() + size_of::<SessionInitiationBody>() + name_length);
        buffer.put_slice(header.as_bytes());
        buffer.put_slice(body.as_bytes());
        if let Some(name) = name {
            buffer.put_slice(name.as_bytes());
            buffer.put_u8(0);
        }
        buffer.freeze()
    }

    pub fn new_invitation(initiator_token: u32, sender_ssrc: u32, name: &str) -> Bytes {
        Self::new_session_command(*b"IN", initiator_token, sender_ssrc, Some(name))
    }

    pub fn new_termination(initiator_token: u32, sender_ssrc: u32) -> Bytes {
        Self::new_session_command(*b"BY", initiator_token, sender_ssrc, None)
    }
}

fn parse_name(payload: &[u8]) -> Result<&str, PacketError> {
    let end = payload.iter().position(|&b| b == 0).ok_or(PacketError::UnterminatedName)?;
    std::str::from_utf8(&payload[..end]).map_err(|_| PacketError::InvalidName)
}
