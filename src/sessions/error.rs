use thiserror::Error;

use crate::packets::midi_packets::midi_packet::MidiPacket;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// An `OK` whose initiator token is not the identifier this session is
    /// known by. The session is torn down when this surfaces.
    #[error("acknowledgment token {got:#010x} does not match session {expected:#010x}")]
    HandshakeMismatch { expected: u32, got: u32 },
    /// Outbound MIDI longer than the short-form section header can frame.
    #[error("MIDI event of {0} bytes exceeds the {max} byte limit", max = MidiPacket::MAX_PAYLOAD)]
    EventTooLarge(usize),
}
