use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, network_endian::U32};

/// AppleMIDI session protocol version carried by every `IN`/`OK`/`NO`/`BY`.
pub const PROTOCOL_VERSION: u32 = 2;

/// Fixed 12-byte body shared by the `IN`, `OK`, `NO` and `BY` commands. An
/// optional null-terminated name follows it on the wire.
#[derive(Debug, KnownLayout, Unaligned, IntoBytes, Immutable, FromBytes)]
#[repr(C)]
pub struct SessionInitiationBody {
    pub protocol_version: U32,
    pub initiator_token: U32,
    pub sender_ssrc: U32,
}

impl SessionInitiationBody {
    pub fn new(initiator_token: u32, sender_ssrc: u32) -> Self {
        SessionInitiationBody {
            protocol_version: U32::new(PROTOCOL_VERSION),
            initiator_token: U32::new(initiator_token),
            sender_ssrc: U32::new(sender_ssrc),
        }
    }
}
