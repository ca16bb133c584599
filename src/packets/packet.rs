use super::control_packets::control_packet::ControlPacket;
use super::error::PacketError;
use super::midi_packets::midi_packet::MidiPacket;

/// A datagram from either socket: an AppleMIDI control command when the
/// `0xFFFF` marker leads, an RTP-MIDI payload otherwise.
#[derive(Debug)]
pub enum RtpMidiPacket<'a> {
    Control(ControlPacket<'a>),
    Midi(MidiPacket<'a>),
}

impl RtpMidiPacket<'_> {
    pub fn parse(bytes: &[u8]) -> Result<RtpMidiPacket<'_>, PacketError> {
        if ControlPacket::is_control_packet(bytes) {
            ControlPacket::parse(bytes).map(RtpMidiPacket::Control)
        } else {
            MidiPacket::parse(bytes).map(RtpMidiPacket::Midi)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_control() {
        let bytes = ControlPacket::new_termination(1, 2);
        match RtpMidiPacket::parse(&bytes) {
            Ok(RtpMidiPacket::Control(ControlPacket::Termination(body))) => {
                assert_eq!(body.initiator_token.get(), 1);
                assert_eq!(body.sender_ssrc.get(), 2);
            }
            other => panic!("expected a control packet, got {other:?}"),
        }
    }

    #[test]
    fn test_classifies_midi() {
        let bytes = MidiPacket::new_as_bytes(1, 2, 3, &[0x90, 0x3C, 0x40]);
        match RtpMidiPacket::parse(&bytes) {
            Ok(RtpMidiPacket::Midi(packet)) => {
                assert_eq!(packet.ssrc(), 3);
                assert_eq!(packet.payload(), &[0x90, 0x3C, 0x40]);
            }
            other => panic!("expected a MIDI packet, got {other:?}"),
        }
    }
}
