use tracing::warn;

use super::midi_event::MidiEvent;

/// Decodes a raw MIDI byte stream into structured events.
///
/// Running status is tracked for the duration of one buffer: a status byte
/// stays current until the next one appears, so continuation runs decode
/// correctly however the stream happens to be split across datagrams. The
/// running-status byte never leaves this function.
pub fn decode(buffer: &[u8]) -> Vec<MidiEvent> {
    let mut events = Vec::new();
    let mut status: Option<u8> = None;
    let mut payload: Vec<u8> = Vec::with_capacity(2);
    let mut expected = 2;

    for &byte in buffer {
        if byte & 0x80 != 0 {
            status = Some(byte);
            payload.clear();
            expected = match byte & 0xF0 {
                0xC0 | 0xD0 => 1,
                _ => 2,
            };
            continue;
        }
        match status {
            None => warn!("data byte {byte:#04x} before any status byte, dropping"),
            Some(0xF0) => {
                if byte == 0x7F {
                    warn!("dropping {}-byte sysex run", payload.len());
                    payload.clear();
                    status = None;
                } else {
                    payload.push(byte);
                }
            }
            Some(current) => {
                payload.push(byte);
                if payload.len() == expected {
                    match MidiEvent::from_wire(current, &payload) {
                        Some(event) => events.push(event),
                        None => warn!("unsupported MIDI status {current:#04x}, dropping event"),
                    }
                    // Keep the running status for the next payload run.
                    payload.clear();
                }
            }
        }
    }

    events
}
