pub mod midi_event;
pub mod midi_packet;
pub mod midi_stream;
