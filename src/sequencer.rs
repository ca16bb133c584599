//! The seam between the session engine and whatever drives the local MIDI
//! sequencer device. The engine never touches the device; it exchanges
//! structured events over this channel pair, so tests substitute the
//! collaborator wholesale.

use tokio::sync::mpsc;
use tracing::warn;

use crate::packets::midi_packets::midi_event::MidiEvent;

/// The engine half: events the local sequencer produced, plus a sink for
/// events received from the network.
pub(crate) struct SequencerLink {
    pub(crate) outbound: mpsc::UnboundedReceiver<MidiEvent>,
    inbound: mpsc::UnboundedSender<MidiEvent>,
}

/// The collaborator half, held by whatever owns the local sequencer device.
pub struct SequencerHandle {
    to_network: mpsc::UnboundedSender<MidiEvent>,
    from_network: mpsc::UnboundedReceiver<MidiEvent>,
}

pub(crate) fn link() -> (SequencerLink, SequencerHandle) {
    let (to_network, outbound) = mpsc::unbounded_channel();
    let (inbound, from_network) = mpsc::unbounded_channel();
    (
        SequencerLink { outbound, inbound },
        SequencerHandle { to_network, from_network },
    )
}

impl SequencerLink {
    /// Delivers a network event for local playback.
    pub(crate) fn deliver(&self, event: MidiEvent) {
        if self.inbound.send(event).is_err() {
            warn!("sequencer handle dropped, discarding {event:?}");
        }
    }
}

impl SequencerHandle {
    /// Offers an event from the local sequencer to every live session.
    pub fn send(&self, event: MidiEvent) {
        let _ = self.to_network.send(event);
    }

    /// Waits for the next event received from the network. `None` once the
    /// bridge has shut down.
    pub async fn recv(&mut self) -> Option<MidiEvent> {
        self.from_network.recv().await
    }
}
