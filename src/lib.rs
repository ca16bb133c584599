//! Bridges a local MIDI sequencer to remote AppleMIDI (RTP-MIDI) peers over
//! UDP.
//!
//! The heart of the crate is the AppleMIDI session engine: a per-peer state
//! machine that negotiates sessions on the control channel, keeps clocks in
//! step with the three-message `CK` exchange, frames RTP-MIDI datagrams on
//! the data channel and transduces between raw MIDI byte streams and
//! structured events.
//!
//! Everything of consequence runs on a single `tokio` task, so session state
//! needs no locks. The only cross-thread touchpoint is the task queue that
//! service discovery (and the CLI) use to inject new peers.
//!
//! ## Unsupported features
//! - **Recovery Journal**: lost datagrams stay lost; delivery is UDP
//!   best-effort.
//! - **Inbound invitations**: the engine connects out, it does not accept.

#[cfg(feature = "mdns")]
pub mod discovery;
pub mod packets;
pub mod sequencer;
pub mod sessions;
