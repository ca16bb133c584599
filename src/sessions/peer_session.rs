use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::error::SessionError;
use crate::packets::control_packets::clock_sync_packet::ClockSyncBody;
use crate::packets::control_packets::control_packet::ControlPacket;
use crate::packets::midi_packets::midi_packet::MidiPacket;

/// Handshake progress of one peer session, driven by the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotConnected,
    SentRequest,
    Connected,
    /// A clock-sync exchange is in flight; back to `Connected` once a
    /// `count = 2` message is seen or sent.
    Sync,
}

/// One logical AppleMIDI connection to one remote host.
///
/// The registry keys it by its endpoint identifier: the locally chosen
/// initiator token until the handshake completes, the remote SSRC afterwards.
/// Sessions perform no I/O themselves; they mutate state and hand finished
/// datagrams back to the driver.
#[derive(Debug)]
pub struct PeerSession {
    remote_addr: SocketAddr,
    eid: u32,
    initiator_token: u32,
    name: Option<String>,
    state: SessionState,
    conn_start: Option<Instant>,
    clock_offset: Option<i64>,
    last_sync: Instant,
    seq1: u16,
    // Shadow counter kept beside seq1; nothing transmits it in the current
    // framing.
    seq2: u16,
}

impl PeerSession {
    pub fn new(remote_addr: SocketAddr, initiator_token: u32) -> Self {
        PeerSession {
            remote_addr,
            eid: initiator_token,
            initiator_token,
            name: None,
            state: SessionState::NotConnected,
            conn_start: None,
            clock_offset: None,
            last_sync: Instant::now(),
            seq1: rand::random(),
            seq2: rand::random(),
        }
    }

    pub fn eid(&self) -> u32 {
        self.eid
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Signed estimate of the remote clock minus the local session clock, in
    /// 100-µs units. Defined once a full sync round has completed.
    pub fn clock_offset(&self) -> Option<i64> {
        self.clock_offset
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Remote data port: one above the control port.
    pub fn data_addr(&self) -> SocketAddr {
        SocketAddr::new(self.remote_addr.ip(), self.remote_addr.port() + 1)
    }

    pub(crate) fn set_eid(&mut self, eid: u32) {
        self.eid = eid;
    }

    /// Whether the control-channel handshake has completed.
    pub fn is_established(&self) -> bool {
        matches!(self.state, SessionState::Connected | SessionState::Sync)
    }

    pub(crate) fn is_stale(&self, cutoff: Duration) -> bool {
        self.last_sync.elapsed() >= cutoff
    }

    /// Builds the invitation sent on both channels when the session opens.
    pub(crate) fn invitation(&mut self, local_ssrc: u32, name: &str) -> Bytes {
        self.state = SessionState::SentRequest;
        ControlPacket::new_invitation(self.eid, local_ssrc, name)
    }

    /// Checks an acknowledgment token against the identifier this session is
    /// registered under.
    pub(crate) fn validate_acknowledgment(&self, initiator_token: u32) -> Result<(), SessionError> {
        if initiator_token != self.eid {
            return Err(SessionError::HandshakeMismatch { expected: self.eid, got: initiator_token });
        }
        Ok(())
    }

    /// Completes the handshake once the registry has rebound this session to
    /// the remote SSRC.
    pub(crate) fn complete_handshake(&mut self, name: &str) {
        self.conn_start = Some(Instant::now());
        self.name = Some(name.to_owned());
        self.state = SessionState::Connected;
        self.last_sync = Instant::now();
        info!("[{:08X}] connected to {} ({name})", self.eid, self.remote_addr);
    }

    /// Starts a clock-sync exchange as the initiator.
    pub(crate) fn begin_sync(&mut self) -> Bytes {
        self.state = SessionState::Sync;
        debug!("[{:08X}] sync", self.eid);
        ClockSyncBody::new_packet(self.eid, 0, [self.time_100us(), 0, 0])
    }

    /// Advances an in-flight exchange by one received `CK`. The returned
    /// datagram, if any, goes back out on the control channel.
    pub(crate) fn handle_clock_sync(&mut self, ck: &ClockSyncBody) -> Option<Bytes> {
        self.last_sync = Instant::now();
        let [t1, t2, t3] = ck.timestamps.map(|t| t.get());
        match ck.count {
            0 => {
                self.state = SessionState::Sync;
                Some(ClockSyncBody::new_packet(self.eid, 1, [t1, self.time_100us(), 0]))
            }
            1 => {
                let t3 = self.time_100us();
                self.finish_sync(t1, t2, t3);
                Some(ClockSyncBody::new_packet(self.eid, 2, [t1, t2, t3]))
            }
            2 => {
                self.finish_sync(t1, t2, t3);
                None
            }
            count => {
                warn!("[{:08X}] unexpected clock sync count {count}", self.eid);
                None
            }
        }
    }

    fn finish_sync(&mut self, t1: u64, t2: u64, t3: u64) {
        let offset = ((t1 + t3) / 2) as i64 - t2 as i64;
        self.clock_offset = Some(offset);
        self.state = SessionState::Connected;
        info!("[{:08X}] clock offset is now {offset}", self.eid);
    }

    /// Frames one encoded MIDI run for the data channel. `Ok(None)` until the
    /// handshake has completed.
    pub(crate) fn frame_midi(&mut self, payload: &[u8]) -> Result<Option<Bytes>, SessionError> {
        let Some(start) = self.conn_start else {
            return Ok(None);
        };
        if payload.len() > MidiPacket::MAX_PAYLOAD {
            return Err(SessionError::EventTooLarge(payload.len()));
        }
        self.seq1 = self.seq1.wrapping_add(1);
        self.seq2 = self.seq2.wrapping_add(1);
        let timestamp = start.elapsed().as_millis() as u32;
        Ok(Some(MidiPacket::new_as_bytes(self.seq1, timestamp, self.eid, payload)))
    }

    /// Builds the goodbye announcing this session's end.
    pub(crate) fn termination(&self, local_ssrc: u32) -> Bytes {
        ControlPacket::new_termination(self.initiator_token, local_ssrc)
    }

    /// Session-relative time in 100-µs units; zero until connected.
    fn time_100us(&self) -> u64 {
        self.conn_start.map_or(0, |start| start.elapsed().as_micros() as u64 / 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::control_packets::control_packet::ControlPacket;

    fn session() -> PeerSession {
        PeerSession::new("192.168.0.10:5004".parse().unwrap(), 0x1122_3344)
    }

    #[test]
    fn test_new_session_is_keyed_by_its_token() {
        let session = session();
        assert_eq!(session.eid(), 0x11223344);
        assert_eq!(session.state(), SessionState::NotConnected);
        assert_eq!(session.clock_offset(), None);
        assert_eq!(session.data_addr(), "192.168.0.10:5005".parse().unwrap());
    }

    #[test]
    fn test_invitation_moves_to_sent_request() {
        let mut session = session();
        let packet = session.invitation(0xAABB_CCDD, "bridge");
        assert_eq!(session.state(), SessionState::SentRequest);
        match ControlPacket::parse(&packet) {
            Ok(ControlPacket::Invitation { body, name }) => {
                assert_eq!(body.initiator_token.get(), session.eid());
                assert_eq!(body.sender_ssrc.get(), 0xAABBCCDD);
                assert_eq!(name, "bridge");
            }
            other => panic!("expected an invitation, got {other:?}"),
        }
    }

    #[test]
    fn test_acknowledgment_validation() {
        let session = session();
        assert_eq!(session.validate_acknowledgment(0x1122_3344), Ok(()));
        assert_eq!(
            session.validate_acknowledgment(0xDEAD_BEEF),
            Err(SessionError::HandshakeMismatch { expected: 0x11223344, got: 0xDEADBEEF })
        );
    }

    #[test]
    fn test_complete_handshake() {
        let mut session = session();
        session.invitation(0xAABB_CCDD, "bridge");
        session.complete_handshake("peer");
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.is_established());
        assert_eq!(session.name(), Some("peer"));
    }

    #[test]
    fn test_responder_echoes_t1() {
        let mut session = session();
        session.complete_handshake("peer");
        let ck0 = ClockSyncBody::new(0x5566_7788, 0, [12345, 0, 0]);
        let reply = session.handle_clock_sync(&ck0).expect("count 0 must be answered");
        assert_eq!(session.state(), SessionState::Sync);
        match ControlPacket::parse(&reply) {
            Ok(ControlPacket::ClockSync(body)) => {
                assert_eq!(body.count, 1);
                assert_eq!(body.timestamps[0].get(), 12345);
                assert_eq!(body.timestamps[2].get(), 0);
            }
            other => panic!("expected a clock sync, got {other:?}"),
        }
    }

    #[test]
    fn test_initiator_computes_offset_and_replies() {
        let mut session = session();
        session.complete_handshake("peer");
        let sync = session.begin_sync();
        assert_eq!(session.state(), SessionState::Sync);
        let t1 = match ControlPacket::parse(&sync) {
            Ok(ControlPacket::ClockSync(body)) => {
                assert_eq!(body.count, 0);
                body.timestamps[0].get()
            }
            other => panic!("expected a clock sync, got {other:?}"),
        };

        let ck1 = ClockSyncBody::new(0x5566_7788, 1, [t1, 1000, 0]);
        let reply = session.handle_clock_sync(&ck1).expect("count 1 must be answered");
        assert_eq!(session.state(), SessionState::Connected);
        let (t3, offset) = match ControlPacket::parse(&reply) {
            Ok(ControlPacket::ClockSync(body)) => {
                assert_eq!(body.count, 2);
                assert_eq!(body.timestamps[0].get(), t1);
                assert_eq!(body.timestamps[1].get(), 1000);
                (body.timestamps[2].get(), session.clock_offset().expect("offset must be set"))
            }
            other => panic!("expected a clock sync, got {other:?}"),
        };
        assert_eq!(offset, ((t1 + t3) / 2) as i64 - 1000);
    }

    #[test]
    fn test_both_sides_compute_the_same_offset() {
        let mut initiator = session();
        let mut responder = PeerSession::new("192.168.0.11:5004".parse().unwrap(), 0x5566_7788);
        initiator.complete_handshake("responder");
        responder.complete_handshake("initiator");

        let ck0 = initiator.begin_sync();
        let ck0 = parse_ck(&ck0);
        let ck1 = responder.handle_clock_sync(&ck0).unwrap();
        let ck1 = parse_ck(&ck1);
        let ck2 = initiator.handle_clock_sync(&ck1).unwrap();
        let ck2 = parse_ck(&ck2);
        assert!(responder.handle_clock_sync(&ck2).is_none());

        assert_eq!(initiator.clock_offset(), responder.clock_offset());
        assert_eq!(initiator.state(), SessionState::Connected);
        assert_eq!(responder.state(), SessionState::Connected);
    }

    fn parse_ck(packet: &[u8]) -> ClockSyncBody {
        match ControlPacket::parse(packet) {
            Ok(ControlPacket::ClockSync(body)) => {
                ClockSyncBody::new(body.sender_ssrc.get(), body.count, body.timestamps.map(|t| t.get()))
            }
            other => panic!("expected a clock sync, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_offset() {
        let mut session = session();
        session.complete_handshake("peer");
        let ck2 = ClockSyncBody::new(0x5566_7788, 2, [200, 1000, 300]);
        assert!(session.handle_clock_sync(&ck2).is_none());
        assert_eq!(session.clock_offset(), Some(-750));
    }

    #[test]
    fn test_frame_midi_before_handshake_is_dropped() {
        let mut session = session();
        assert_eq!(session.frame_midi(&[0x90, 0x3C, 0x40]).unwrap(), None);
    }

    #[test]
    fn test_frame_midi_increments_sequence() {
        let mut session = session();
        session.complete_handshake("peer");
        let first = session.frame_midi(&[0x90, 0x3C, 0x40]).unwrap().unwrap();
        let second = session.frame_midi(&[0x80, 0x3C, 0x00]).unwrap().unwrap();
        let first = MidiPacket::parse(&first).unwrap();
        let second = MidiPacket::parse(&second).unwrap();
        assert_eq!(second.sequence_number(), first.sequence_number().wrapping_add(1));
        assert_eq!(first.ssrc(), session.eid());
        assert_eq!(first.payload(), &[0x90, 0x3C, 0x40]);
    }

    #[test]
    fn test_frame_midi_rejects_long_events() {
        let mut session = session();
        session.complete_handshake("peer");
        let payload = [0u8; 17];
        assert_eq!(session.frame_midi(&payload), Err(SessionError::EventTooLarge(17)));
    }

    #[test]
    fn test_stale_detection() {
        let session = session();
        assert!(!session.is_stale(Duration::from_secs(30)));
        assert!(session.is_stale(Duration::ZERO));
    }
}
