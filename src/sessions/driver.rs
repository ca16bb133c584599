use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::peer_session::PeerSession;
use super::registry::SessionRegistry;
use super::tasks::Task;
use super::{MAX_DATAGRAM_SIZE, STALE_AFTER, SYNC_INTERVAL};
use crate::packets::control_packets::clock_sync_packet::ClockSyncBody;
use crate::packets::control_packets::control_packet::ControlPacket;
use crate::packets::control_packets::session_initiation_packet::SessionInitiationBody;
use crate::packets::midi_packets::midi_event::MidiEvent;
use crate::packets::midi_packets::midi_packet::MidiPacket;
use crate::packets::midi_packets::midi_stream;
use crate::packets::packet::RtpMidiPacket;
use crate::sequencer::SequencerLink;

/// Which of the two sockets a datagram arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortKind {
    Control,
    Midi,
}

/// Owns the two UDP sockets and every session. Everything here runs on the
/// single task driving [`Driver::run`]; the channels feeding it are the only
/// way in.
pub(super) struct Driver {
    name: String,
    local_ssrc: u32,
    control_socket: UdpSocket,
    midi_socket: UdpSocket,
    registry: SessionRegistry,
    tasks: mpsc::UnboundedReceiver<Task>,
    sequencer: SequencerLink,
    cancel: CancellationToken,
}

impl Driver {
    pub(super) async fn bind(
        port: u16,
        name: String,
        local_ssrc: u32,
        tasks: mpsc::UnboundedReceiver<Task>,
        sequencer: SequencerLink,
        cancel: CancellationToken,
    ) -> std::io::Result<Driver> {
        let control_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        let midi_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port + 1)).await?;
        info!("session {name} on control port {port}, data port {}", port + 1);
        Ok(Driver {
            name,
            local_ssrc,
            control_socket,
            midi_socket,
            registry: SessionRegistry::new(),
            tasks,
            sequencer,
            cancel,
        })
    }

    pub(super) async fn run(mut self) {
        let mut control_buf = [0u8; MAX_DATAGRAM_SIZE];
        let mut midi_buf = [0u8; MAX_DATAGRAM_SIZE];
        let mut sync_timer = time::interval(SYNC_INTERVAL);
        sync_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequencer_open = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.control_socket.recv_from(&mut control_buf) => match received {
                    Ok((amount, src)) => self.handle_datagram(PortKind::Control, &control_buf[..amount], src).await,
                    Err(e) => error!("control socket receive failed: {e}"),
                },
                received = self.midi_socket.recv_from(&mut midi_buf) => match received {
                    Ok((amount, src)) => self.handle_datagram(PortKind::Midi, &midi_buf[..amount], src).await,
                    Err(e) => error!("data socket receive failed: {e}"),
                },
                task = self.tasks.recv() => match task {
                    Some(task) => {
                        if let Err(e) = self.run_task(task).await {
                            error!("deferred task failed: {e:#}");
                        }
                    }
                    // Every producer handle is gone; treat it as a shutdown.
                    None => break,
                },
                event = self.sequencer.outbound.recv(), if sequencer_open => match event {
                    Some(event) => self.broadcast(event).await,
                    None => sequencer_open = false,
                },
                _ = sync_timer.tick() => self.sync_tick().await,
            }
        }

        self.shutdown().await;
    }

    #[instrument(skip_all, fields(port = ?kind, src = %src))]
    async fn handle_datagram(&mut self, kind: PortKind, datagram: &[u8], src: SocketAddr) {
        if datagram.is_empty() {
            trace!("empty datagram");
            return;
        }
        trace!("received {} bytes", datagram.len());
        match RtpMidiPacket::parse(datagram) {
            Ok(RtpMidiPacket::Control(command)) => self.handle_control(kind, command).await,
            Ok(RtpMidiPacket::Midi(packet)) => self.handle_midi(&packet),
            Err(e) => warn!("dropping datagram: {e}"),
        }
    }

    async fn handle_control(&mut self, kind: PortKind, command: ControlPacket<'_>) {
        match command {
            ControlPacket::Acceptance { body, name } => self.handle_acceptance(kind, body, name).await,
            ControlPacket::ClockSync(ck) => self.handle_clock_sync(ck).await,
            ControlPacket::Termination(body) => self.handle_termination(body),
            ControlPacket::Rejection(body) => {
                let token = body.initiator_token.get();
                match self.registry.remove(token) {
                    Some(session) => error!("[{token:08X}] {} rejected the invitation", session.remote_addr()),
                    None => warn!("[{token:08X}] rejection for an unknown endpoint"),
                }
            }
            ControlPacket::Invitation { body, name } => {
                // Initiator-only engine: inbound invitations are not taken up.
                info!("ignoring invitation from {name:?} (ssrc {:08X})", body.sender_ssrc.get());
            }
        }
    }

    /// An `OK` for one of our invitations: rebind the session from its
    /// initiator token to the remote SSRC and, on the control channel, open
    /// the first clock-sync exchange.
    async fn handle_acceptance(&mut self, kind: PortKind, body: &SessionInitiationBody, name: &str) {
        let token = body.initiator_token.get();
        let remote_ssrc = body.sender_ssrc.get();

        let Some(session) = self.registry.lookup(token) else {
            warn!("[{token:08X}] acceptance for an unknown endpoint");
            return;
        };
        if let Err(e) = session.validate_acknowledgment(token) {
            error!("[{token:08X}] {e}");
            self.registry.remove(token);
            return;
        }

        match self.registry.rebind(token, remote_ssrc) {
            Ok(session) => {
                session.complete_handshake(name);
                if kind == PortKind::Control {
                    let sync = session.begin_sync();
                    let addr = session.remote_addr();
                    if let Err(e) = self.control_socket.send_to(&sync, addr).await {
                        warn!("failed to send clock sync to {addr}: {e}");
                    }
                }
            }
            Err(e) => error!("[{token:08X}] cannot rebind endpoint: {e}"),
        }
    }

    async fn handle_clock_sync(&mut self, ck: &ClockSyncBody) {
        let eid = ck.sender_ssrc.get();
        let Some(session) = self.registry.lookup_mut(eid) else {
            warn!("[{eid:08X}] clock sync for an unknown endpoint");
            return;
        };
        if let Some(reply) = session.handle_clock_sync(ck) {
            let addr = session.remote_addr();
            if let Err(e) = self.control_socket.send_to(&reply, addr).await {
                warn!("failed to send clock sync to {addr}: {e}");
            }
        }
    }

    fn handle_termination(&mut self, body: &SessionInitiationBody) {
        // A goodbye can arrive before or after the rebind; try both ids.
        let ssrc = body.sender_ssrc.get();
        let token = body.initiator_token.get();
        let eid = [ssrc, token].into_iter().find(|&id| self.registry.contains(id));
        match eid {
            Some(eid) => {
                if let Some(session) = self.registry.remove(eid) {
                    info!("[{eid:08X}] {} said goodbye", session.remote_addr());
                }
            }
            None => warn!("[{ssrc:08X}] goodbye for an unknown endpoint"),
        }
    }

    fn handle_midi(&mut self, packet: &MidiPacket<'_>) {
        let eid = packet.ssrc();
        let Some(session) = self.registry.lookup(eid) else {
            // TODO: answer with a goodbye so a forgotten peer stops sending.
            warn!("[{eid:08X}] MIDI from an unknown endpoint");
            return;
        };
        for event in midi_stream::decode(packet.payload()) {
            debug!("[{eid:08X}] network MIDI from {}: {event:?}", session.name().unwrap_or("?"));
            self.sequencer.deliver(event);
        }
    }

    async fn run_task(&mut self, task: Task) -> anyhow::Result<()> {
        match task {
            Task::Connect(addr) => self.connect_to(addr).await,
            Task::Disconnect(addr) => self.disconnect_from(addr).await,
        }
    }

    /// Opens an outbound session: one invitation per channel, then the
    /// session is registered under its initiator token.
    async fn connect_to(&mut self, addr: SocketAddr) -> anyhow::Result<()> {
        if self.registry.find_by_addr(addr).is_some() {
            info!("already connected to {addr}, ignoring");
            return Ok(());
        }
        let mut token = rand::random::<u32>();
        while self.registry.contains(token) {
            token = rand::random();
        }
        let mut session = PeerSession::new(addr, token);
        let invitation = session.invitation(self.local_ssrc, &self.name);
        info!("[{token:08X}] connecting to {addr}");
        self.control_socket.send_to(&invitation, addr).await?;
        self.midi_socket.send_to(&invitation, session.data_addr()).await?;
        self.registry.register(session)?;
        Ok(())
    }

    async fn disconnect_from(&mut self, addr: SocketAddr) -> anyhow::Result<()> {
        let Some(eid) = self.registry.find_by_addr(addr) else {
            debug!("no session for {addr}");
            return Ok(());
        };
        if let Some(session) = self.registry.remove(eid) {
            info!("[{eid:08X}] disconnecting from {addr}");
            let goodbye = session.termination(self.local_ssrc);
            self.control_socket.send_to(&goodbye, session.remote_addr()).await?;
        }
        Ok(())
    }

    /// Broadcasts one sequencer event to every session past its handshake.
    async fn broadcast(&mut self, event: MidiEvent) {
        let payload = event.to_bytes();
        for session in self.registry.sessions_mut() {
            match session.frame_midi(&payload) {
                Ok(Some(datagram)) => {
                    let addr = session.data_addr();
                    if let Err(e) = self.midi_socket.send_to(&datagram, addr).await {
                        warn!("failed to send MIDI to {addr}: {e}");
                    } else {
                        trace!("[{:08X}] sent {} MIDI bytes", session.eid(), datagram.len());
                    }
                }
                Ok(None) => trace!("[{:08X}] not yet connected, event dropped", session.eid()),
                Err(e) => error!("[{:08X}] {e}", session.eid()),
            }
        }
    }

    /// Periodic housekeeping: reap silent sessions, then open a fresh sync
    /// round on every established one.
    async fn sync_tick(&mut self) {
        let stale: Vec<u32> = self
            .registry
            .sessions()
            .filter(|session| session.is_stale(STALE_AFTER))
            .map(PeerSession::eid)
            .collect();
        for eid in stale {
            if let Some(session) = self.registry.remove(eid) {
                warn!("[{eid:08X}] no sync activity from {}, dropping session", session.remote_addr());
                let goodbye = session.termination(self.local_ssrc);
                if let Err(e) = self.control_socket.send_to(&goodbye, session.remote_addr()).await {
                    warn!("failed to send goodbye to {}: {e}", session.remote_addr());
                }
            }
        }

        for session in self.registry.sessions_mut() {
            if !session.is_established() {
                continue;
            }
            let sync = session.begin_sync();
            let addr = session.remote_addr();
            if let Err(e) = self.control_socket.send_to(&sync, addr).await {
                warn!("failed to send clock sync to {addr}: {e}");
            }
        }
    }

    /// Says goodbye to every peer before the loop exits.
    async fn shutdown(&mut self) {
        info!("shutting down, closing {} session(s)", self.registry.len());
        let sessions: Vec<PeerSession> = self.registry.drain().collect();
        for session in sessions {
            let goodbye = session.termination(self.local_ssrc);
            if let Err(e) = self.control_socket.send_to(&goodbye, session.remote_addr()).await {
                warn!("failed to send goodbye to {}: {e}", session.remote_addr());
            }
        }
    }
}
