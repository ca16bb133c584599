use std::net::SocketAddr;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::driver::Driver;
use super::tasks::{Task, TaskQueue};
use crate::sequencer::{self, SequencerHandle};

/// Default AppleMIDI control port; the data socket binds one above it.
pub const DEFAULT_CONTROL_PORT: u16 = 10008;

/// Handle to a running bridge. Everything of consequence happens on the
/// driver task; this handle only feeds its queues.
pub struct RtpMidiBridge {
    tasks: TaskQueue,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

impl RtpMidiBridge {
    /// Binds the control and data sockets and spawns the event loop. The
    /// returned [`SequencerHandle`] is the sequencer collaborator's end of
    /// the bridge.
    pub async fn start(port: u16, name: &str) -> std::io::Result<(RtpMidiBridge, SequencerHandle)> {
        let local_ssrc = rand::random::<u32>();
        let (tasks, task_receiver) = TaskQueue::channel();
        let (link, handle) = sequencer::link();
        let cancel = CancellationToken::new();
        let driver = Driver::bind(port, name.to_owned(), local_ssrc, task_receiver, link, cancel.clone()).await?;
        let driver = tokio::spawn(driver.run());
        Ok((RtpMidiBridge { tasks, cancel, driver }, handle))
    }

    /// Producer handle for collaborators that inject work from other threads.
    pub fn tasks(&self) -> TaskQueue {
        self.tasks.clone()
    }

    /// Requests an outbound session to a remote control address.
    pub fn connect_to(&self, addr: SocketAddr) {
        self.tasks.push(Task::Connect(addr));
    }

    /// Tears down the session for a remote control address, if any.
    pub fn disconnect_from(&self, addr: SocketAddr) {
        self.tasks.push(Task::Disconnect(addr));
    }

    /// Stops the loop and waits until every session has been told goodbye.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.driver.await;
    }
}
