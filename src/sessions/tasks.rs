use std::net::SocketAddr;

use tokio::sync::mpsc;
use tracing::warn;

/// Deferred work executed on the event-loop task.
///
/// Producers on other threads (service discovery, the CLI) never touch
/// session state directly; they push a task and the driver runs it on its own
/// thread. The channel doubles as the readiness signal: pushing wakes the
/// loop, and the push happens before the wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Open a session to a remote control address.
    Connect(SocketAddr),
    /// Say goodbye to whatever session points at this control address.
    Disconnect(SocketAddr),
}

/// Cloneable producer handle for the driver's task queue.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    pub(crate) fn channel() -> (TaskQueue, mpsc::UnboundedReceiver<Task>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (TaskQueue { sender }, receiver)
    }

    /// Enqueues work for the event loop; a no-op once the loop has stopped.
    pub fn push(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("task queue closed, dropping {task:?}");
        }
    }
}
