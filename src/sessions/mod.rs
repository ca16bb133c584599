use std::time::Duration;

pub mod bridge;
mod driver;
pub mod error;
pub mod peer_session;
pub mod registry;
pub mod tasks;

/// Largest datagram the driver reads in one `recv_from`.
const MAX_DATAGRAM_SIZE: usize = 1500;

/// How often established sessions get a fresh clock-sync exchange.
const SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Sessions with no sync activity for this long are told goodbye.
const STALE_AFTER: Duration = Duration::from_secs(30);
