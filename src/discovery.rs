//! mDNS discovery collaborator: advertises the local session and feeds
//! `_apple-midi._udp` neighbours into the core through the task queue.
//!
//! Browsing runs on a plain producer thread. It never touches session state;
//! every change becomes a task executed on the event-loop thread.

use std::collections::HashMap;
use std::net::SocketAddr;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, info, warn};

use crate::sessions::tasks::{Task, TaskQueue};

const SERVICE_TYPE: &str = "_apple-midi._udp.local.";

/// Registers the local session with the mDNS daemon.
pub fn advertise(instance_name: &str, port: u16) -> Result<ServiceDaemon, mdns_sd::Error> {
    let mdns = ServiceDaemon::new()?;
    let ip = local_ip_address::local_ip().map(|ip| ip.to_string()).unwrap_or_default();
    let raw_hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".into());
    let host = format!("{raw_hostname}.local.");
    let service = ServiceInfo::new(SERVICE_TYPE, instance_name, &host, ip, port, None)?;
    mdns.register(service)?;
    Ok(mdns)
}

/// Browses for AppleMIDI neighbours, connecting as they appear and saying
/// goodbye as they go.
pub fn browse(tasks: TaskQueue) -> Result<ServiceDaemon, mdns_sd::Error> {
    let mdns = ServiceDaemon::new()?;
    let receiver = mdns.browse(SERVICE_TYPE)?;
    std::thread::spawn(move || {
        let mut known: HashMap<String, Vec<SocketAddr>> = HashMap::new();
        while let Ok(event) = receiver.recv() {
            match event {
                ServiceEvent::ServiceResolved(resolved) => {
                    let addrs: Vec<SocketAddr> = resolved
                        .get_addresses()
                        .iter()
                        .map(|ip| SocketAddr::new((*ip).into(), resolved.get_port()))
                        .collect();
                    info!("service added: {} {addrs:?}", resolved.get_fullname());
                    for addr in &addrs {
                        tasks.push(Task::Connect(*addr));
                    }
                    known.insert(resolved.get_fullname().to_string(), addrs);
                }
                ServiceEvent::ServiceRemoved(_, fullname) => {
                    if let Some(addrs) = known.remove(&fullname) {
                        info!("service removed: {fullname}");
                        for addr in addrs {
                            tasks.push(Task::Disconnect(addr));
                        }
                    }
                }
                other => debug!("mdns event: {other:?}"),
            }
        }
        warn!("mdns browse channel closed");
    });
    Ok(mdns)
}
