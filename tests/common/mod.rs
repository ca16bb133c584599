use std::net::UdpSocket;

/// Finds a control/data port pair that is currently free.
pub fn find_consecutive_ports() -> (u16, u16) {
    loop {
        let control = UdpSocket::bind(("0.0.0.0", 0)).expect("failed to bind probe socket");
        let port = control.local_addr().expect("probe socket has no address").port();
        if port == u16::MAX {
            continue;
        }
        if UdpSocket::bind(("0.0.0.0", port + 1)).is_ok() {
            return (port, port + 1);
        }
    }
}

/// Binds and keeps a control/data socket pair for a mock peer.
pub fn bind_udp_pair() -> (UdpSocket, UdpSocket) {
    loop {
        let control = UdpSocket::bind(("127.0.0.1", 0)).expect("failed to bind peer control socket");
        let port = control.local_addr().expect("peer socket has no address").port();
        if port == u16::MAX {
            continue;
        }
        if let Ok(data) = UdpSocket::bind(("127.0.0.1", port + 1)) {
            return (control, data);
        }
    }
}
