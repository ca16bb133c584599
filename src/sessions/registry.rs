use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;

use thiserror::Error;

use super::peer_session::PeerSession;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("endpoint identifier {0:#010x} is already registered")]
    Duplicate(u32),
    #[error("unknown endpoint identifier {0:#010x}")]
    Unknown(u32),
}

/// Maps endpoint identifiers to live sessions and demultiplexes inbound
/// datagrams. A session is reachable under exactly one identifier at a time.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<u32, PeerSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry { sessions: HashMap::new() }
    }

    pub fn contains(&self, eid: u32) -> bool {
        self.sessions.contains_key(&eid)
    }

    pub fn register(&mut self, session: PeerSession) -> Result<(), RegistryError> {
        match self.sessions.entry(session.eid()) {
            Entry::Occupied(entry) => Err(RegistryError::Duplicate(*entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    /// Atomically renames a session once the remote SSRC is learned. On
    /// failure the session stays reachable under `old`.
    pub fn rebind(&mut self, old: u32, new: u32) -> Result<&mut PeerSession, RegistryError> {
        if old == new {
            return self.sessions.get_mut(&old).ok_or(RegistryError::Unknown(old));
        }
        if self.sessions.contains_key(&new) {
            return Err(RegistryError::Duplicate(new));
        }
        let mut session = self.sessions.remove(&old).ok_or(RegistryError::Unknown(old))?;
        session.set_eid(new);
        Ok(self.sessions.entry(new).or_insert(session))
    }

    pub fn lookup(&self, eid: u32) -> Option<&PeerSession> {
        self.sessions.get(&eid)
    }

    pub fn lookup_mut(&mut self, eid: u32) -> Option<&mut PeerSession> {
        self.sessions.get_mut(&eid)
    }

    pub fn remove(&mut self, eid: u32) -> Option<PeerSession> {
        self.sessions.remove(&eid)
    }

    /// Identifier of the session pointed at this remote control address, if
    /// one is live.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.sessions.values().find(|s| s.remote_addr() == addr).map(PeerSession::eid)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &PeerSession> {
        self.sessions.values()
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut PeerSession> {
        self.sessions.values_mut()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = PeerSession> + '_ {
        self.sessions.drain().map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(addr: &str, token: u32) -> PeerSession {
        PeerSession::new(addr.parse().unwrap(), token)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SessionRegistry::new();
        registry.register(session("10.0.0.1:5004", 1)).unwrap();
        assert!(registry.contains(1));
        assert_eq!(registry.lookup(1).unwrap().eid(), 1);
        assert!(registry.lookup(2).is_none());
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = SessionRegistry::new();
        registry.register(session("10.0.0.1:5004", 1)).unwrap();
        let error = registry.register(session("10.0.0.2:5004", 1)).unwrap_err();
        assert_eq!(error, RegistryError::Duplicate(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rebind_moves_the_key() {
        let mut registry = SessionRegistry::new();
        registry.register(session("10.0.0.1:5004", 1)).unwrap();
        let rebound = registry.rebind(1, 0x5566_7788).unwrap();
        assert_eq!(rebound.eid(), 0x55667788);
        assert!(!registry.contains(1));
        assert_eq!(registry.lookup(0x5566_7788).unwrap().remote_addr(), "10.0.0.1:5004".parse().unwrap());
    }

    #[test]
    fn test_rebind_unknown() {
        let mut registry = SessionRegistry::new();
        assert_eq!(registry.rebind(1, 2).unwrap_err(), RegistryError::Unknown(1));
    }

    #[test]
    fn test_rebind_collision_keeps_the_old_key() {
        let mut registry = SessionRegistry::new();
        registry.register(session("10.0.0.1:5004", 1)).unwrap();
        registry.register(session("10.0.0.2:5004", 2)).unwrap();
        assert_eq!(registry.rebind(1, 2).unwrap_err(), RegistryError::Duplicate(2));
        assert_eq!(registry.lookup(1).unwrap().eid(), 1);
        assert_eq!(registry.lookup(2).unwrap().remote_addr(), "10.0.0.2:5004".parse().unwrap());
    }

    #[test]
    fn test_remove_releases_the_identifier() {
        let mut registry = SessionRegistry::new();
        registry.register(session("10.0.0.1:5004", 1)).unwrap();
        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_by_addr() {
        let mut registry = SessionRegistry::new();
        registry.register(session("10.0.0.1:5004", 1)).unwrap();
        assert_eq!(registry.find_by_addr("10.0.0.1:5004".parse().unwrap()), Some(1));
        assert_eq!(registry.find_by_addr("10.0.0.9:5004".parse().unwrap()), None);
    }
}
