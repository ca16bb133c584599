use thiserror::Error;

/// Errors raised while parsing an inbound datagram. Every one of these is
/// recovered locally: the datagram is logged and dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("not enough data ({0} bytes)")]
    NotEnoughData(usize),
    #[error("session name is missing its terminator")]
    UnterminatedName,
    #[error("session name is not valid UTF-8")]
    InvalidName,
    #[error("unknown control command {0:#06x}")]
    UnknownCommand(u16),
}
