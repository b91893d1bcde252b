//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while parsing a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Unexpected end of data")]
    UnexpectedEof,

    #[error("Packet {opcode:#04x} has {extra} trailing bytes")]
    TrailingBytes { opcode: u8, extra: usize },

    #[error("Invalid join kind: {0}")]
    InvalidJoinKind(u8),

    #[error("String field is not valid UTF-8")]
    InvalidUtf8,

    #[error("String field exceeds {max} bytes")]
    StringTooLong { max: usize },

    #[error("Non-finite coordinate in packet {0:#04x}")]
    NonFinite(u8),
}
