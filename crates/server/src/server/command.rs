//! Inbound events and the per-tick command queue.
//!
//! The gateway never touches the world. It turns frames into
//! [`Inbound`] events on a single channel; the game loop drains that
//! channel at the start of every tick.

use super::client::Outbox;
use protocol::packets::{ClientPacket, JoinKind};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::time::Instant;

/// Longest chat message relayed, in characters.
pub const MAX_CHAT_LEN: usize = 35;
/// Name used when a player joins without one.
pub const DEFAULT_NAME: &str = "unnamed cell";

/// Something that happened outside the tick.
#[derive(Debug)]
pub enum Inbound {
    /// A WebSocket handshake completed.
    Connected {
        id: u32,
        addr: Option<SocketAddr>,
        outbox: Outbox,
    },
    /// A well-formed frame arrived.
    Packet {
        id: u32,
        packet: ClientPacket,
        received_at: Instant,
    },
    /// The socket closed.
    Disconnected { id: u32 },
    /// The wallet side confirmed a deposit for an account.
    DepositConfirmed { user_id: String },
}

/// A queued command, applied during the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join {
        kind: JoinKind,
        name: String,
        user_id: Option<String>,
    },
    Split,
    FireMass,
    Respawn,
    Chat { message: String },
    AdminAuth { password: String },
    AdminKick { name: String, reason: String },
    Ping,
    Stats,
}

impl Command {
    /// Map a frame onto a queued command. Target and viewport updates
    /// are recorded on arrival instead and map to `None`.
    pub fn from_packet(packet: ClientPacket) -> Option<Self> {
        Some(match packet {
            ClientPacket::Join { kind, name, user_id } => Command::Join { kind, name, user_id },
            ClientPacket::Split => Command::Split,
            ClientPacket::FireMass => Command::FireMass,
            ClientPacket::Respawn => Command::Respawn,
            ClientPacket::Chat { message } => Command::Chat { message },
            ClientPacket::AdminAuth { password } => Command::AdminAuth { password },
            ClientPacket::AdminKick { name, reason } => Command::AdminKick { name, reason },
            ClientPacket::Ping => Command::Ping,
            ClientPacket::Stats => Command::Stats,
            ClientPacket::TargetUpdate { .. } | ClientPacket::Viewport { .. } => return None,
        })
    }
}

/// Why a command was ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("session is not joined")]
    NotJoined,
    #[error("session already joined")]
    AlreadyJoined,
    #[error("spectators cannot do that")]
    Spectator,
    #[error("player has no cells")]
    NotAlive,
    #[error("player is still alive")]
    StillAlive,
    #[error("too many commands pending")]
    QueueFull,
    #[error("invalid name")]
    InvalidName,
    #[error("user id already connected")]
    DuplicateUser,
    #[error("unknown session {0}")]
    UnknownSession(u32),
}

/// Check a join name. ASCII letters, digits and underscores only; empty names
/// get the default.
pub fn validate_name(name: &str, max_len: usize) -> Result<String, CommandError> {
    if name.is_empty() {
        return Ok(DEFAULT_NAME.to_string());
    }
    let valid = name.chars().count() <= max_len && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(CommandError::InvalidName)
    }
}

/// Strip `<...>` tags and cut the message to [`MAX_CHAT_LEN`] characters.
/// Returns `None` if nothing printable is left.
pub fn sanitize_chat(message: &str) -> Option<String> {
    let mut out = String::with_capacity(message.len());
    let mut in_tag = false;
    for c in message.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => out.push(c),
        }
    }
    let out: String = out.trim().chars().take(MAX_CHAT_LEN).collect();
    (!out.is_empty()).then_some(out)
}
