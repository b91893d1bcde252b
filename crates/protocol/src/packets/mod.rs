//! Packet definitions for the cellarena protocol.
//!
//! This module contains both client->server and server->client packet types.

mod client;
mod server;

pub use client::*;
pub use server::*;

use crate::ProtocolError;

/// Opcodes for client -> server packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOpcode {
    /// Join as a player or spectator.
    Join = 0x00,
    /// Target update (doubles as the heartbeat).
    Target = 0x10,
    /// Split every eligible cell.
    Split = 0x11,
    /// Fire a mass pellet from every eligible cell.
    FireMass = 0x15,
    /// Respawn after death.
    Respawn = 0x20,
    /// Screen size report.
    Viewport = 0x21,
    /// Latency probe.
    Ping = 0x30,
    /// Chat message.
    Chat = 0x63,
    /// Admin login.
    AdminAuth = 0x70,
    /// Admin kick.
    AdminKick = 0x71,
    /// Server statistics request.
    Stats = 0xFE,
}

impl TryFrom<u8> for ClientOpcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Self::Join,
            0x10 => Self::Target,
            0x11 => Self::Split,
            0x15 => Self::FireMass,
            0x20 => Self::Respawn,
            0x21 => Self::Viewport,
            0x30 => Self::Ping,
            0x63 => Self::Chat,
            0x70 => Self::AdminAuth,
            0x71 => Self::AdminKick,
            0xFE => Self::Stats,
            other => return Err(ProtocolError::InvalidOpcode(other)),
        })
    }
}

/// Opcodes for server -> client packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOpcode {
    /// Initial player state and world size.
    Welcome = 0x01,
    /// Per-tick world view.
    StateSnapshot = 0x10,
    /// Ordered leaderboard.
    Leaderboard = 0x31,
    /// Reply to a ping.
    Pong = 0x32,
    /// A player joined.
    PlayerJoined = 0x40,
    /// A player left.
    PlayerLeft = 0x41,
    /// A player lost their last cell.
    PlayerEaten = 0x42,
    /// The receiving player died.
    Died = 0x43,
    /// The receiving connection is being closed.
    Kicked = 0x44,
    /// Spawn refused until a deposit is made.
    DepositRequired = 0x45,
    /// Free-form server notice.
    ServerMessage = 0x46,
    /// Relayed chat line.
    ChatMessage = 0x63,
    /// Server statistics.
    ServerStat = 0xFE,
}
