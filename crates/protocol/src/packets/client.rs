//! Client -> Server packet parsing.

use super::ClientOpcode;
use crate::{BinaryReader, BinaryWriter, MAX_STRING_LEN, Position, ProtocolError};

/// How a connection wants to take part in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Player = 0,
    Spectator = 1,
}

/// Parsed client packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    /// Join (0x00). `user_id` links the session to an external account.
    Join {
        kind: JoinKind,
        name: String,
        user_id: Option<String>,
    },
    /// Target offset from the player's centre (0x10).
    TargetUpdate { target: Position },
    /// Split (0x11).
    Split,
    /// Fire mass (0x15).
    FireMass,
    /// Respawn (0x20).
    Respawn,
    /// Screen size (0x21).
    Viewport { width: u16, height: u16 },
    /// Ping (0x30).
    Ping,
    /// Chat message (0x63).
    Chat { message: String },
    /// Admin login (0x70).
    AdminAuth { password: String },
    /// Admin kick (0x71).
    AdminKick { name: String, reason: String },
    /// Stats request (0xFE).
    Stats,
}

impl ClientPacket {
    /// Parse a client packet from raw bytes.
    ///
    /// The whole frame must be consumed; trailing bytes are an error.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = BinaryReader::new(data.to_vec());
        let raw_opcode = reader.get_u8()?;
        let opcode = ClientOpcode::try_from(raw_opcode)?;

        let packet = match opcode {
            ClientOpcode::Join => {
                let kind = match reader.get_u8()? {
                    0 => JoinKind::Player,
                    1 => JoinKind::Spectator,
                    other => return Err(ProtocolError::InvalidJoinKind(other)),
                };
                let name = reader.get_string(MAX_STRING_LEN)?;
                let user_id = reader.get_string(MAX_STRING_LEN)?;
                ClientPacket::Join {
                    kind,
                    name,
                    user_id: (!user_id.is_empty()).then_some(user_id),
                }
            }
            ClientOpcode::Target => {
                let x = reader.get_f32()?;
                let y = reader.get_f32()?;
                if !x.is_finite() || !y.is_finite() {
                    return Err(ProtocolError::NonFinite(raw_opcode));
                }
                ClientPacket::TargetUpdate {
                    target: Position::new(x, y),
                }
            }
            ClientOpcode::Split => ClientPacket::Split,
            ClientOpcode::FireMass => ClientPacket::FireMass,
            ClientOpcode::Respawn => ClientPacket::Respawn,
            ClientOpcode::Viewport => {
                let width = reader.get_u16()?;
                let height = reader.get_u16()?;
                ClientPacket::Viewport { width, height }
            }
            ClientOpcode::Ping => ClientPacket::Ping,
            ClientOpcode::Chat => ClientPacket::Chat {
                message: reader.get_string(MAX_STRING_LEN)?,
            },
            ClientOpcode::AdminAuth => ClientPacket::AdminAuth {
                password: reader.get_string(MAX_STRING_LEN)?,
            },
            ClientOpcode::AdminKick => {
                let name = reader.get_string(MAX_STRING_LEN)?;
                let reason = reader.get_string(MAX_STRING_LEN)?;
                ClientPacket::AdminKick { name, reason }
            }
            ClientOpcode::Stats => ClientPacket::Stats,
        };

        if reader.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes {
                opcode: raw_opcode,
                extra: reader.remaining(),
            });
        }
        Ok(packet)
    }

    /// Encode the packet the way a client would send it.
    pub fn encode(&self) -> BinaryWriter {
        let mut w = BinaryWriter::with_capacity(16);
        match self {
            ClientPacket::Join {
                kind,
                name,
                user_id,
            } => {
                w.put_u8(ClientOpcode::Join as u8);
                w.put_u8(*kind as u8);
                w.put_string(name);
                w.put_string(user_id.as_deref().unwrap_or(""));
            }
            ClientPacket::TargetUpdate { target } => {
                w.put_u8(ClientOpcode::Target as u8);
                w.put_f32(target.x);
                w.put_f32(target.y);
            }
            ClientPacket::Split => w.put_u8(ClientOpcode::Split as u8),
            ClientPacket::FireMass => w.put_u8(ClientOpcode::FireMass as u8),
            ClientPacket::Respawn => w.put_u8(ClientOpcode::Respawn as u8),
            ClientPacket::Viewport { width, height } => {
                w.put_u8(ClientOpcode::Viewport as u8);
                w.put_u16(*width);
                w.put_u16(*height);
            }
            ClientPacket::Ping => w.put_u8(ClientOpcode::Ping as u8),
            ClientPacket::Chat { message } => {
                w.put_u8(ClientOpcode::Chat as u8);
                w.put_string(message);
            }
            ClientPacket::AdminAuth { password } => {
                w.put_u8(ClientOpcode::AdminAuth as u8);
                w.put_string(password);
            }
            ClientPacket::AdminKick { name, reason } => {
                w.put_u8(ClientOpcode::AdminKick as u8);
                w.put_string(name);
                w.put_string(reason);
            }
            ClientPacket::Stats => w.put_u8(ClientOpcode::Stats as u8),
        }
        w
    }
}
