//! Server -> Client packet building.

use super::ServerOpcode;
use crate::{BinaryWriter, Position};

/// One circle as the client sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRecord {
    pub id: u32,
    pub position: Position,
    pub mass: f32,
    pub radius: f32,
}

/// Another player visible in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: u32,
    pub name: String,
    pub cells: Vec<CellRecord>,
}

/// A leaderboard entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// Connection id.
    pub id: u32,
    pub name: String,
    /// Aggregate mass.
    pub mass: f32,
}

/// Everything one client receives in a single tick.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    /// The receiver's own cells, empty for spectators.
    pub own: Vec<CellRecord>,
    pub players: Vec<PlayerRecord>,
    pub food: Vec<CellRecord>,
    pub viruses: Vec<CellRecord>,
    pub ejected: Vec<CellRecord>,
}

/// Server statistics reply.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServerStats {
    pub players: u32,
    pub spectators: u32,
    pub food: u32,
    pub viruses: u32,
    pub ejected: u32,
    pub tick: u64,
    pub avg_tick_ms: f32,
}

fn put_cell(w: &mut BinaryWriter, cell: &CellRecord) {
    w.put_u32(cell.id);
    w.put_f32(cell.position.x);
    w.put_f32(cell.position.y);
    w.put_f32(cell.mass);
    w.put_f32(cell.radius);
}

fn put_cells(w: &mut BinaryWriter, cells: &[CellRecord]) {
    w.put_u16(cells.len().min(u16::MAX as usize) as u16);
    for cell in cells.iter().take(u16::MAX as usize) {
        put_cell(w, cell);
    }
}

fn put_cell_list(w: &mut BinaryWriter, cells: &[CellRecord]) {
    w.put_u32(cells.len() as u32);
    for cell in cells {
        put_cell(w, cell);
    }
}

fn text_packet(opcode: ServerOpcode, text: &str) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(2 + text.len());
    w.put_u8(opcode as u8);
    w.put_string(text);
    w
}

fn empty_packet(opcode: ServerOpcode) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(1);
    w.put_u8(opcode as u8);
    w
}

/// Build a Welcome packet (0x01).
pub fn build_welcome(player_id: u32, world_size: Position, cells: &[CellRecord]) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(15 + cells.len() * 20);
    w.put_u8(ServerOpcode::Welcome as u8);
    w.put_u32(player_id);
    w.put_f32(world_size.x);
    w.put_f32(world_size.y);
    put_cells(&mut w, cells);
    w
}

/// Build a StateSnapshot packet (0x10).
///
/// Layout: own cells (u16 count), players (u16 count, each with id,
/// name and u16 cell list), then food, viruses and ejected mass as
/// u32-counted cell lists.
pub fn build_state_snapshot(snapshot: &StateSnapshot) -> BinaryWriter {
    let cells = snapshot.own.len()
        + snapshot.food.len()
        + snapshot.viruses.len()
        + snapshot.ejected.len()
        + snapshot.players.iter().map(|p| p.cells.len()).sum::<usize>();
    let mut w = BinaryWriter::with_capacity(16 + cells * 20);
    w.put_u8(ServerOpcode::StateSnapshot as u8);
    put_cells(&mut w, &snapshot.own);
    w.put_u16(snapshot.players.len().min(u16::MAX as usize) as u16);
    for player in snapshot.players.iter().take(u16::MAX as usize) {
        w.put_u32(player.id);
        w.put_string(&player.name);
        put_cells(&mut w, &player.cells);
    }
    put_cell_list(&mut w, &snapshot.food);
    put_cell_list(&mut w, &snapshot.viruses);
    put_cell_list(&mut w, &snapshot.ejected);
    w
}

/// Build a Leaderboard packet (0x31).
pub fn build_leaderboard(entries: &[LeaderboardEntry]) -> BinaryWriter {
    let mut w = BinaryWriter::new();
    w.put_u8(ServerOpcode::Leaderboard as u8);
    w.put_u32(entries.len() as u32);
    for entry in entries {
        w.put_u32(entry.id);
        w.put_string(&entry.name);
        w.put_f32(entry.mass);
    }
    w
}

/// Build a Pong packet (0x32).
pub fn build_pong() -> BinaryWriter {
    empty_packet(ServerOpcode::Pong)
}

/// Build a PlayerJoined notice (0x40).
pub fn build_player_joined(name: &str) -> BinaryWriter {
    text_packet(ServerOpcode::PlayerJoined, name)
}

/// Build a PlayerLeft notice (0x41).
pub fn build_player_left(name: &str) -> BinaryWriter {
    text_packet(ServerOpcode::PlayerLeft, name)
}

/// Build a PlayerEaten notice (0x42).
pub fn build_player_eaten(victim: &str, eater: &str) -> BinaryWriter {
    let mut w = text_packet(ServerOpcode::PlayerEaten, victim);
    w.put_string(eater);
    w
}

/// Build a Died packet (0x43).
pub fn build_died() -> BinaryWriter {
    empty_packet(ServerOpcode::Died)
}

/// Build a Kicked packet (0x44).
pub fn build_kicked(reason: &str) -> BinaryWriter {
    text_packet(ServerOpcode::Kicked, reason)
}

/// Build a DepositRequired packet (0x45).
pub fn build_deposit_required(message: &str) -> BinaryWriter {
    text_packet(ServerOpcode::DepositRequired, message)
}

/// Build a ServerMessage packet (0x46).
pub fn build_server_message(text: &str) -> BinaryWriter {
    text_packet(ServerOpcode::ServerMessage, text)
}

/// Build a ChatMessage packet (0x63).
pub fn build_chat_message(sender: &str, message: &str) -> BinaryWriter {
    let mut w = text_packet(ServerOpcode::ChatMessage, sender);
    w.put_string(message);
    w
}

/// Build a ServerStat packet (0xFE).
pub fn build_server_stat(stats: &ServerStats) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(33);
    w.put_u8(ServerOpcode::ServerStat as u8);
    w.put_u32(stats.players);
    w.put_u32(stats.spectators);
    w.put_u32(stats.food);
    w.put_u32(stats.viruses);
    w.put_u32(stats.ejected);
    w.put_u64(stats.tick);
    w.put_f32(stats.avg_tick_ms);
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryReader, MAX_STRING_LEN};

    fn cell(id: u32) -> CellRecord {
        CellRecord {
            id,
            position: Position::new(1.0, 2.0),
            mass: 10.0,
            radius: 23.0,
        }
    }

    #[test]
    fn test_welcome_layout() {
        let bytes = build_welcome(7, Position::new(5000.0, 4000.0), &[cell(3)]).finish();
        let mut r = BinaryReader::new(bytes);
        assert_eq!(r.get_u8().unwrap(), 0x01);
        assert_eq!(r.get_u32().unwrap(), 7);
        assert_eq!(r.get_f32().unwrap(), 5000.0);
        assert_eq!(r.get_f32().unwrap(), 4000.0);
        assert_eq!(r.get_u16().unwrap(), 1);
        assert_eq!(r.get_u32().unwrap(), 3);
        assert_eq!(r.remaining(), 16);
    }

    #[test]
    fn test_snapshot_sections_in_order() {
        let snapshot = StateSnapshot {
            own: vec![cell(1)],
            players: vec![PlayerRecord {
                id: 9,
                name: "eve".into(),
                cells: vec![cell(2), cell(4)],
            }],
            food: vec![cell(5), cell(6), cell(8)],
            viruses: vec![],
            ejected: vec![cell(10)],
        };
        let mut r = BinaryReader::new(build_state_snapshot(&snapshot).finish());
        assert_eq!(r.get_u8().unwrap(), 0x10);
        assert_eq!(r.get_u16().unwrap(), 1);
        assert_eq!(r.get_u32().unwrap(), 1);
        for _ in 0..4 {
            r.get_f32().unwrap();
        }
        assert_eq!(r.get_u16().unwrap(), 1);
        assert_eq!(r.get_u32().unwrap(), 9);
        assert_eq!(r.get_string(MAX_STRING_LEN).unwrap(), "eve");
        assert_eq!(r.get_u16().unwrap(), 2);
        for _ in 0..2 {
            r.get_u32().unwrap();
            for _ in 0..4 {
                r.get_f32().unwrap();
            }
        }
        assert_eq!(r.get_u32().unwrap(), 3);
        for _ in 0..3 {
            r.get_u32().unwrap();
            for _ in 0..4 {
                r.get_f32().unwrap();
            }
        }
        assert_eq!(r.get_u32().unwrap(), 0);
        assert_eq!(r.get_u32().unwrap(), 1);
        assert_eq!(r.get_u32().unwrap(), 10);
    }

    #[test]
    fn test_leaderboard_entries() {
        let entries = vec![
            LeaderboardEntry { id: 2, name: "a".into(), mass: 50.0 },
            LeaderboardEntry { id: 1, name: "b".into(), mass: 20.0 },
        ];
        let mut r = BinaryReader::new(build_leaderboard(&entries).finish());
        assert_eq!(r.get_u8().unwrap(), 0x31);
        assert_eq!(r.get_u32().unwrap(), 2);
        assert_eq!(r.get_u32().unwrap(), 2);
        assert_eq!(r.get_string(MAX_STRING_LEN).unwrap(), "a");
        assert_eq!(r.get_f32().unwrap(), 50.0);
    }

    #[test]
    fn test_kicked_carries_reason() {
        let bytes = build_kicked("Invalid username.").finish();
        assert_eq!(bytes[0], 0x44);
        assert_eq!(&bytes[1..], b"Invalid username.\0");
    }

    #[test]
    fn test_chat_has_sender_and_body() {
        let bytes = build_chat_message("ann", "hi").finish();
        assert_eq!(&bytes[..], b"\x63ann\0hi\0");
    }

    #[test]
    fn test_server_stat_size() {
        let bytes = build_server_stat(&ServerStats::default()).finish();
        assert_eq!(bytes.len(), 33);
    }
}
