//! Leaderboard ranking.

use crate::entity::{Player, PlayerId};
use crate::world::World;
use protocol::packets::LeaderboardEntry;
use std::collections::BTreeMap;

/// Rank living players by aggregate mass, heaviest first. Equal masses
/// are ordered by connection id so the order is total.
pub fn rank(players: &BTreeMap<PlayerId, Player>, world: &World, size: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = players
        .values()
        .filter(|p| p.is_alive())
        .map(|p| LeaderboardEntry {
            id: p.id,
            name: p.name.clone(),
            mass: p.total_mass(world),
        })
        .collect();
    entries.sort_by(|a, b| b.mass.total_cmp(&a.mass).then(a.id.cmp(&b.id)));
    entries.truncate(size);
    entries
}

/// Decides when a freshly ranked board goes out.
#[derive(Debug)]
pub struct LeaderboardState {
    interval: u64,
    last_ids: Vec<PlayerId>,
    last_tick: Option<u64>,
}

impl LeaderboardState {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            last_ids: Vec::new(),
            last_tick: None,
        }
    }

    /// True when the interval has elapsed or the ranking order changed.
    pub fn should_broadcast(&mut self, entries: &[LeaderboardEntry], tick: u64) -> bool {
        let reordered = entries.len() != self.last_ids.len()
            || entries.iter().zip(&self.last_ids).any(|(e, &id)| e.id != id);
        let due = self
            .last_tick
            .is_none_or(|last| tick.saturating_sub(last) >= self.interval);
        if !(reordered || due) {
            return false;
        }
        self.last_ids = entries.iter().map(|e| e.id).collect();
        self.last_tick = Some(tick);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::MassCurve;
    use glam::Vec2;
    use tokio::time::Instant;

    fn add(players: &mut BTreeMap<PlayerId, Player>, world: &mut World, id: PlayerId, masses: &[f32]) {
        let mut player = Player::new(id, Instant::now(), Vec2::ZERO);
        player.name = format!("p{id}");
        for (i, &mass) in masses.iter().enumerate() {
            let cell = world.add_player_cell(id, Vec2::new(100.0 * (i + 1) as f32, 100.0), mass, 0);
            player.cells.push(cell);
        }
        players.insert(id, player);
    }

    #[test]
    fn test_rank_orders_by_mass_then_id() {
        let mut world = World::new(2000.0, 2000.0, MassCurve::default(), 100);
        let mut players = BTreeMap::new();
        add(&mut players, &mut world, 3, &[50.0]);
        add(&mut players, &mut world, 1, &[20.0, 30.0]);
        add(&mut players, &mut world, 2, &[80.0]);
        add(&mut players, &mut world, 4, &[]);

        let board = rank(&players, &world, 10);
        let ids: Vec<u32> = board.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(board.windows(2).all(|w| w[0].mass >= w[1].mass));
        assert_eq!(board[1].mass, 50.0);

        assert_eq!(rank(&players, &world, 2).len(), 2);
    }

    #[test]
    fn test_broadcast_on_interval_or_reorder() {
        let entry = |id| LeaderboardEntry {
            id,
            name: String::new(),
            mass: 1.0,
        };
        let mut state = LeaderboardState::new(10);
        let board = vec![entry(1), entry(2)];
        assert!(state.should_broadcast(&board, 0));
        assert!(!state.should_broadcast(&board, 5));
        assert!(state.should_broadcast(&[entry(2), entry(1)], 6));
        assert!(!state.should_broadcast(&[entry(2), entry(1)], 15));
        assert!(state.should_broadcast(&[entry(2), entry(1)], 16));
    }
}
