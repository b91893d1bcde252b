//! Player state owned by the simulation.

use crate::economy::Economy;
use crate::liveness::Heartbeat;
use crate::world::World;
use glam::Vec2;
use tokio::time::Instant;

/// Connection id, unique for the life of the process.
pub type PlayerId = u32;

/// How a connection takes part in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connected but has not sent a join yet.
    Connecting,
    Player,
    Spectator,
}

/// A connected participant.
///
/// `cells` is kept in creation order; splits and merges walk it front to
/// back so the outcome does not depend on hash ordering.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    pub cells: Vec<u32>,
    /// Desired direction as an offset from the player's centre.
    pub target: Vec2,
    pub is_admin: bool,
    pub heartbeat: Heartbeat,
    pub economy: Economy,
    /// Reported screen size.
    pub viewport: Vec2,
}

impl Player {
    pub fn new(id: PlayerId, now: Instant, viewport: Vec2) -> Self {
        Self {
            id,
            name: String::new(),
            role: Role::Connecting,
            cells: Vec::new(),
            target: Vec2::ZERO,
            is_admin: false,
            heartbeat: Heartbeat::new(now),
            economy: Economy::default(),
            viewport,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.cells.is_empty()
    }

    #[inline]
    pub fn is_joined(&self) -> bool {
        self.role != Role::Connecting
    }

    /// Sum of the masses of every owned cell.
    pub fn total_mass(&self, world: &World) -> f32 {
        self.cells
            .iter()
            .filter_map(|id| world.get(*id))
            .map(|cell| cell.data().mass())
            .sum()
    }

    /// Mass-weighted centre of the owned cells.
    pub fn centre(&self, world: &World) -> Option<Vec2> {
        let mut weighted = Vec2::ZERO;
        let mut total = 0.0;
        for cell in self.cells.iter().filter_map(|id| world.get(*id)) {
            let data = cell.data();
            weighted += data.position() * data.mass();
            total += data.mass();
        }
        (total > 0.0).then(|| weighted / total)
    }

    /// Where the player is steering, in world space.
    pub fn target_point(&self, world: &World) -> Option<Vec2> {
        self.centre(world).map(|c| c + self.target)
    }
}
