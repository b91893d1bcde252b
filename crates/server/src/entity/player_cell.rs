//! Player cell.

use super::cell::{Cell, CellData, CellKind};
use super::PlayerId;
use crate::physics::MassCurve;
use glam::Vec2;

/// A cell controlled by a player.
#[derive(Debug, Clone)]
pub struct PlayerCell {
    pub(crate) cell_data: CellData,
    /// Tick from which this cell may merge with its siblings.
    pub(crate) merge_tick: u64,
}

impl PlayerCell {
    pub(crate) fn new(
        id: u32,
        owner: PlayerId,
        position: Vec2,
        mass: f32,
        curve: &MassCurve,
        tick: u64,
    ) -> Self {
        let mut data = CellData::new(id, CellKind::Player, position, mass, curve);
        data.owner = Some(owner);
        Self {
            cell_data: data,
            merge_tick: tick,
        }
    }

    /// Whether the post-split cooldown has elapsed.
    #[inline]
    pub fn can_merge(&self, tick: u64) -> bool {
        tick >= self.merge_tick
    }

    pub fn merge_tick(&self) -> u64 {
        self.merge_tick
    }
}

impl Cell for PlayerCell {
    fn data(&self) -> &CellData {
        &self.cell_data
    }

    fn data_mut(&mut self) -> &mut CellData {
        &mut self.cell_data
    }
}
