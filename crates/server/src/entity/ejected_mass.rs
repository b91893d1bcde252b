//! Ejected mass.

use super::cell::{Cell, CellData, CellKind};
use super::PlayerId;
use crate::physics::MassCurve;
use glam::Vec2;

/// A pellet fired by a player cell.
#[derive(Debug, Clone)]
pub struct EjectedMass {
    data: CellData,
    /// Cell that fired this pellet; it may not eat it back while it flies.
    pub(crate) source: Option<u32>,
}

impl EjectedMass {
    pub(crate) fn new(
        id: u32,
        position: Vec2,
        mass: f32,
        owner: Option<PlayerId>,
        source: Option<u32>,
        curve: &MassCurve,
    ) -> Self {
        let mut data = CellData::new(id, CellKind::Ejected, position, mass, curve);
        data.owner = owner;
        Self { data, source }
    }

    /// True if `cell_id` fired this pellet and it is still in flight.
    #[inline]
    pub fn is_fresh_from(&self, cell_id: u32) -> bool {
        self.source == Some(cell_id) && self.data.boost.is_some()
    }
}

impl Cell for EjectedMass {
    fn data(&self) -> &CellData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut CellData {
        &mut self.data
    }
}
