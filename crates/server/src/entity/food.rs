//! Food pellet.

use super::cell::{Cell, CellData, CellKind};
use crate::physics::MassCurve;
use glam::Vec2;

/// A static pellet that stays put until eaten.
#[derive(Debug, Clone)]
pub struct Food {
    data: CellData,
}

impl Food {
    pub(crate) fn new(id: u32, position: Vec2, mass: f32, curve: &MassCurve) -> Self {
        Self {
            data: CellData::new(id, CellKind::Food, position, mass, curve),
        }
    }
}

impl Cell for Food {
    fn data(&self) -> &CellData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut CellData {
        &mut self.data
    }
}
