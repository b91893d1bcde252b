//! Virus.

use super::cell::{Cell, CellData, CellKind};
use crate::physics::MassCurve;
use glam::Vec2;

/// A stationary hazard that splits large cells touching it.
#[derive(Debug, Clone)]
pub struct Virus {
    data: CellData,
}

impl Virus {
    pub(crate) fn new(id: u32, position: Vec2, mass: f32, curve: &MassCurve) -> Self {
        Self {
            data: CellData::new(id, CellKind::Virus, position, mass, curve),
        }
    }
}

impl Cell for Virus {
    fn data(&self) -> &CellData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut CellData {
        &mut self.data
    }
}
