//! Base cell type and common functionality.
//!
//! Mutators are crate-private: only the movement engine and the
//! collision resolver change mass or position.

use crate::entity::PlayerId;
use crate::physics::MassCurve;
use crate::world::WorldBorder;
use glam::Vec2;

/// Kind of entity a cell represents.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Player = 0,
    Food = 1,
    Virus = 2,
    Ejected = 3,
}

/// Remaining coast after a split or an ejection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boost {
    /// Distance still to travel.
    pub distance: f32,
    /// Unit direction of travel.
    pub direction: Vec2,
}

/// Common cell data shared by all cell types.
#[derive(Debug, Clone)]
pub struct CellData {
    pub(crate) id: u32,
    pub(crate) owner: Option<PlayerId>,
    pub(crate) kind: CellKind,
    pub(crate) position: Vec2,
    pub(crate) mass: f32,
    pub(crate) radius: f32,
    pub(crate) boost: Option<Boost>,
}

impl CellData {
    pub(crate) fn new(
        id: u32,
        kind: CellKind,
        position: Vec2,
        mass: f32,
        curve: &MassCurve,
    ) -> Self {
        Self {
            id,
            owner: None,
            kind,
            position,
            mass,
            radius: curve.radius(mass),
            boost: None,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    #[inline]
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn boost(&self) -> Option<Boost> {
        self.boost
    }

    /// Set the mass and recompute the radius.
    #[inline]
    pub(crate) fn set_mass(&mut self, mass: f32, curve: &MassCurve) {
        self.mass = mass;
        self.radius = curve.radius(mass);
    }

    #[inline]
    pub(crate) fn set_boost(&mut self, distance: f32, direction: Vec2) {
        self.boost = (distance > 0.0).then_some(Boost {
            distance,
            direction,
        });
    }

    /// Clamp the centre so the circle stays inside the border.
    ///
    /// A circle wider than the world is pinned to the middle of that axis.
    #[inline]
    pub(crate) fn clamp_to(&mut self, border: &WorldBorder) {
        self.position = border.clamp(self.position, self.radius);
    }

    /// Advance the boost by `decay` of its remaining distance.
    /// Returns true while the cell is still coasting.
    pub(crate) fn step_boost(&mut self, decay: f32, border: &WorldBorder) -> bool {
        let Some(boost) = self.boost.as_mut() else {
            return false;
        };
        if boost.distance < 1.0 {
            self.boost = None;
            return false;
        }
        let step = boost.distance * decay.clamp(0.01, 1.0);
        boost.distance -= step;
        self.position += boost.direction * step;
        self.clamp_to(border);
        true
    }
}

/// Trait for all cell types.
pub trait Cell: Send + Sync {
    /// Get the common cell data.
    fn data(&self) -> &CellData;

    /// Get mutable cell data.
    fn data_mut(&mut self) -> &mut CellData;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn border() -> WorldBorder {
        WorldBorder::new(1000.0, 1000.0)
    }

    #[test]
    fn test_set_mass_updates_radius() {
        let curve = MassCurve::default();
        let mut cell = CellData::new(1, CellKind::Player, Vec2::ZERO, 10.0, &curve);
        let before = cell.radius();
        cell.set_mass(40.0, &curve);
        assert_eq!(cell.mass(), 40.0);
        assert_eq!(cell.radius(), curve.radius(40.0));
        assert!(cell.radius() > before);
    }

    #[test]
    fn test_boost_decays_to_rest() {
        let curve = MassCurve::default();
        let mut cell = CellData::new(1, CellKind::Ejected, Vec2::new(500.0, 500.0), 10.0, &curve);
        cell.set_boost(100.0, Vec2::X);
        assert!(cell.step_boost(0.1, &border()));
        assert!((cell.position().x - 510.0).abs() < 1e-3);
        let mut steps = 0;
        while cell.step_boost(0.1, &border()) {
            steps += 1;
            assert!(steps < 200);
        }
        assert!(cell.boost().is_none());
        assert!(cell.position().x < 600.0);
    }

    #[test]
    fn test_boost_stops_at_border() {
        let curve = MassCurve::default();
        let mut cell = CellData::new(1, CellKind::Ejected, Vec2::new(990.0, 500.0), 1.0, &curve);
        cell.set_boost(500.0, Vec2::X);
        cell.step_boost(0.5, &border());
        assert!(cell.position().x <= 1000.0 - cell.radius());
    }
}
