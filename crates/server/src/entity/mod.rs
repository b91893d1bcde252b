//! Game entities.
//!
//! Every entity is a world-space circle with mass. Players own player
//! cells; food, viruses and ejected mass are unowned or loosely owned.

mod cell;
mod ejected_mass;
mod food;
mod player;
mod player_cell;
mod virus;

pub use cell::{Boost, Cell, CellData, CellKind};
pub use ejected_mass::EjectedMass;
pub use food::Food;
pub use player::{Player, PlayerId, Role};
pub use player_cell::PlayerCell;
pub use virus::Virus;
