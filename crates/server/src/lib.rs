//! Server-authoritative cell arena: simulation, economy hooks and the
//! WebSocket gateway.

pub mod collision;
pub mod config;
pub mod economy;
pub mod entity;
pub mod liveness;
pub mod movement;
pub mod physics;
pub mod server;
pub mod spatial;
pub mod world;

pub use config::Config;
pub use server::{run, start_game, GameHandle, GameState};
