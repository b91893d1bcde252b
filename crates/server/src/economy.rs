//! Boundary to the external wallet subsystem.
//!
//! The simulation never moves money. It asks a [`SpawnGate`] whether a
//! player may spawn, credits `game_value` when a player eats another
//! player, and hands a [`Settlement`] to the wallet side when a linked
//! player leaves.

use crate::entity::{Player, PlayerId};

/// Notice sent when a spawn is refused.
pub const DEPOSIT_REQUIRED_MESSAGE: &str = "A one-time deposit is required before you can play.";

/// Per-player economy linkage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Economy {
    /// External account id, if the client linked one.
    pub user_id: Option<String>,
    pub has_deposited: bool,
    /// Accumulated in-game value. Only ever incremented and read here.
    pub game_value: f64,
}

impl Economy {
    /// Credit value for `mass` eaten at `rate` per unit.
    pub fn credit(&mut self, mass: f32, rate: f64) {
        if mass > 0.0 && rate > 0.0 {
            self.game_value += f64::from(mass) * rate;
        }
    }
}

/// Decides whether a player may enter the arena.
pub trait SpawnGate: Send {
    fn can_spawn(&self, player: &Player) -> bool;
}

/// Allows everyone, or only linked accounts with a confirmed deposit.
#[derive(Debug, Clone, Copy)]
pub struct DepositGate {
    required: bool,
}

impl DepositGate {
    pub fn new(required: bool) -> Self {
        Self { required }
    }
}

impl SpawnGate for DepositGate {
    fn can_spawn(&self, player: &Player) -> bool {
        !self.required || (player.economy.user_id.is_some() && player.economy.has_deposited)
    }
}

/// Value owed to a departing linked player.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub player_id: PlayerId,
    pub user_id: String,
    pub game_value: f64,
}

impl Settlement {
    /// Settlement for a leaving player, if there is anything to cash out.
    pub fn for_player(player: &Player) -> Option<Self> {
        let economy = &player.economy;
        let user_id = economy.user_id.as_ref()?;
        (economy.has_deposited && economy.game_value > 0.0).then(|| Self {
            player_id: player.id,
            user_id: user_id.clone(),
            game_value: economy.game_value,
        })
    }
}
