//! Collision and consumption resolution.
//!
//! One pass per tick over every player cell in ascending id order. Each
//! cell queries the index with its own bounds, re-tests every candidate
//! exactly and applies the first rule that matches:
//!
//! 1. food and ejected mass are eaten by a large enough cell
//! 2. a virus is consumed by a much larger cell, or pops a cell above the
//!    split trigger into two halves
//! 3. cells of different players: the larger eats the smaller past the
//!    eat ratio
//! 4. cells of one player merge once both cooldowns are over
//!
//! Removed entities leave the index immediately so nothing is eaten
//! twice. Equal masses never consume each other.

use crate::config::Config;
use crate::entity::{CellKind, Player, PlayerId};
use crate::movement;
use crate::physics::{direction, overlap, Overlap};
use crate::spatial::Bounds;
use crate::world::{CellEntry, World};
use glam::Vec2;
use std::collections::BTreeMap;

/// A player lost their last cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Death {
    pub victim: PlayerId,
    pub eater: PlayerId,
}

/// What one resolution pass did.
#[derive(Debug, Default)]
pub struct CollisionReport {
    pub deaths: Vec<Death>,
    pub food_eaten: usize,
    pub cells_eaten: usize,
    pub merges: usize,
    pub virus_pops: usize,
    pub viruses_consumed: usize,
}

/// Copy of the fields the rules look at, so the world can be mutated
/// while a pair is being resolved.
#[derive(Debug, Clone, Copy)]
struct Body {
    id: u32,
    kind: CellKind,
    owner: Option<PlayerId>,
    position: Vec2,
    radius: f32,
    mass: f32,
    mergeable: bool,
}

impl Body {
    fn read(world: &World, id: u32, tick: u64) -> Option<Self> {
        let entry = world.get(id)?;
        let data = entry.data();
        let mergeable = match entry {
            CellEntry::Player(cell) => cell.can_merge(tick),
            _ => false,
        };
        Some(Self {
            id,
            kind: data.kind(),
            owner: data.owner(),
            position: data.position(),
            radius: data.radius(),
            mass: data.mass(),
            mergeable,
        })
    }

    fn overlap(&self, other: &Body) -> Overlap {
        overlap(self.position, self.radius, other.position, other.radius)
    }
}

/// Whether a resolved pair removed the cell being iterated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Gone,
}

/// Run one resolution pass.
pub fn resolve_collisions(
    world: &mut World,
    players: &mut BTreeMap<PlayerId, Player>,
    config: &Config,
    tick: u64,
) -> CollisionReport {
    let mut report = CollisionReport::default();
    let mut cells = world.player_cells().to_vec();
    cells.sort_unstable();

    for cell_id in cells {
        let Some(cell) = Body::read(world, cell_id, tick) else {
            continue;
        };
        let mut nearby = world.query_region(&Bounds::from_center(cell.position, cell.radius));
        nearby.sort_unstable();

        for other_id in nearby {
            if other_id == cell_id {
                continue;
            }
            // Mass and position change as the cell eats; re-read both sides.
            let Some(cell) = Body::read(world, cell_id, tick) else {
                break;
            };
            let Some(other) = Body::read(world, other_id, tick) else {
                continue;
            };
            let flow = match other.kind {
                CellKind::Food | CellKind::Ejected => {
                    eat_pellet(world, &cell, &other, config, &mut report);
                    Flow::Continue
                }
                CellKind::Virus => {
                    hit_virus(world, players, &cell, &other, config, tick, &mut report);
                    Flow::Continue
                }
                CellKind::Player if other.owner == cell.owner => {
                    merge(world, players, &cell, &other, config, &mut report)
                }
                CellKind::Player => eat_cell(world, players, &cell, &other, config, &mut report),
            };
            if flow == Flow::Gone {
                break;
            }
        }
    }
    report
}

fn eat_pellet(world: &mut World, cell: &Body, pellet: &Body, config: &Config, report: &mut CollisionReport) {
    let rules = &config.collision;
    if cell.mass <= pellet.mass * rules.food_eat_ratio || !cell.overlap(pellet).covers(rules.food_overlap) {
        return;
    }
    // A cell cannot swallow its own pellet while it is still flying out.
    if let Some(CellEntry::Eject(eject)) = world.get(pellet.id) {
        if eject.is_fresh_from(cell.id) {
            return;
        }
    }
    world.remove(pellet.id);
    world.set_mass(cell.id, cell.mass + pellet.mass);
    report.food_eaten += 1;
}

fn hit_virus(
    world: &mut World,
    players: &mut BTreeMap<PlayerId, Player>,
    cell: &Body,
    virus: &Body,
    config: &Config,
    tick: u64,
    report: &mut CollisionReport,
) {
    let rules = &config.virus;
    let o = cell.overlap(virus);
    if cell.mass >= virus.mass * rules.consume_ratio && o.covers(config.collision.cell_overlap) {
        world.remove(virus.id);
        world.set_mass(cell.id, cell.mass + virus.mass);
        report.viruses_consumed += 1;
        return;
    }
    if cell.mass < virus.mass * rules.split_trigger_ratio || !o.covers(rules.split_trigger_overlap) {
        return;
    }
    // The virus is spent even when the player is at the cell cap.
    world.remove(virus.id);
    report.virus_pops += 1;
    let Some(player) = cell.owner.and_then(|owner| players.get_mut(&owner)) else {
        return;
    };
    let fallback = player.target.try_normalize().unwrap_or(Vec2::X);
    let dir = direction(virus.position, cell.position, fallback);
    movement::split_cell(world, player, cell.id, dir, config, tick);
}

fn eat_cell(
    world: &mut World,
    players: &mut BTreeMap<PlayerId, Player>,
    cell: &Body,
    other: &Body,
    config: &Config,
    report: &mut CollisionReport,
) -> Flow {
    let rules = &config.collision;
    let (eater, prey) = if cell.mass > other.mass { (cell, other) } else { (other, cell) };
    if eater.mass <= prey.mass
        || eater.mass < prey.mass * rules.eat_ratio
        || !eater.overlap(prey).covers(rules.cell_overlap)
    {
        return Flow::Continue;
    }

    world.remove(prey.id);
    world.set_mass(eater.id, eater.mass + prey.mass * (1.0 - rules.eat_loss));
    report.cells_eaten += 1;

    if let Some(owner) = eater.owner.and_then(|id| players.get_mut(&id)) {
        owner.economy.credit(prey.mass, config.economy.value_per_mass);
    }
    if let Some(victim) = prey.owner.and_then(|id| players.get_mut(&id)) {
        victim.cells.retain(|&id| id != prey.id);
        if victim.cells.is_empty() {
            report.deaths.push(Death {
                victim: victim.id,
                eater: eater.owner.unwrap_or_default(),
            });
        }
    }

    if prey.id == cell.id { Flow::Gone } else { Flow::Continue }
}

fn merge(
    world: &mut World,
    players: &mut BTreeMap<PlayerId, Player>,
    cell: &Body,
    other: &Body,
    config: &Config,
    report: &mut CollisionReport,
) -> Flow {
    if !cell.mergeable || !other.mergeable || !cell.overlap(other).covers(config.collision.merge_overlap) {
        return Flow::Continue;
    }
    // The heavier cell survives; on a tie the older (lower id) one does.
    let keep_cell = cell.mass > other.mass || (cell.mass == other.mass && cell.id < other.id);
    let (keeper, absorbed) = if keep_cell { (cell, other) } else { (other, cell) };

    world.remove(absorbed.id);
    world.set_mass(keeper.id, keeper.mass + absorbed.mass);
    if let Some(player) = absorbed.owner.and_then(|id| players.get_mut(&id)) {
        player.cells.retain(|&id| id != absorbed.id);
    }
    report.merges += 1;

    if absorbed.id == cell.id { Flow::Gone } else { Flow::Continue }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Role;
    use crate::physics::MassCurve;
    use tokio::time::Instant;

    struct Arena {
        world: World,
        players: BTreeMap<PlayerId, Player>,
        config: Config,
    }

    impl Arena {
        fn new(config: Config) -> Self {
            Self {
                world: World::new(2000.0, 2000.0, MassCurve::from_config(&config), 1000),
                players: BTreeMap::new(),
                config,
            }
        }

        fn player(&mut self, id: PlayerId) {
            let mut player = Player::new(id, Instant::now(), Vec2::new(1920.0, 1080.0));
            player.role = Role::Player;
            self.players.insert(id, player);
        }

        fn cell(&mut self, owner: PlayerId, pos: Vec2, mass: f32) -> u32 {
            let id = self.world.add_player_cell(owner, pos, mass, 0);
            if let Some(player) = self.players.get_mut(&owner) {
                player.cells.push(id);
            }
            id
        }

        fn resolve(&mut self, tick: u64) -> CollisionReport {
            resolve_collisions(&mut self.world, &mut self.players, &self.config, tick)
        }

        fn mass(&self, id: u32) -> Option<f32> {
            self.world.get(id).map(|e| e.data().mass())
        }
    }

    #[test]
    fn test_larger_cell_eats_smaller() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        arena.player(2);
        let big = arena.cell(1, Vec2::new(1000.0, 1000.0), 100.0);
        let small = arena.cell(2, Vec2::new(1000.0, 1000.0), 40.0);

        let report = arena.resolve(0);
        assert_eq!(arena.mass(big), Some(140.0));
        assert_eq!(arena.mass(small), None);
        assert!(!arena.world.is_indexed(small));
        assert_eq!(report.cells_eaten, 1);
        assert_eq!(report.deaths, vec![Death { victim: 2, eater: 1 }]);
        assert!(!arena.players[&2].is_alive());
    }

    #[test]
    fn test_eat_loss_and_game_value() {
        let mut config = Config::default();
        config.collision.eat_loss = 0.25;
        config.economy.value_per_mass = 0.5;
        let mut arena = Arena::new(config);
        arena.player(1);
        arena.player(2);
        let small = arena.cell(1, Vec2::new(500.0, 500.0), 40.0);
        let big = arena.cell(2, Vec2::new(500.0, 500.0), 100.0);

        arena.resolve(0);
        assert_eq!(arena.mass(big), Some(130.0));
        assert_eq!(arena.mass(small), None);
        assert_eq!(arena.players[&2].economy.game_value, 20.0);
        assert_eq!(arena.players[&1].economy.game_value, 0.0);
    }

    #[test]
    fn test_near_equal_and_equal_masses_do_not_eat() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        arena.player(2);
        arena.player(3);
        let a = arena.cell(1, Vec2::new(500.0, 500.0), 100.0);
        let b = arena.cell(2, Vec2::new(500.0, 500.0), 90.0);
        let c = arena.cell(3, Vec2::new(505.0, 500.0), 100.0);
        let report = arena.resolve(0);
        assert_eq!(report.cells_eaten, 0);
        assert_eq!(arena.mass(a), Some(100.0));
        assert_eq!(arena.mass(b), Some(90.0));
        assert_eq!(arena.mass(c), Some(100.0));
    }

    #[test]
    fn test_graze_is_not_an_eat() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        arena.player(2);
        let curve = *arena.world.curve();
        let gap = curve.radius(100.0) + curve.radius(10.0) - 2.0;
        let big = arena.cell(1, Vec2::new(500.0, 500.0), 100.0);
        let small = arena.cell(2, Vec2::new(500.0 + gap, 500.0), 10.0);
        arena.resolve(0);
        assert_eq!(arena.mass(big), Some(100.0));
        assert!(arena.mass(small).is_some());
    }

    #[test]
    fn test_food_is_eaten_once() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        let a = arena.cell(1, Vec2::new(500.0, 500.0), 50.0);
        let food = arena.world.add_food(Vec2::new(502.0, 500.0), 1.0).unwrap();
        let report = arena.resolve(0);
        assert_eq!(report.food_eaten, 1);
        assert_eq!(arena.mass(a), Some(51.0));
        assert!(arena.world.get(food).is_none());
    }

    #[test]
    fn test_own_pellet_in_flight_is_not_eaten() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        let a = arena.cell(1, Vec2::new(500.0, 500.0), 100.0);
        let pellet = arena
            .world
            .add_eject(Some(1), Some(a), Vec2::new(510.0, 500.0), 20.0, Vec2::X, 300.0)
            .unwrap();
        arena.resolve(0);
        assert!(arena.world.get(pellet).is_some());

        arena.world.get_mut(pellet).unwrap().data_mut().boost = None;
        arena.resolve(1);
        assert!(arena.world.get(pellet).is_none());
        assert_eq!(arena.mass(a), Some(120.0));
    }

    #[test]
    fn test_virus_pops_large_cell() {
        let mut config = Config::default();
        config.virus.split_trigger_ratio = 0.5;
        let mut arena = Arena::new(config);
        arena.player(1);
        let a = arena.cell(1, Vec2::new(1000.0, 1000.0), 200.0);
        let virus = arena.world.add_virus(Vec2::new(1000.0, 1000.0), 100.0).unwrap();

        let report = arena.resolve(0);
        assert_eq!(report.virus_pops, 1);
        assert!(arena.world.get(virus).is_none());
        let player = &arena.players[&1];
        assert_eq!(player.cells.len(), 2);
        assert_eq!(arena.mass(a), Some(100.0));
        assert_eq!(arena.mass(player.cells[1]), Some(100.0));
    }

    #[test]
    fn test_virus_spent_at_cell_cap() {
        let mut config = Config::default();
        config.player.max_cells = 1;
        let mut arena = Arena::new(config);
        arena.player(1);
        arena.cell(1, Vec2::new(1000.0, 1000.0), 200.0);
        let virus = arena.world.add_virus(Vec2::new(1000.0, 1000.0), 100.0).unwrap();
        arena.resolve(0);
        assert!(arena.world.get(virus).is_none());
        assert_eq!(arena.players[&1].cells.len(), 1);
        assert_eq!(arena.players[&1].total_mass(&arena.world), 200.0);
    }

    #[test]
    fn test_huge_cell_consumes_virus() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        let a = arena.cell(1, Vec2::new(1000.0, 1000.0), 500.0);
        arena.world.add_virus(Vec2::new(1000.0, 1000.0), 100.0).unwrap();
        let report = arena.resolve(0);
        assert_eq!(report.viruses_consumed, 1);
        assert_eq!(arena.mass(a), Some(600.0));
        assert_eq!(arena.players[&1].cells.len(), 1);
    }

    #[test]
    fn test_small_cell_ignores_virus() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        let a = arena.cell(1, Vec2::new(1000.0, 1000.0), 50.0);
        let virus = arena.world.add_virus(Vec2::new(1000.0, 1000.0), 100.0).unwrap();
        arena.resolve(0);
        assert!(arena.world.get(virus).is_some());
        assert_eq!(arena.mass(a), Some(50.0));
    }

    #[test]
    fn test_merge_waits_for_cooldown() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        let a = arena.cell(1, Vec2::new(1000.0, 1000.0), 60.0);
        let b = arena.cell(1, Vec2::new(1000.0, 1000.0), 40.0);
        for id in [a, b] {
            arena.world.player_cell_mut(id).unwrap().merge_tick = 10;
        }
        assert_eq!(arena.resolve(9).merges, 0);
        assert_eq!(arena.players[&1].cells.len(), 2);

        assert_eq!(arena.resolve(10).merges, 1);
        assert_eq!(arena.players[&1].cells, vec![a]);
        assert_eq!(arena.mass(a), Some(100.0));
        assert!(arena.world.get(b).is_none());
    }

    #[test]
    fn test_merge_tie_keeps_older_cell() {
        let mut arena = Arena::new(Config::default());
        arena.player(1);
        let a = arena.cell(1, Vec2::new(1000.0, 1000.0), 50.0);
        let b = arena.cell(1, Vec2::new(1000.0, 1000.0), 50.0);
        arena.resolve(0);
        assert_eq!(arena.players[&1].cells, vec![a]);
        assert_eq!(arena.mass(a), Some(100.0));
        assert!(arena.world.get(b).is_none());
    }
}
