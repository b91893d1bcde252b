//! Movement and split engine.
//!
//! Every function here mutates cell mass or position and is called from
//! the tick only.

use crate::config::Config;
use crate::entity::{Cell, Player};
use crate::physics::{direction, overlap};
use crate::world::World;
use glam::Vec2;

/// Direction used when a cell has nowhere to go, such as a target that
/// sits exactly on its centre.
const DEFAULT_DIRECTION: Vec2 = Vec2::X;

/// Move every cell of `player` toward its target point.
///
/// Cells slow down as they close in so they settle on the target instead
/// of oscillating around it.
pub fn move_player(world: &mut World, player: &Player, config: &Config) {
    let Some(target) = player.target_point(world) else {
        return;
    };
    let curve = *world.curve();
    let border = world.border;
    let dt = config.tick_seconds();
    let ease = config.movement.min_target_distance;

    for &id in &player.cells {
        let Some(entry) = world.get_mut(id) else {
            continue;
        };
        let data = entry.data_mut();
        let to_target = target - data.position;
        let distance = to_target.length();
        if distance < 1.0 {
            continue;
        }
        let speed = curve.speed(data.mass) * dt;
        let falloff = (distance / (ease + data.radius)).min(1.0);
        let step = (speed * falloff).min(distance);
        data.position += to_target / distance * step;
        data.clamp_to(&border);
    }
}

/// Advance boosted cells (split pieces and ejected pellets).
pub fn step_boosts(world: &mut World, config: &Config) {
    world.step_boosts(config.movement.boost_decay);
}

/// Split every eligible cell of `player` toward its target. Cells are
/// visited in creation order and the cap is checked before each split.
/// Returns the number of new cells.
pub fn split_player(world: &mut World, player: &mut Player, config: &Config, tick: u64) -> usize {
    let Some(target) = player.target_point(world) else {
        return 0;
    };
    let candidates = player.cells.clone();
    let mut created = 0;
    for id in candidates {
        if player.cells.len() >= config.player.max_cells {
            break;
        }
        let Some(cell) = world.player_cell(id) else {
            continue;
        };
        let data = cell.data();
        if data.mass() < config.player.min_split_mass {
            continue;
        }
        let dir = direction(data.position(), target, DEFAULT_DIRECTION);
        if split_cell(world, player, id, dir, config, tick).is_some() {
            created += 1;
        }
    }
    created
}

/// Split one cell into two halves, the new half offset along `dir` and
/// boosted outward. Both halves start a fresh merge cooldown.
///
/// Returns `None` at the cell cap or if `cell_id` is not a live player
/// cell. The minimum splittable mass is not checked here; forced splits
/// skip it.
pub fn split_cell(
    world: &mut World,
    player: &mut Player,
    cell_id: u32,
    dir: Vec2,
    config: &Config,
    tick: u64,
) -> Option<u32> {
    if player.cells.len() >= config.player.max_cells {
        return None;
    }
    let (position, mass) = {
        let data = world.player_cell(cell_id)?.data();
        (data.position(), data.mass())
    };
    let half = mass / 2.0;
    let offset = position + dir * world.curve().radius(half);

    world.set_mass(cell_id, half);
    let new_id = world.add_player_cell(player.id, offset, half, tick);
    world.set_boost(new_id, config.player.split_boost, dir);

    let merge_tick = tick + config.ms_to_ticks(config.player.merge_cooldown_ms);
    for id in [cell_id, new_id] {
        if let Some(cell) = world.player_cell_mut(id) {
            cell.merge_tick = merge_tick;
        }
    }
    player.cells.push(new_id);
    Some(new_id)
}

/// Fire one pellet from every cell that can afford it. Returns the
/// number of pellets spawned.
pub fn fire_mass(world: &mut World, player: &Player, config: &Config, tick: u64) -> usize {
    let Some(target) = player.target_point(world) else {
        return 0;
    };
    let eject = &config.eject;
    let mut fired = 0;
    for &id in &player.cells {
        if !world.has_room() {
            break;
        }
        let Some(cell) = world.player_cell(id) else {
            continue;
        };
        let data = cell.data();
        let remaining = data.mass() - eject.mass;
        if remaining < eject.min_remaining_mass {
            continue;
        }
        let dir = direction(data.position(), target, DEFAULT_DIRECTION);
        let position = data.position();

        world.set_mass(id, remaining);
        let edge = position + dir * world.curve().radius(remaining);
        if world
            .add_eject(Some(player.id), Some(id), edge, eject.mass, dir, eject.boost)
            .is_some()
        {
            fired += 1;
        }
    }
    fired
}

/// Separate same-player cells that are still under merge cooldown.
/// Each cell of an overlapping pair moves by a share of the overlap
/// depth proportional to the other cell's mass.
pub fn push_apart(world: &mut World, player: &Player, tick: u64) {
    let border = world.border;
    for (i, &a) in player.cells.iter().enumerate() {
        for &b in &player.cells[i + 1..] {
            let (Some(ca), Some(cb)) = (world.player_cell(a), world.player_cell(b)) else {
                continue;
            };
            if ca.can_merge(tick) && cb.can_merge(tick) {
                continue;
            }
            let (da, db) = (ca.data(), cb.data());
            let o = overlap(da.position(), da.radius(), db.position(), db.radius());
            let total = da.mass() + db.mass();
            if o.depth <= 0.0 || total <= 0.0 {
                continue;
            }
            let push = if o.distance > f32::EPSILON {
                o.delta / o.distance
            } else {
                DEFAULT_DIRECTION
            } * o.depth;
            let (a_share, b_share) = (db.mass() / total, da.mass() / total);

            if let Some(entry) = world.get_mut(a) {
                let data = entry.data_mut();
                data.position -= push * a_share;
                data.clamp_to(&border);
            }
            if let Some(entry) = world.get_mut(b) {
                let data = entry.data_mut();
                data.position += push * b_share;
                data.clamp_to(&border);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::MassCurve;
    use tokio::time::Instant;

    fn setup(config: &Config) -> (World, Player) {
        let world = World::new(2000.0, 2000.0, MassCurve::from_config(config), 1000);
        let mut player = Player::new(1, Instant::now(), Vec2::new(1920.0, 1080.0));
        player.role = crate::entity::Role::Player;
        (world, player)
    }

    fn spawn(world: &mut World, player: &mut Player, pos: Vec2, mass: f32) -> u32 {
        let id = world.add_player_cell(player.id, pos, mass, 0);
        player.cells.push(id);
        id
    }

    #[test]
    fn test_split_halves_and_conserves_mass() {
        let config = Config::default();
        let (mut world, mut player) = setup(&config);
        let id = spawn(&mut world, &mut player, Vec2::new(1000.0, 1000.0), 100.0);
        player.target = Vec2::new(100.0, 0.0);

        assert_eq!(split_player(&mut world, &mut player, &config, 10), 1);
        assert_eq!(player.cells.len(), 2);
        assert_eq!(player.total_mass(&world), 100.0);

        let parent = world.player_cell(id).unwrap();
        let child = world.player_cell(player.cells[1]).unwrap();
        assert_eq!(parent.data().mass(), 50.0);
        assert_eq!(child.data().mass(), 50.0);
        assert!(child.data().position().x > parent.data().position().x);
        assert!(child.data().boost().is_some());
        let cooldown = config.ms_to_ticks(config.player.merge_cooldown_ms);
        assert_eq!(parent.merge_tick(), 10 + cooldown);
        assert!(!child.can_merge(10));
    }

    #[test]
    fn test_split_respects_min_mass_and_cap() {
        let mut config = Config::default();
        config.player.max_cells = 3;
        let (mut world, mut player) = setup(&config);
        spawn(&mut world, &mut player, Vec2::new(500.0, 500.0), 15.0);
        assert_eq!(split_player(&mut world, &mut player, &config, 0), 0);

        spawn(&mut world, &mut player, Vec2::new(900.0, 900.0), 400.0);
        assert_eq!(split_player(&mut world, &mut player, &config, 0), 1);
        assert_eq!(split_player(&mut world, &mut player, &config, 0), 0);
        assert_eq!(player.cells.len(), 3);
        assert_eq!(player.total_mass(&world), 415.0);
    }

    #[test]
    fn test_fire_mass_spawns_pellet_at_edge() {
        let config = Config::default();
        let (mut world, mut player) = setup(&config);
        let id = spawn(&mut world, &mut player, Vec2::new(1000.0, 1000.0), 100.0);
        player.target = Vec2::new(0.0, 200.0);

        assert_eq!(fire_mass(&mut world, &player, &config, 0), 1);
        let cell = world.player_cell(id).unwrap().data().clone();
        assert_eq!(cell.mass(), 100.0 - config.eject.mass);
        let pellets = world.eject_cells().to_vec();
        assert_eq!(pellets.len(), 1);
        let pellet = world.get(pellets[0]).unwrap().data();
        assert_eq!(pellet.mass(), config.eject.mass);
        assert_eq!(pellet.owner(), Some(1));
        assert!(pellet.position().y > cell.position().y);
    }

    #[test]
    fn test_fire_mass_refused_when_too_small() {
        let config = Config::default();
        let (mut world, mut player) = setup(&config);
        spawn(
            &mut world,
            &mut player,
            Vec2::new(500.0, 500.0),
            config.eject.mass + config.eject.min_remaining_mass - 1.0,
        );
        assert_eq!(fire_mass(&mut world, &player, &config, 0), 0);
        assert!(world.eject_cells().is_empty());
    }

    #[test]
    fn test_move_toward_target_and_clamp() {
        let config = Config::default();
        let (mut world, mut player) = setup(&config);
        let id = spawn(&mut world, &mut player, Vec2::new(1000.0, 1000.0), 10.0);
        player.target = Vec2::new(500.0, 0.0);
        move_player(&mut world, &player, &config);
        let x = world.get(id).unwrap().data().position().x;
        let expected = world.curve().speed(10.0) * config.tick_seconds();
        assert!((x - 1000.0 - expected).abs() < 1e-3);

        player.target = Vec2::new(-50_000.0, 0.0);
        for _ in 0..500 {
            move_player(&mut world, &player, &config);
        }
        let data = world.get(id).unwrap().data();
        assert_eq!(data.position().x, data.radius());
    }

    #[test]
    fn test_larger_cells_move_slower() {
        let config = Config::default();
        let (mut world, mut small) = setup(&config);
        let mut big = Player::new(2, Instant::now(), Vec2::ZERO);
        let s = spawn(&mut world, &mut small, Vec2::new(500.0, 500.0), 10.0);
        let b = spawn(&mut world, &mut big, Vec2::new(500.0, 1500.0), 1000.0);
        small.target = Vec2::new(1000.0, 0.0);
        big.target = Vec2::new(1000.0, 0.0);
        move_player(&mut world, &small, &config);
        move_player(&mut world, &big, &config);
        let ds = world.get(s).unwrap().data().position().x - 500.0;
        let db = world.get(b).unwrap().data().position().x - 500.0;
        assert!(ds > db && db > 0.0);
    }

    #[test]
    fn test_push_apart_separates_fresh_splits() {
        let config = Config::default();
        let (mut world, mut player) = setup(&config);
        let a = spawn(&mut world, &mut player, Vec2::new(1000.0, 1000.0), 50.0);
        let b = spawn(&mut world, &mut player, Vec2::new(1010.0, 1000.0), 50.0);
        for id in [a, b] {
            world.player_cell_mut(id).unwrap().merge_tick = 100;
        }
        push_apart(&mut world, &player, 0);
        let (da, db) = (world.get(a).unwrap().data(), world.get(b).unwrap().data());
        let o = overlap(da.position(), da.radius(), db.position(), db.radius());
        assert!(o.depth.abs() < 1e-3);

        // Once the cooldown is over the pair is left to merge.
        world.get_mut(b).unwrap().data_mut().position = Vec2::new(1010.0, 1000.0);
        push_apart(&mut world, &player, 100);
        assert_eq!(world.get(b).unwrap().data().position(), Vec2::new(1010.0, 1000.0));
    }
}
