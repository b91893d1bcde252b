//! Per-client state snapshots.

use crate::config::Config;
use crate::entity::{CellKind, Player, PlayerId, Role};
use crate::spatial::Bounds;
use crate::world::World;
use protocol::packets::{CellRecord, PlayerRecord, StateSnapshot};
use std::collections::BTreeMap;

fn record(world: &World, id: u32) -> Option<CellRecord> {
    let data = world.get(id)?.data();
    Some(CellRecord {
        id,
        position: data.position(),
        mass: data.mass(),
        radius: data.radius(),
    })
}

/// Region a client can see: the whole world for spectators, the centre
/// plus half the viewport and a margin for players. Dead or unjoined
/// sessions have no view.
pub fn view_bounds(world: &World, viewer: &Player, config: &Config) -> Option<Bounds> {
    match viewer.role {
        Role::Spectator => Some(world.border.bounds()),
        Role::Player => {
            let centre = viewer.centre(world)?;
            let half = viewer.viewport / 2.0 + config.player.view_margin;
            Some(Bounds::from_half_extents(centre, half))
        }
        Role::Connecting => None,
    }
}

/// Build what `viewer` sees this tick, or `None` if it sees nothing.
///
/// Own cells are always included. Everything else is filtered exactly
/// against the view after the index query.
pub fn build_snapshot(
    world: &mut World,
    players: &BTreeMap<PlayerId, Player>,
    viewer: &Player,
    config: &Config,
) -> Option<StateSnapshot> {
    let view = view_bounds(world, viewer, config)?;
    let mut visible = world.query_region(&view);
    visible.sort_unstable();

    let mut snapshot = StateSnapshot {
        own: viewer.cells.iter().filter_map(|&id| record(world, id)).collect(),
        ..StateSnapshot::default()
    };
    let mut others: BTreeMap<PlayerId, Vec<CellRecord>> = BTreeMap::new();

    for id in visible {
        let Some(entry) = world.get(id) else {
            continue;
        };
        let data = entry.data();
        if !Bounds::from_center(data.position(), data.radius()).intersects(&view) {
            continue;
        }
        let Some(cell) = record(world, id) else {
            continue;
        };
        match data.kind() {
            CellKind::Player => match data.owner() {
                Some(owner) if owner == viewer.id => {}
                Some(owner) => others.entry(owner).or_default().push(cell),
                None => {}
            },
            CellKind::Food => snapshot.food.push(cell),
            CellKind::Virus => snapshot.viruses.push(cell),
            CellKind::Ejected => snapshot.ejected.push(cell),
        }
    }

    snapshot.players = others
        .into_iter()
        .filter_map(|(owner, cells)| {
            let player = players.get(&owner)?;
            Some(PlayerRecord {
                id: owner,
                name: player.name.clone(),
                cells,
            })
        })
        .collect();
    Some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::MassCurve;
    use glam::Vec2;
    use tokio::time::Instant;

    fn player(id: PlayerId, role: Role) -> Player {
        let mut p = Player::new(id, Instant::now(), Vec2::new(800.0, 600.0));
        p.role = role;
        p.name = format!("p{id}");
        p
    }

    #[test]
    fn test_snapshot_is_limited_to_view() {
        let config = Config::default();
        let mut world = World::new(5000.0, 5000.0, MassCurve::default(), 1000);
        let mut players = BTreeMap::new();

        let mut me = player(1, Role::Player);
        me.cells.push(world.add_player_cell(1, Vec2::new(1000.0, 1000.0), 50.0, 0));
        let mut near = player(2, Role::Player);
        near.cells.push(world.add_player_cell(2, Vec2::new(1200.0, 1100.0), 30.0, 0));
        let mut far = player(3, Role::Player);
        far.cells.push(world.add_player_cell(3, Vec2::new(4000.0, 4000.0), 30.0, 0));
        let food_near = world.add_food(Vec2::new(900.0, 900.0), 1.0).unwrap();
        world.add_food(Vec2::new(3000.0, 1000.0), 1.0).unwrap();
        let virus = world.add_virus(Vec2::new(1300.0, 1250.0), 100.0).unwrap();
        for p in [near, far] {
            players.insert(p.id, p);
        }

        let snap = build_snapshot(&mut world, &players, &me, &config).unwrap();
        assert_eq!(snap.own.len(), 1);
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.players[0].id, 2);
        assert_eq!(snap.players[0].name, "p2");
        assert_eq!(snap.food.iter().map(|c| c.id).collect::<Vec<_>>(), vec![food_near]);
        assert_eq!(snap.viruses[0].id, virus);
    }

    #[test]
    fn test_spectator_sees_whole_world() {
        let config = Config::default();
        let mut world = World::new(5000.0, 5000.0, MassCurve::default(), 1000);
        world.add_food(Vec2::new(10.0, 10.0), 1.0);
        world.add_food(Vec2::new(4990.0, 4990.0), 1.0);
        let spectator = player(9, Role::Spectator);
        let snap = build_snapshot(&mut world, &BTreeMap::new(), &spectator, &config).unwrap();
        assert!(snap.own.is_empty());
        assert_eq!(snap.food.len(), 2);
    }

    #[test]
    fn test_dead_player_gets_no_snapshot() {
        let config = Config::default();
        let mut world = World::new(1000.0, 1000.0, MassCurve::default(), 100);
        let dead = player(1, Role::Player);
        assert!(build_snapshot(&mut world, &BTreeMap::new(), &dead, &config).is_none());
        let fresh = player(2, Role::Connecting);
        assert!(build_snapshot(&mut world, &BTreeMap::new(), &fresh, &config).is_none());
    }
}
