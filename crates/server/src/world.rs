//! World state management.
//!
//! Owns every live entity and the spatial index over them.

use crate::entity::{Cell, CellData, CellKind, EjectedMass, Food, PlayerCell, PlayerId, Virus};
use crate::physics::{overlap, MassCurve};
use crate::spatial::{Bounds, SpatialGrid};
use glam::Vec2;
use rand::Rng;
use std::collections::HashMap;

/// Grid resolution of the spatial index.
const GRID_COLUMNS: usize = 32;
/// Attempts at finding a free spot before settling for any spot.
const PLACEMENT_ATTEMPTS: usize = 8;

/// A cell entry in the world.
#[derive(Debug)]
pub enum CellEntry {
    Player(PlayerCell),
    Food(Food),
    Virus(Virus),
    Eject(EjectedMass),
}

impl CellEntry {
    /// Get the common cell data.
    pub fn data(&self) -> &CellData {
        match self {
            CellEntry::Player(c) => c.data(),
            CellEntry::Food(c) => c.data(),
            CellEntry::Virus(c) => c.data(),
            CellEntry::Eject(c) => c.data(),
        }
    }

    /// Get mutable cell data.
    pub(crate) fn data_mut(&mut self) -> &mut CellData {
        match self {
            CellEntry::Player(c) => c.data_mut(),
            CellEntry::Food(c) => c.data_mut(),
            CellEntry::Virus(c) => c.data_mut(),
            CellEntry::Eject(c) => c.data_mut(),
        }
    }
}

/// World border bounds. The world spans `0..width` x `0..height`.
#[derive(Debug, Clone, Copy)]
pub struct WorldBorder {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub width: f32,
    pub height: f32,
}

impl WorldBorder {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: width,
            max_y: height,
            width,
            height,
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Clamp a circle's centre so the circle stays inside.
    #[inline]
    pub fn clamp(&self, position: Vec2, radius: f32) -> Vec2 {
        let rx = radius.min(self.width / 2.0);
        let ry = radius.min(self.height / 2.0);
        Vec2::new(
            position.x.clamp(self.min_x + rx, self.max_x - rx),
            position.y.clamp(self.min_y + ry, self.max_y - ry),
        )
    }

    /// Get a random position that keeps a circle of `radius` inside.
    pub fn random_position(&self, radius: f32) -> Vec2 {
        let mut rng = rand::rng();
        let rx = radius.min(self.width / 2.0);
        let ry = radius.min(self.height / 2.0);
        let x = if self.max_x - rx > self.min_x + rx {
            rng.random_range(self.min_x + rx..self.max_x - rx)
        } else {
            self.min_x + self.width / 2.0
        };
        let y = if self.max_y - ry > self.min_y + ry {
            rng.random_range(self.min_y + ry..self.max_y - ry)
        } else {
            self.min_y + self.height / 2.0
        };
        Vec2::new(x, y)
    }
}

/// Ids of one entity kind, with O(1) swap-removal.
#[derive(Debug, Default)]
struct IdList {
    ids: Vec<u32>,
    pos: HashMap<u32, usize>,
}

impl IdList {
    fn push(&mut self, id: u32) {
        if !self.pos.contains_key(&id) {
            self.pos.insert(id, self.ids.len());
            self.ids.push(id);
        }
    }

    fn remove(&mut self, id: u32) {
        if let Some(pos) = self.pos.remove(&id) {
            self.ids.swap_remove(pos);
            if let Some(&swapped) = self.ids.get(pos) {
                self.pos.insert(swapped, pos);
            }
        }
    }

    fn as_slice(&self) -> &[u32] {
        &self.ids
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// The game world containing all cells.
#[derive(Debug)]
pub struct World {
    next_node_id: u32,
    cells: HashMap<u32, CellEntry>,
    player_cells: IdList,
    food_cells: IdList,
    virus_cells: IdList,
    eject_cells: IdList,
    /// Cells that are currently coasting on a boost.
    moving: IdList,
    pub border: WorldBorder,
    index: SpatialGrid,
    curve: MassCurve,
    max_entities: usize,
}

impl World {
    /// Create a new world with the given border size.
    pub fn new(width: f32, height: f32, curve: MassCurve, max_entities: usize) -> Self {
        let border = WorldBorder::new(width, height);
        Self {
            next_node_id: 1,
            cells: HashMap::with_capacity(2048),
            player_cells: IdList::default(),
            food_cells: IdList::default(),
            virus_cells: IdList::default(),
            eject_cells: IdList::default(),
            moving: IdList::default(),
            index: SpatialGrid::new(border.bounds(), GRID_COLUMNS),
            border,
            curve,
            max_entities,
        }
    }

    pub fn curve(&self) -> &MassCurve {
        &self.curve
    }

    /// Get the next node ID. Zero is never handed out.
    fn next_id(&mut self) -> u32 {
        let id = self.next_node_id;
        self.next_node_id = self.next_node_id.wrapping_add(1).max(1);
        id
    }

    /// Whether another entity fits under the population cap.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.cells.len() < self.max_entities
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&CellEntry> {
        self.cells.get(&id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut CellEntry> {
        self.cells.get_mut(&id)
    }

    /// Data of a player cell, if `id` names one.
    pub fn player_cell(&self, id: u32) -> Option<&PlayerCell> {
        match self.cells.get(&id) {
            Some(CellEntry::Player(cell)) => Some(cell),
            _ => None,
        }
    }

    pub(crate) fn player_cell_mut(&mut self, id: u32) -> Option<&mut PlayerCell> {
        match self.cells.get_mut(&id) {
            Some(CellEntry::Player(cell)) => Some(cell),
            _ => None,
        }
    }

    fn insert(&mut self, entry: CellEntry) -> u32 {
        let data = entry.data();
        let id = data.id();
        self.index.insert(id, data.position(), data.radius());
        match data.kind() {
            CellKind::Player => self.player_cells.push(id),
            CellKind::Food => self.food_cells.push(id),
            CellKind::Virus => self.virus_cells.push(id),
            CellKind::Ejected => self.eject_cells.push(id),
        }
        if data.boost().is_some() {
            self.moving.push(id);
        }
        self.cells.insert(id, entry);
        id
    }

    /// Add a player cell. Player cells are exempt from the population cap.
    pub(crate) fn add_player_cell(&mut self, owner: PlayerId, position: Vec2, mass: f32, tick: u64) -> u32 {
        let id = self.next_id();
        let mut cell = PlayerCell::new(id, owner, position, mass, &self.curve, tick);
        cell.cell_data.clamp_to(&self.border);
        self.insert(CellEntry::Player(cell))
    }

    pub(crate) fn add_food(&mut self, position: Vec2, mass: f32) -> Option<u32> {
        if !self.has_room() {
            return None;
        }
        let id = self.next_id();
        let food = Food::new(id, position, mass, &self.curve);
        Some(self.insert(CellEntry::Food(food)))
    }

    pub(crate) fn add_virus(&mut self, position: Vec2, mass: f32) -> Option<u32> {
        if !self.has_room() {
            return None;
        }
        let id = self.next_id();
        let virus = Virus::new(id, position, mass, &self.curve);
        Some(self.insert(CellEntry::Virus(virus)))
    }

    /// Add an ejected pellet coasting along `direction` for `boost` units.
    pub(crate) fn add_eject(
        &mut self,
        owner: Option<PlayerId>,
        source: Option<u32>,
        position: Vec2,
        mass: f32,
        direction: Vec2,
        boost: f32,
    ) -> Option<u32> {
        if !self.has_room() {
            return None;
        }
        let id = self.next_id();
        let mut eject = EjectedMass::new(id, position, mass, owner, source, &self.curve);
        eject.data_mut().clamp_to(&self.border);
        eject.data_mut().set_boost(boost, direction);
        Some(self.insert(CellEntry::Eject(eject)))
    }

    /// Remove a cell from the world and the index.
    pub(crate) fn remove(&mut self, id: u32) -> Option<CellEntry> {
        let entry = self.cells.remove(&id)?;
        self.index.remove(id);
        match entry.data().kind() {
            CellKind::Player => self.player_cells.remove(id),
            CellKind::Food => self.food_cells.remove(id),
            CellKind::Virus => self.virus_cells.remove(id),
            CellKind::Ejected => self.eject_cells.remove(id),
        }
        self.moving.remove(id);
        Some(entry)
    }

    /// Set a cell's mass, recomputing its radius.
    pub(crate) fn set_mass(&mut self, id: u32, mass: f32) {
        let curve = self.curve;
        if let Some(entry) = self.cells.get_mut(&id) {
            entry.data_mut().set_mass(mass, &curve);
        }
    }

    /// Start a boost on a cell and track it as moving.
    pub(crate) fn set_boost(&mut self, id: u32, distance: f32, direction: Vec2) {
        if let Some(entry) = self.cells.get_mut(&id) {
            entry.data_mut().set_boost(distance, direction);
            if entry.data().boost().is_some() {
                self.moving.push(id);
            }
        }
    }

    /// Advance every boosted cell one step.
    pub(crate) fn step_boosts(&mut self, decay: f32) {
        let border = self.border;
        let moving: Vec<u32> = self.moving.as_slice().to_vec();
        for id in moving {
            let still_moving = self
                .cells
                .get_mut(&id)
                .is_some_and(|entry| entry.data_mut().step_boost(decay, &border));
            if !still_moving {
                self.moving.remove(id);
            }
        }
    }

    pub fn player_cells(&self) -> &[u32] {
        self.player_cells.as_slice()
    }

    pub fn food_cells(&self) -> &[u32] {
        self.food_cells.as_slice()
    }

    pub fn virus_cells(&self) -> &[u32] {
        self.virus_cells.as_slice()
    }

    pub fn eject_cells(&self) -> &[u32] {
        self.eject_cells.as_slice()
    }

    /// Get the count of each cell type.
    pub fn cell_counts(&self) -> CellCounts {
        CellCounts {
            players: self.player_cells.len(),
            food: self.food_cells.len(),
            viruses: self.virus_cells.len(),
            ejected: self.eject_cells.len(),
            total: self.cells.len(),
        }
    }

    /// Clamp every entity into the border and refresh its index entry.
    /// Runs once per tick after movement.
    pub(crate) fn rebuild_index(&mut self) {
        let border = self.border;
        for (&id, entry) in self.cells.iter_mut() {
            let data = entry.data_mut();
            data.clamp_to(&border);
            self.index.update(id, data.position(), data.radius());
        }
    }

    /// Ids of entities whose bounds intersect `region`. May contain
    /// false positives.
    pub fn query_region(&mut self, region: &Bounds) -> Vec<u32> {
        self.index.query_region(region)
    }

    /// Number of indexed entities.
    pub fn indexed_len(&self) -> usize {
        self.index.len()
    }

    pub fn is_indexed(&self, id: u32) -> bool {
        self.index.contains(id)
    }

    /// A random position where a circle of `radius` touches no player
    /// cell or virus. Falls back to the last sample when crowded.
    pub fn random_unoccupied_position(&mut self, radius: f32) -> Vec2 {
        let mut candidate = self.border.random_position(radius);
        for _ in 0..PLACEMENT_ATTEMPTS {
            let blocked = self
                .index
                .query_radius(candidate, radius)
                .into_iter()
                .filter_map(|id| self.cells.get(&id))
                .map(CellEntry::data)
                .filter(|d| matches!(d.kind(), CellKind::Player | CellKind::Virus))
                .any(|d| overlap(candidate, radius, d.position(), d.radius()).depth > 0.0);
            if !blocked {
                return candidate;
            }
            candidate = self.border.random_position(radius);
        }
        candidate
    }

    /// Spawn food toward `target`, at most `per_tick` at once.
    pub(crate) fn top_up_food(&mut self, target: usize, per_tick: usize, mass: f32) -> usize {
        let missing = target.saturating_sub(self.food_cells.len()).min(per_tick);
        let radius = self.curve.radius(mass);
        let mut spawned = 0;
        for _ in 0..missing {
            let position = self.random_unoccupied_position(radius);
            if self.add_food(position, mass).is_none() {
                break;
            }
            spawned += 1;
        }
        spawned
    }

    /// Spawn viruses toward `target`, at most `per_tick` at once.
    pub(crate) fn top_up_viruses(&mut self, target: usize, per_tick: usize, mass: f32) -> usize {
        let missing = target.saturating_sub(self.virus_cells.len()).min(per_tick);
        let radius = self.curve.radius(mass);
        let mut spawned = 0;
        for _ in 0..missing {
            let position = self.random_unoccupied_position(radius);
            if self.add_virus(position, mass).is_none() {
                break;
            }
            spawned += 1;
        }
        spawned
    }
}

/// Cell count statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellCounts {
    pub players: usize,
    pub food: usize,
    pub viruses: usize,
    pub ejected: usize,
    pub total: usize,
}
