//! Game state and main loop.
//!
//! `GameState` is owned by the loop task. Nothing else can reach the
//! world, so a tick runs start to finish without locks and every
//! mutation happens inside [`GameState::tick`].

use super::client::{OutboxError, Session};
use super::command::{sanitize_chat, validate_name, Command, CommandError, Inbound};
use super::leaderboard::{rank, LeaderboardState};
use super::snapshot::build_snapshot;
use crate::collision::{resolve_collisions, CollisionReport};
use crate::config::Config;
use crate::economy::{DepositGate, Settlement, SpawnGate, DEPOSIT_REQUIRED_MESSAGE};
use crate::entity::{Player, PlayerId, Role};
use crate::liveness::LivenessMonitor;
use crate::movement;
use crate::physics::MassCurve;
use crate::world::World;
use bytes::Bytes;
use glam::Vec2;
use protocol::packets::{self, CellRecord, ClientPacket, JoinKind, ServerStats};
use protocol::BinaryWriter;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Accepted viewport edge, in world units.
const MIN_VIEWPORT: u16 = 320;
const MAX_VIEWPORT: u16 = 4096;
/// Ticks between performance log lines.
const PERF_LOG_INTERVAL: u64 = 500;

const INVALID_NAME_REASON: &str = "Invalid username.";
const DUPLICATE_USER_REASON: &str = "Player ID is already connected.";

/// Summary of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub stale: usize,
    pub deaths: usize,
    pub food_spawned: usize,
    pub viruses_spawned: usize,
    pub leaderboard_sent: bool,
    pub snapshots: usize,
    pub dropped: usize,
}

/// The authoritative game state.
pub struct GameState {
    pub config: Config,
    pub world: World,
    /// Every connected session's player, keyed by connection id.
    pub players: BTreeMap<PlayerId, Player>,
    sessions: HashMap<PlayerId, Session>,
    pub tick_count: u64,
    liveness: LivenessMonitor,
    gate: Box<dyn SpawnGate>,
    /// Accounts the wallet side has confirmed a deposit for.
    deposits: HashSet<String>,
    settlements: Option<mpsc::UnboundedSender<Settlement>>,
    leaderboard: LeaderboardState,
    /// Smoothed tick duration in milliseconds.
    pub update_time_avg: f64,
}

impl GameState {
    /// Create a new game state.
    pub fn new(config: &Config) -> Self {
        let world = World::new(
            config.border.width,
            config.border.height,
            MassCurve::from_config(config),
            config.border.max_entities,
        );
        Self {
            config: config.clone(),
            world,
            players: BTreeMap::new(),
            sessions: HashMap::new(),
            tick_count: 0,
            liveness: LivenessMonitor::new(Duration::from_millis(config.liveness.heartbeat_timeout_ms)),
            gate: Box::new(DepositGate::new(config.economy.require_deposit)),
            deposits: HashSet::new(),
            settlements: None,
            leaderboard: LeaderboardState::new(config.leaderboard.interval_ticks),
            update_time_avg: 0.0,
        }
    }

    /// Replace the spawn gate.
    pub fn with_gate(mut self, gate: impl SpawnGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Send settlements for departing players to `tx`.
    pub fn with_settlements(mut self, tx: mpsc::UnboundedSender<Settlement>) -> Self {
        self.settlements = Some(tx);
        self
    }

    /// Fill the world to its food and virus targets.
    pub fn populate(&mut self) {
        let food = &self.config.food;
        let virus = &self.config.virus;
        self.world.top_up_food(food.target_count, food.target_count, food.mass);
        self.world.top_up_viruses(virus.target_count, virus.target_count, virus.mass);
        let counts = self.world.cell_counts();
        info!("World initialized: {} food, {} viruses", counts.food, counts.viruses);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Run one tick over the events received since the last one.
    pub fn tick(&mut self, events: Vec<Inbound>, now: Instant) -> TickReport {
        self.tick_count += 1;
        let tick = self.tick_count;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for event in events {
            self.intake(event, now);
        }

        // (a) liveness
        let stale = self.liveness.sweep(now, self.players.values());
        if !stale.is_empty() {
            let reason = self.liveness.kick_reason();
            for &id in &stale {
                info!("Client {} timed out", id);
                self.kick(id, &reason);
            }
        }
        report.stale = stale.len();

        // (b) queued commands
        self.apply_commands();

        // (c) movement
        movement::step_boosts(&mut self.world, &self.config);
        for player in self.players.values().filter(|p| p.is_alive()) {
            movement::move_player(&mut self.world, player, &self.config);
            movement::push_apart(&mut self.world, player, tick);
        }

        // (d) index
        self.world.rebuild_index();

        // (e) collisions
        let collisions = resolve_collisions(&mut self.world, &mut self.players, &self.config, tick);
        report.deaths = collisions.deaths.len();
        self.announce_deaths(&collisions);

        // (f) population
        let food = &self.config.food;
        let virus = &self.config.virus;
        report.food_spawned = self
            .world
            .top_up_food(food.target_count, food.spawn_per_tick, food.mass);
        report.viruses_spawned = self
            .world
            .top_up_viruses(virus.target_count, virus.spawn_per_tick, virus.mass);

        // (g) leaderboard
        let board = rank(&self.players, &self.world, self.config.leaderboard.size);
        if self.leaderboard.should_broadcast(&board, tick) {
            self.broadcast(packets::build_leaderboard(&board).finish(), None);
            report.leaderboard_sent = true;
        }

        // (h) snapshots
        for (id, player) in &self.players {
            let Some(snapshot) = build_snapshot(&mut self.world, &self.players, player, &self.config) else {
                continue;
            };
            if let Some(session) = self.sessions.get_mut(id) {
                session.send(packets::build_state_snapshot(&snapshot));
                report.snapshots += 1;
            }
        }

        report.dropped = self.drop_failed_sessions();
        report
    }

    fn intake(&mut self, event: Inbound, now: Instant) {
        match event {
            Inbound::Connected { id, addr, outbox } => {
                let viewport = Vec2::new(self.config.player.view_width, self.config.player.view_height);
                self.players.insert(id, Player::new(id, now, viewport));
                self.sessions.insert(id, Session::new(id, addr, outbox));
                info!("Client {} connected from {:?}", id, addr);
            }
            Inbound::Packet {
                id,
                packet,
                received_at,
            } => self.intake_packet(id, packet, received_at),
            Inbound::Disconnected { id } => {
                if self.players.contains_key(&id) {
                    info!("Client {} disconnected", id);
                    self.remove_player(id);
                }
            }
            Inbound::DepositConfirmed { user_id } => self.confirm_deposit(user_id),
        }
    }

    /// Targets and viewports are recorded on arrival; everything else
    /// waits in the session's queue for the command phase.
    fn intake_packet(&mut self, id: PlayerId, packet: ClientPacket, received_at: Instant) {
        let Some(player) = self.players.get_mut(&id) else {
            debug!("Packet for unknown client {}", id);
            return;
        };
        match packet {
            ClientPacket::TargetUpdate { target } => {
                player.heartbeat.refresh(received_at);
                if player.role == Role::Player {
                    player.target = target;
                }
            }
            ClientPacket::Viewport { width, height } => {
                let clamp = |v: u16| f32::from(v.clamp(MIN_VIEWPORT, MAX_VIEWPORT));
                player.viewport = Vec2::new(clamp(width), clamp(height));
            }
            packet => {
                let Some(command) = Command::from_packet(packet) else {
                    return;
                };
                let Some(session) = self.sessions.get_mut(&id) else {
                    return;
                };
                if session.pending.len() >= self.config.server.max_pending_commands {
                    debug!("Ignored command from client {}: {}", id, CommandError::QueueFull);
                    return;
                }
                session.pending.push_back(command);
            }
        }
    }

    fn confirm_deposit(&mut self, user_id: String) {
        info!("Deposit confirmed for account {}", user_id);
        let mut linked = Vec::new();
        for player in self.players.values_mut() {
            if player.economy.user_id.as_deref() == Some(user_id.as_str()) {
                player.economy.has_deposited = true;
                linked.push(player.id);
            }
        }
        for id in linked {
            self.send_to(id, packets::build_server_message("Deposit confirmed. You may now spawn."));
        }
        self.deposits.insert(user_id);
    }

    /// Apply every queued command, sessions in id order.
    fn apply_commands(&mut self) {
        let mut ids: Vec<PlayerId> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            while let Some(command) = self.sessions.get_mut(&id).and_then(|s| s.pending.pop_front()) {
                if let Err(e) = self.apply(id, command) {
                    debug!("Ignored command from client {}: {}", id, e);
                }
            }
        }
    }

    fn apply(&mut self, id: PlayerId, command: Command) -> Result<(), CommandError> {
        let role = self
            .players
            .get(&id)
            .map(|p| p.role)
            .ok_or(CommandError::UnknownSession(id))?;
        match command {
            Command::Join { kind, name, user_id } => self.join(id, kind, name, user_id),
            Command::Ping => {
                self.send_to(id, packets::build_pong());
                Ok(())
            }
            Command::Stats => {
                self.send_stats(id);
                Ok(())
            }
            _ if role == Role::Connecting => Err(CommandError::NotJoined),
            _ if role == Role::Spectator => Err(CommandError::Spectator),
            Command::Split => {
                let player = self
                    .players
                    .get_mut(&id)
                    .filter(|p| p.is_alive())
                    .ok_or(CommandError::NotAlive)?;
                movement::split_player(&mut self.world, player, &self.config, self.tick_count);
                Ok(())
            }
            Command::FireMass => {
                let player = self
                    .players
                    .get(&id)
                    .filter(|p| p.is_alive())
                    .ok_or(CommandError::NotAlive)?;
                movement::fire_mass(&mut self.world, player, &self.config, self.tick_count);
                Ok(())
            }
            Command::Respawn => {
                if self.players.get(&id).is_some_and(Player::is_alive) {
                    return Err(CommandError::StillAlive);
                }
                self.spawn(id);
                Ok(())
            }
            Command::Chat { message } => {
                self.chat(id, &message);
                Ok(())
            }
            Command::AdminAuth { password } => {
                self.admin_auth(id, &password);
                Ok(())
            }
            Command::AdminKick { name, reason } => {
                self.admin_kick(id, &name, &reason);
                Ok(())
            }
        }
    }

    fn join(
        &mut self,
        id: PlayerId,
        kind: JoinKind,
        name: String,
        user_id: Option<String>,
    ) -> Result<(), CommandError> {
        if self.players.get(&id).is_some_and(Player::is_joined) {
            return Err(CommandError::AlreadyJoined);
        }
        let name = match validate_name(&name, self.config.player.max_nick_length) {
            Ok(name) => name,
            Err(e) => {
                self.kick(id, INVALID_NAME_REASON);
                return Err(e);
            }
        };
        if let Some(uid) = user_id.as_deref() {
            let taken = self
                .players
                .values()
                .any(|p| p.id != id && p.economy.user_id.as_deref() == Some(uid));
            if taken {
                self.kick(id, DUPLICATE_USER_REASON);
                return Err(CommandError::DuplicateUser);
            }
        }

        let deposited = user_id.as_ref().is_some_and(|uid| self.deposits.contains(uid));
        let Some(player) = self.players.get_mut(&id) else {
            return Err(CommandError::UnknownSession(id));
        };
        player.name = name.clone();
        player.economy.user_id = user_id;
        player.economy.has_deposited = deposited;

        match kind {
            JoinKind::Spectator => {
                player.role = Role::Spectator;
                info!("Client {} is spectating as '{}'", id, name);
                let size = self.world.border.size();
                self.send_to(id, packets::build_welcome(id, size, &[]));
            }
            JoinKind::Player => {
                player.role = Role::Player;
                info!("Client {} joined as '{}'", id, name);
                self.broadcast(packets::build_player_joined(&name).finish(), Some(id));
                self.spawn(id);
            }
        }
        Ok(())
    }

    /// Spawn a fresh cell for `id`, or tell it a deposit is required.
    fn spawn(&mut self, id: PlayerId) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if !self.gate.can_spawn(player) {
            debug!("Spawn denied for client {}", id);
            self.send_to(id, packets::build_deposit_required(DEPOSIT_REQUIRED_MESSAGE));
            return;
        }

        let mass = self.config.player.start_mass;
        let radius = self.world.curve().radius(mass);
        let position = self.world.random_unoccupied_position(radius);
        let cell = self.world.add_player_cell(id, position, mass, self.tick_count);
        player.cells = vec![cell];
        player.target = Vec2::ZERO;

        let cells: Vec<CellRecord> = self
            .world
            .get(cell)
            .map(|entry| {
                let data = entry.data();
                CellRecord {
                    id: cell,
                    position: data.position(),
                    mass: data.mass(),
                    radius: data.radius(),
                }
            })
            .into_iter()
            .collect();
        let size = self.world.border.size();
        self.send_to(id, packets::build_welcome(id, size, &cells));
    }

    fn chat(&mut self, id: PlayerId, message: &str) {
        let Some(message) = sanitize_chat(message) else {
            return;
        };
        let Some(sender) = self.players.get(&id).map(|p| p.name.clone()) else {
            return;
        };
        info!("[Chat] {}: {}", sender, message);
        self.broadcast(packets::build_chat_message(&sender, &message).finish(), Some(id));
    }

    fn admin_auth(&mut self, id: PlayerId, password: &str) {
        let expected = self.config.server.admin_password.as_str();
        if expected.is_empty() || password != expected {
            let addr = self.sessions.get(&id).and_then(|s| s.addr);
            warn!("Failed admin login from client {} ({:?})", id, addr);
            self.send_to(id, packets::build_server_message("Password incorrect, attempt logged."));
            return;
        }
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.is_admin = true;
        let name = player.name.clone();
        info!("Client {} ({}) logged in as admin", id, name);
        self.send_to(id, packets::build_server_message(&format!("Welcome back {name}")));
        let notice = format!("{name} just logged in as an admin.");
        self.broadcast(packets::build_server_message(&notice).finish(), Some(id));
    }

    fn admin_kick(&mut self, id: PlayerId, name: &str, reason: &str) {
        let Some(admin) = self.players.get(&id).filter(|p| p.is_admin).map(|p| p.name.clone()) else {
            self.send_to(id, packets::build_server_message("You are not permitted to use this command."));
            return;
        };
        let target = self
            .players
            .values()
            .find(|p| p.is_joined() && !p.is_admin && p.name == name)
            .map(|p| p.id);
        let Some(target) = target else {
            self.send_to(id, packets::build_server_message("Could not locate user or user is an admin."));
            return;
        };
        info!("Client {} ({}) kicked by admin {}: {}", target, name, admin, reason);
        self.kick(target, reason);
        self.send_to(id, packets::build_server_message(&format!("User {name} was kicked by {admin}")));
    }

    fn send_stats(&mut self, id: PlayerId) {
        let (players, spectators) = self
            .players
            .values()
            .fold((0u32, 0u32), |(p, s), player| match player.role {
                Role::Player => (p + 1, s),
                Role::Spectator => (p, s + 1),
                Role::Connecting => (p, s),
            });
        let counts = self.world.cell_counts();
        let stats = ServerStats {
            players,
            spectators,
            food: counts.food as u32,
            viruses: counts.viruses as u32,
            ejected: counts.ejected as u32,
            tick: self.tick_count,
            avg_tick_ms: self.update_time_avg as f32,
        };
        self.send_to(id, packets::build_server_stat(&stats));
    }

    fn announce_deaths(&mut self, report: &CollisionReport) {
        for death in &report.deaths {
            let name_of = |id| self.players.get(&id).map(|p| p.name.clone()).unwrap_or_default();
            let (victim, eater) = (name_of(death.victim), name_of(death.eater));
            info!("{} was eaten by {}", victim, eater);
            self.send_to(death.victim, packets::build_died());
            self.broadcast(packets::build_player_eaten(&victim, &eater).finish(), None);
        }
    }

    /// Tell a client why it is leaving, then remove it.
    fn kick(&mut self, id: PlayerId, reason: &str) {
        self.send_to(id, packets::build_kicked(reason));
        self.remove_player(id);
    }

    /// Remove a player, its cells and its session. Dropping the session
    /// closes the socket once queued frames are flushed.
    fn remove_player(&mut self, id: PlayerId) {
        let Some(player) = self.players.remove(&id) else {
            return;
        };
        for &cell in &player.cells {
            self.world.remove(cell);
        }
        self.sessions.remove(&id);

        if let (Some(settlement), Some(tx)) = (Settlement::for_player(&player), &self.settlements) {
            info!(
                "Settling {:.4} for account {} (client {})",
                settlement.game_value, settlement.user_id, id
            );
            if tx.send(settlement).is_err() {
                warn!("Settlement for client {} dropped: receiver closed", id);
            }
        }
        if player.role == Role::Player {
            self.broadcast(packets::build_player_left(&player.name).finish(), None);
        }
    }

    fn drop_failed_sessions(&mut self) -> usize {
        let failed: Vec<(PlayerId, OutboxError)> = self
            .sessions
            .values()
            .filter_map(|s| s.failure().map(|e| (s.id, e)))
            .collect();
        for &(id, error) in &failed {
            match error {
                OutboxError::Full => warn!("Client {} cannot keep up, disconnecting", id),
                OutboxError::Closed => debug!("Client {} outbox closed", id),
            }
            self.remove_player(id);
        }
        failed.len()
    }

    fn send_to(&mut self, id: PlayerId, packet: BinaryWriter) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.send(packet);
        }
    }

    /// Send a frame to every joined session except `except`.
    fn broadcast(&mut self, frame: Bytes, except: Option<PlayerId>) {
        for (id, session) in self.sessions.iter_mut() {
            if Some(*id) == except || !self.players.get(id).is_some_and(Player::is_joined) {
                continue;
            }
            session.send_bytes(frame.clone());
        }
    }
}

/// Drive `state` at the configured period until the inbound channel
/// closes. An overrunning tick is logged and the next one starts right
/// away; missed ticks are not replayed.
pub async fn run_game_loop(mut state: GameState, mut inbound: mpsc::Receiver<Inbound>) {
    let period = state.config.tick_period();
    let budget_ms = period.as_secs_f64() * 1000.0;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    state.populate();

    loop {
        ticker.tick().await;

        let mut events = Vec::new();
        let mut closed = false;
        loop {
            match inbound.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        let started = Instant::now();
        let report = state.tick(events, started);
        let tick_ms = started.elapsed().as_secs_f64() * 1000.0;
        state.update_time_avg = state.update_time_avg * 0.5 + tick_ms * 0.5;

        if tick_ms > budget_ms {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} sessions, {} cells total",
                report.tick,
                tick_ms,
                budget_ms,
                state.session_count(),
                state.world.cell_counts().total
            );
        }
        if report.tick % PERF_LOG_INTERVAL == 0 {
            debug!(
                "Tick #{}: avg {:.3}ms, {} sessions, {} snapshots, {} cells",
                report.tick,
                state.update_time_avg,
                state.session_count(),
                report.snapshots,
                state.world.cell_counts().total
            );
        }

        if closed {
            info!("Inbound channel closed, stopping game loop");
            break;
        }
    }
}
