//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub border: BorderConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub food: FoodConfig,
    #[serde(default)]
    pub virus: VirusConfig,
    #[serde(default)]
    pub eject: EjectConfig,
    #[serde(default)]
    pub collision: CollisionConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml_str(&contents)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }

    /// Parse a (possibly partial) TOML document. Missing keys take defaults.
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Tick period as a duration.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.server.tick_interval_ms.max(1))
    }

    /// Tick period in seconds, used to scale per-second speeds.
    pub fn tick_seconds(&self) -> f32 {
        self.tick_period().as_secs_f32()
    }

    /// Converts a millisecond span into whole ticks, rounding up.
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        let period = self.server.tick_interval_ms.max(1);
        ms.div_ceil(period)
    }
}

/// Server networking and general settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connections per IP limit.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: usize,
    /// Tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Frames buffered per client before it counts as too slow.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Capacity of the gateway -> simulation command queue.
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
    /// Commands a single session may have pending in one tick.
    #[serde(default = "default_max_pending_commands")]
    pub max_pending_commands: usize,
    /// Time a new socket gets to finish the WebSocket handshake.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
    /// Admin password (empty = admin login disabled).
    #[serde(default)]
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            ip_limit: default_ip_limit(),
            tick_interval_ms: default_tick_interval(),
            outbound_buffer: default_outbound_buffer(),
            command_queue: default_command_queue(),
            max_pending_commands: default_max_pending_commands(),
            handshake_timeout_ms: default_handshake_timeout(),
            admin_password: String::new(),
        }
    }
}

fn default_port() -> u16 {
    3000
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    100
}
fn default_ip_limit() -> usize {
    10
}
fn default_tick_interval() -> u64 {
    60
}
fn default_outbound_buffer() -> usize {
    64
}
fn default_command_queue() -> usize {
    4096
}
fn default_max_pending_commands() -> usize {
    32
}
fn default_handshake_timeout() -> u64 {
    5000
}

/// World border configuration. The world spans `0..width` x `0..height`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BorderConfig {
    #[serde(default = "default_border_size")]
    pub width: f32,
    #[serde(default = "default_border_size")]
    pub height: f32,
    /// Hard cap on live entities of every kind.
    #[serde(default = "default_max_entities")]
    pub max_entities: usize,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            width: default_border_size(),
            height: default_border_size(),
            max_entities: default_max_entities(),
        }
    }
}

fn default_border_size() -> f32 {
    5000.0
}
fn default_max_entities() -> usize {
    20_000
}

/// Player configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Mass of a freshly spawned cell.
    #[serde(default = "default_player_start_mass")]
    pub start_mass: f32,
    /// Cells below this mass cannot split.
    #[serde(default = "default_player_min_split_mass")]
    pub min_split_mass: f32,
    #[serde(default = "default_player_max_cells")]
    pub max_cells: usize,
    /// Distance a split-off cell coasts before it is steered again.
    #[serde(default = "default_player_split_boost")]
    pub split_boost: f32,
    /// Time after a split before sibling cells may merge.
    #[serde(default = "default_player_merge_cooldown")]
    pub merge_cooldown_ms: u64,
    #[serde(default = "default_max_nick_length")]
    pub max_nick_length: usize,
    /// Viewport assumed until the client reports its screen size.
    #[serde(default = "default_view_width")]
    pub view_width: f32,
    #[serde(default = "default_view_height")]
    pub view_height: f32,
    /// Extra border around the viewport included in snapshots.
    #[serde(default = "default_view_margin")]
    pub view_margin: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_mass: default_player_start_mass(),
            min_split_mass: default_player_min_split_mass(),
            max_cells: default_player_max_cells(),
            split_boost: default_player_split_boost(),
            merge_cooldown_ms: default_player_merge_cooldown(),
            max_nick_length: default_max_nick_length(),
            view_width: default_view_width(),
            view_height: default_view_height(),
            view_margin: default_view_margin(),
        }
    }
}

fn default_player_start_mass() -> f32 {
    10.0
}
fn default_player_min_split_mass() -> f32 {
    20.0
}
fn default_player_max_cells() -> usize {
    16
}
fn default_player_split_boost() -> f32 {
    400.0
}
fn default_player_merge_cooldown() -> u64 {
    15_000
}
fn default_max_nick_length() -> usize {
    25
}
fn default_view_width() -> f32 {
    1920.0
}
fn default_view_height() -> f32 {
    1080.0
}
fn default_view_margin() -> f32 {
    20.0
}

/// Mass-to-radius and mass-to-speed curve parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MovementConfig {
    /// radius = radius_base + sqrt(mass) * radius_scale
    #[serde(default = "default_radius_base")]
    pub radius_base: f32,
    #[serde(default = "default_radius_scale")]
    pub radius_scale: f32,
    /// Speed of a start-mass cell, in world units per second.
    #[serde(default = "default_base_speed")]
    pub base_speed: f32,
    /// Logarithm base of the slowdown curve.
    #[serde(default = "default_slow_base")]
    pub slow_base: f32,
    #[serde(default = "default_min_speed")]
    pub min_speed: f32,
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    /// Cells ease off when this close (plus their radius) to the target.
    #[serde(default = "default_min_target_distance")]
    pub min_target_distance: f32,
    /// Fraction of the remaining boost distance travelled each tick.
    #[serde(default = "default_boost_decay")]
    pub boost_decay: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            radius_base: default_radius_base(),
            radius_scale: default_radius_scale(),
            base_speed: default_base_speed(),
            slow_base: default_slow_base(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            min_target_distance: default_min_target_distance(),
            boost_decay: default_boost_decay(),
        }
    }
}

fn default_radius_base() -> f32 {
    4.0
}
fn default_radius_scale() -> f32 {
    6.0
}
fn default_base_speed() -> f32 {
    375.0
}
fn default_slow_base() -> f32 {
    4.5
}
fn default_min_speed() -> f32 {
    60.0
}
fn default_max_speed() -> f32 {
    600.0
}
fn default_min_target_distance() -> f32 {
    50.0
}
fn default_boost_decay() -> f32 {
    0.1
}

/// Food configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FoodConfig {
    /// Population the scheduler tops up to.
    #[serde(default = "default_food_target")]
    pub target_count: usize,
    #[serde(default = "default_food_mass")]
    pub mass: f32,
    /// Most food spawned in a single tick.
    #[serde(default = "default_food_spawn_per_tick")]
    pub spawn_per_tick: usize,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            target_count: default_food_target(),
            mass: default_food_mass(),
            spawn_per_tick: default_food_spawn_per_tick(),
        }
    }
}

fn default_food_target() -> usize {
    1000
}
fn default_food_mass() -> f32 {
    1.0
}
fn default_food_spawn_per_tick() -> usize {
    50
}

/// Virus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirusConfig {
    #[serde(default = "default_virus_target")]
    pub target_count: usize,
    #[serde(default = "default_virus_mass")]
    pub mass: f32,
    #[serde(default = "default_virus_spawn_per_tick")]
    pub spawn_per_tick: usize,
    /// A cell at least this many times the virus mass absorbs it.
    #[serde(default = "default_virus_consume_ratio")]
    pub consume_ratio: f32,
    /// A cell at least this many times the virus mass is split by it.
    #[serde(default = "default_virus_split_trigger_ratio")]
    pub split_trigger_ratio: f32,
    /// Overlap fraction needed before a virus reacts at all.
    #[serde(default = "default_virus_split_trigger_overlap")]
    pub split_trigger_overlap: f32,
}

impl Default for VirusConfig {
    fn default() -> Self {
        Self {
            target_count: default_virus_target(),
            mass: default_virus_mass(),
            spawn_per_tick: default_virus_spawn_per_tick(),
            consume_ratio: default_virus_consume_ratio(),
            split_trigger_ratio: default_virus_split_trigger_ratio(),
            split_trigger_overlap: default_virus_split_trigger_overlap(),
        }
    }
}

fn default_virus_target() -> usize {
    50
}
fn default_virus_mass() -> f32 {
    100.0
}
fn default_virus_spawn_per_tick() -> usize {
    5
}
fn default_virus_consume_ratio() -> f32 {
    4.0
}
fn default_virus_split_trigger_ratio() -> f32 {
    1.0
}
fn default_virus_split_trigger_overlap() -> f32 {
    0.5
}

/// Ejected mass configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EjectConfig {
    /// Mass of one pellet (and the mass the firing cell loses).
    #[serde(default = "default_eject_mass")]
    pub mass: f32,
    /// The firing cell must keep at least this much mass.
    #[serde(default = "default_eject_min_remaining")]
    pub min_remaining_mass: f32,
    /// Distance a pellet coasts before coming to rest.
    #[serde(default = "default_eject_boost")]
    pub boost: f32,
}

impl Default for EjectConfig {
    fn default() -> Self {
        Self {
            mass: default_eject_mass(),
            min_remaining_mass: default_eject_min_remaining(),
            boost: default_eject_boost(),
        }
    }
}

fn default_eject_mass() -> f32 {
    20.0
}
fn default_eject_min_remaining() -> f32 {
    10.0
}
fn default_eject_boost() -> f32 {
    600.0
}

/// Eat and merge thresholds.
///
/// Overlap fractions measure how far the smaller circle's diameter has
/// sunk into the larger one: 0.5 means its centre is inside, 1.0 means
/// it is fully covered.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollisionConfig {
    /// Larger cell must be at least this many times the smaller's mass.
    #[serde(default = "default_eat_ratio")]
    pub eat_ratio: f32,
    #[serde(default = "default_cell_overlap")]
    pub cell_overlap: f32,
    /// Food and pellets are eaten when the eater exceeds them by this factor.
    #[serde(default = "default_food_eat_ratio")]
    pub food_eat_ratio: f32,
    #[serde(default = "default_food_overlap")]
    pub food_overlap: f32,
    #[serde(default = "default_merge_overlap")]
    pub merge_overlap: f32,
    /// Fraction of an eaten player cell's mass that is lost instead of gained.
    #[serde(default)]
    pub eat_loss: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            eat_ratio: default_eat_ratio(),
            cell_overlap: default_cell_overlap(),
            food_eat_ratio: default_food_eat_ratio(),
            food_overlap: default_food_overlap(),
            merge_overlap: default_merge_overlap(),
            eat_loss: 0.0,
        }
    }
}

fn default_eat_ratio() -> f32 {
    1.25
}
fn default_cell_overlap() -> f32 {
    0.5
}
fn default_food_eat_ratio() -> f32 {
    1.1
}
fn default_food_overlap() -> f32 {
    0.5
}
fn default_merge_overlap() -> f32 {
    0.5
}

/// Heartbeat settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessConfig {
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: default_heartbeat_timeout(),
        }
    }
}

fn default_heartbeat_timeout() -> u64 {
    5000
}

/// Boundary to the external wallet subsystem.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EconomyConfig {
    /// Refuse spawns until the linked account has made its deposit.
    #[serde(default)]
    pub require_deposit: bool,
    /// Game value credited per unit of player mass eaten.
    #[serde(default = "default_value_per_mass")]
    pub value_per_mass: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            require_deposit: false,
            value_per_mass: default_value_per_mass(),
        }
    }
}

fn default_value_per_mass() -> f64 {
    0.01
}

/// Leaderboard settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_leaderboard_size")]
    pub size: usize,
    /// Minimum ticks between two leaderboard broadcasts.
    #[serde(default = "default_leaderboard_interval")]
    pub interval_ticks: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            size: default_leaderboard_size(),
            interval_ticks: default_leaderboard_interval(),
        }
    }
}

fn default_leaderboard_size() -> usize {
    10
}
fn default_leaderboard_interval() -> u64 {
    16
}
