//! WebSocket gateway.
//!
//! Every connection runs one task that parses inbound frames into
//! [`Inbound`] events for the game loop and writes whatever the loop
//! pushes into the connection's [`Outbox`]. The simulation itself lives
//! in [`game`] and is never touched from here.

pub mod client;
pub mod command;
pub mod game;
pub mod leaderboard;
pub mod snapshot;

pub use client::{Outbox, OutboxError, Session};
pub use command::{Command, CommandError, Inbound};
pub use game::{run_game_loop, GameState, TickReport};

use crate::config::Config;
use crate::economy::Settlement;
use futures_util::{SinkExt, StreamExt};
use protocol::packets::ClientPacket;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Connection tracking shared by the accept loop and connection tasks.
struct ConnectionState {
    ip_connections: HashMap<IpAddr, usize>,
    total_connections: usize,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            ip_connections: HashMap::new(),
            total_connections: 0,
        }
    }

    /// Register a connection if both limits allow it.
    fn try_add_connection(&mut self, ip: IpAddr, max_total: usize, max_per_ip: usize) -> bool {
        if self.total_connections >= max_total {
            return false;
        }
        let current = self.ip_connections.get(&ip).copied().unwrap_or(0);
        if current >= max_per_ip {
            return false;
        }
        *self.ip_connections.entry(ip).or_insert(0) += 1;
        self.total_connections += 1;
        true
    }

    fn remove_connection(&mut self, ip: IpAddr) {
        if let Some(count) = self.ip_connections.get_mut(&ip) {
            if *count > 0 {
                *count -= 1;
                self.total_connections = self.total_connections.saturating_sub(1);
            }
            if *count == 0 {
                self.ip_connections.remove(&ip);
            }
        }
    }
}

/// Cheap cloneable handle to a running game loop.
#[derive(Debug, Clone)]
pub struct GameHandle {
    commands: mpsc::Sender<Inbound>,
    next_id: Arc<AtomicU32>,
}

impl GameHandle {
    pub fn new(commands: mpsc::Sender<Inbound>) -> Self {
        Self {
            commands,
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Tell the game that an external account has paid its deposit.
    pub async fn confirm_deposit(&self, user_id: impl Into<String>) -> anyhow::Result<()> {
        self.commands
            .send(Inbound::DepositConfirmed {
                user_id: user_id.into(),
            })
            .await?;
        Ok(())
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Spawn the game loop. Settlements of departing linked players arrive
/// on the returned receiver.
pub fn start_game(config: &Config) -> (GameHandle, mpsc::UnboundedReceiver<Settlement>) {
    let (tx, rx) = mpsc::channel(config.server.command_queue);
    let (settle_tx, settle_rx) = mpsc::unbounded_channel();
    let state = GameState::new(config).with_settlements(settle_tx);
    tokio::spawn(run_game_loop(state, rx));
    (GameHandle::new(tx), settle_rx)
}

/// Run the game server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    let (game, mut settlements) = start_game(&config);
    tokio::spawn(async move {
        while let Some(settlement) = settlements.recv().await {
            info!(
                "Settlement for account {}: {:.4}",
                settlement.user_id, settlement.game_value
            );
        }
    });

    serve(listener, &config, game).await
}

/// Accept connections on `listener` until it fails.
pub async fn serve(listener: TcpListener, config: &Config, game: GameHandle) -> anyhow::Result<()> {
    let conn_state = Arc::new(RwLock::new(ConnectionState::new()));
    let max_connections = config.server.max_connections;
    let ip_limit = config.server.ip_limit;
    let buffer = config.server.outbound_buffer;
    let handshake = Duration::from_millis(config.server.handshake_timeout_ms);

    loop {
        let (stream, addr) = listener.accept().await?;

        // Limits are enforced before the WebSocket handshake.
        if !conn_state
            .write()
            .await
            .try_add_connection(addr.ip(), max_connections, ip_limit)
        {
            warn!("Connection rejected (limit reached): {}", addr);
            continue;
        }

        let game = game.clone();
        let conn_state = Arc::clone(&conn_state);
        tokio::spawn(async move {
            let result = handle_connection(stream, addr, game, buffer, handshake).await;
            conn_state.write().await.remove_connection(addr.ip());
            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    game: GameHandle,
    buffer: usize,
    handshake: Duration,
) -> anyhow::Result<()> {
    let ws_stream = timeout(handshake, accept_async(stream))
        .await
        .map_err(|_| anyhow::anyhow!("handshake timed out after {:?}", handshake))??;
    let id = game.next_id();
    info!("New connection from {} (client {})", addr, id);

    let (mut write, mut read) = ws_stream.split();
    let (outbox, mut outbound) = Outbox::channel(buffer);
    game.commands
        .send(Inbound::Connected {
            id,
            addr: Some(addr),
            outbox,
        })
        .await?;

    let result = async {
        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Binary(data))) => match ClientPacket::parse(&data) {
                        Ok(packet) => {
                            game.commands
                                .send(Inbound::Packet {
                                    id,
                                    packet,
                                    received_at: Instant::now(),
                                })
                                .await?;
                        }
                        Err(e) => warn!("Packet error from {}: {}", addr, e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(anyhow::Error::from(e)),
                },
                frame = outbound.recv() => match frame {
                    Some(frame) => write.send(Message::Binary(frame)).await?,
                    None => {
                        // The game dropped this session.
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
            }
        }
        anyhow::Ok(())
    }
    .await;

    let _ = game.commands.send(Inbound::Disconnected { id }).await;
    debug!("Client {} ({}) connection closed", id, addr);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use protocol::packets::JoinKind;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.server.tick_interval_ms = 20;
        config.food.target_count = 10;
        config.virus.target_count = 2;
        config
    }

    async fn start(config: Config) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (game, _settlements) = start_game(&config);
        tokio::spawn(async move { serve(listener, &config, game).await });
        addr
    }

    async fn send(ws: &mut Socket, packet: ClientPacket) {
        let frame: Bytes = packet.encode().finish();
        ws.send(Message::Binary(frame)).await.unwrap();
    }

    /// Read binary frames until one starts with `opcode`.
    async fn wait_for(ws: &mut Socket, opcode: u8) -> Bytes {
        timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Binary(data))) if data.first() == Some(&opcode) => {
                        return data;
                    }
                    Some(Ok(_)) => {}
                    other => panic!("connection ended: {other:?}"),
                }
            }
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_connection_limits() {
        let mut state = ConnectionState::new();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(state.try_add_connection(a, 3, 2));
        assert!(state.try_add_connection(a, 3, 2));
        assert!(!state.try_add_connection(a, 3, 2));
        assert!(state.try_add_connection(b, 3, 2));
        assert!(!state.try_add_connection(b, 3, 2));

        state.remove_connection(a);
        assert!(state.try_add_connection(b, 3, 2));
        assert_eq!(state.total_connections, 3);
    }

    #[tokio::test]
    async fn test_join_receives_welcome_then_snapshots() {
        let addr = start(test_config()).await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        send(
            &mut ws,
            ClientPacket::Join {
                kind: JoinKind::Player,
                name: "bob".into(),
                user_id: None,
            },
        )
        .await;

        let welcome = wait_for(&mut ws, 0x01).await;
        assert!(welcome.len() > 15);
        wait_for(&mut ws, 0x10).await;
    }

    #[tokio::test]
    async fn test_malformed_frame_is_ignored() {
        let addr = start(test_config()).await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        ws.send(Message::Binary(Bytes::from_static(&[0xAB, 0x01])))
            .await
            .unwrap();
        send(&mut ws, ClientPacket::Ping).await;
        let pong = wait_for(&mut ws, 0x32).await;
        assert_eq!(pong.len(), 1);
    }

    #[tokio::test]
    async fn test_connection_cap_rejects_before_handshake() {
        let mut config = test_config();
        config.server.max_connections = 1;
        let addr = start(config).await;
        let (_first, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        assert!(connect_async(format!("ws://{addr}")).await.is_err());
    }

    #[tokio::test]
    async fn test_stalled_handshake_frees_its_slot() {
        let mut config = test_config();
        config.server.max_connections = 1;
        config.server.handshake_timeout_ms = 100;
        let addr = start(config).await;

        // Plain TCP that never upgrades.
        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        send(&mut ws, ClientPacket::Ping).await;
        wait_for(&mut ws, 0x32).await;
    }

    #[tokio::test]
    async fn test_confirm_deposit_reaches_loop() {
        let mut config = test_config();
        config.economy.require_deposit = true;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (game, _settlements) = start_game(&config);
        let handle = game.clone();
        tokio::spawn(async move { serve(listener, &config, game).await });

        handle.confirm_deposit("acct-1").await.unwrap();
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        send(
            &mut ws,
            ClientPacket::Join {
                kind: JoinKind::Player,
                name: "payer".into(),
                user_id: Some("acct-1".into()),
            },
        )
        .await;
        wait_for(&mut ws, 0x01).await;
    }
}
