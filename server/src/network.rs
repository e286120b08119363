//! Server network layer: UDP transport, packet dispatch, and the fixed-rate
//! authoritative tick loop.
//!
//! The simulation itself never touches a socket. Decoded packets flow into
//! the main loop over channels, inputs are applied between ticks, and the
//! per-tick event queue is drained into wire deltas exactly once per tick.

use crate::client_manager::{ClientManager, QueuedInput};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::protocol::{snapshot_players, Packet, StateDelta};
use shared::{GameEvent, GamePhase, GameOptions, GameSimulation, PlayerId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Countdown length once the first client shows up.
const AUTO_COUNTDOWN_TICKS: u32 = 100;
/// Bot player ids start here, well above any client id the manager hands
/// out and below the bullet id range.
pub const BOT_ID_BASE: PlayerId = 60_000;

/// Messages sent from network tasks to the main server loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: PlayerId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the network sender task.
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

/// The authoritative server: socket, roster, and simulation.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: GameSimulation,
    tick_duration: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        map_index: usize,
        bots: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let mut game = GameSimulation::new(GameOptions::authoritative());
        game.set_map(map_index);
        seed_bots(&mut game, bots);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game,
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Spawns the task that listens for incoming datagrams.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        } else {
                            warn!("failed to decode packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing packet queue.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                                error!("failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns the task that sweeps out quiet connections.
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("failed to queue packet: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet }) {
            error!("failed to queue broadcast: {}", e);
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }
                info!("client connecting from {} ({})", addr, name);

                // A reconnect from the same address replaces the old entry.
                let existing = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing {
                    info!("replacing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(existing_id);
                    self.game.remove_player(existing_id).ok();
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                match client_id {
                    Some(client_id) => {
                        if let Err(e) = self.game.add_player(client_id, &name) {
                            error!("failed to register player {}: {}", client_id, e);
                            self.clients.write().await.remove_client(client_id);
                            self.send_packet(
                                Packet::Disconnected {
                                    reason: "registration failed".to_string(),
                                },
                                addr,
                            );
                            return;
                        }
                        self.send_packet(
                            Packet::Connected {
                                client_id,
                                map_index: self.game.map_index() as u32,
                                tick: self.game.tick_number,
                            },
                            addr,
                        );

                        // First arrival kicks off the match countdown.
                        if self.game.phase == GamePhase::Setup {
                            self.game.begin_countdown(AUTO_COUNTDOWN_TICKS);
                        }
                    }
                    None => {
                        self.send_packet(
                            Packet::Disconnected {
                                reason: "server full".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::Input {
                sequence,
                timestamp,
                ping_ms,
                inputs,
            } => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.add_input(
                        client_id,
                        QueuedInput {
                            sequence,
                            timestamp,
                            inputs,
                        },
                    );
                    clients.record_ping(client_id, ping_ms);
                }
                // Inputs from unknown addresses are stale; drop silently.
            }

            Packet::Ping { timestamp } => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(client_id) = client_id {
                    self.clients.write().await.touch(client_id);
                }
                self.send_packet(Packet::Pong { timestamp }, addr);
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.clients.write().await.remove_client(client_id);
                    self.game.remove_player(client_id).ok();
                }
            }

            _ => {
                warn!("unexpected packet type from {}", addr);
            }
        }
    }

    /// One authoritative tick: apply queued inputs, step the simulation,
    /// then flush deltas and snapshots to every client.
    async fn tick(&mut self) {
        let inputs = {
            let clients = self.clients.read().await;
            clients.get_chronological_inputs()
        };

        {
            let mut clients = self.clients.write().await;
            for (client_id, input) in inputs {
                self.game.set_player_inputs(client_id, input.inputs.into());
                clients.mark_input_processed(client_id, input.sequence);
            }
            clients.cleanup_processed_inputs();

            // Feed measured pings into lag compensation.
            for (client_id, _) in clients.get_client_addrs() {
                if let (Some(ping), Some(player)) = (
                    clients.ping_of(client_id),
                    self.game.players.get_mut(&client_id),
                ) {
                    player.ping_ms = ping;
                }
            }
        }

        self.game.update();

        let events = self.game.events.drain();
        let deltas = events_to_deltas(&self.game, &events);

        let client_addrs = {
            let clients = self.clients.read().await;
            clients.get_client_addrs()
        };
        if client_addrs.is_empty() {
            return;
        }

        if !deltas.is_empty() {
            for (client_id, addr) in &client_addrs {
                let filtered: Vec<StateDelta> = deltas
                    .iter()
                    .filter(|delta| !is_own_bullet(delta, *client_id))
                    .cloned()
                    .collect();
                if !filtered.is_empty() {
                    self.send_packet(
                        Packet::Deltas {
                            tick: self.game.tick_number,
                            deltas: filtered,
                        },
                        *addr,
                    );
                }
            }
        }

        let last_processed_input = {
            let clients = self.clients.read().await;
            clients.get_last_processed_inputs()
        };
        self.broadcast_packet(Packet::Snapshot {
            tick: self.game.tick_number,
            last_processed_input,
            players: snapshot_players(&self.game),
        });
    }

    /// Main server loop coordinating packets, ticks, and shutdown.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);

        info!(
            "server started: map '{}', {} bots",
            self.game.map().name,
            self.game.players.len()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("client {} timed out", client_id);
                            self.game.remove_player(client_id).ok();
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.tick().await;

                    if self.game.tick_number % 200 == 0 {
                        let clients = self.clients.read().await;
                        if !clients.is_empty() {
                            debug!(
                                "tick {}: {} clients, {} bullets live",
                                self.game.tick_number,
                                clients.len(),
                                self.game.bullets.alive_count(),
                            );
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("received ctrl-c, shutting down");
                    break;
                },
            }
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Registers `count` bot players with randomized ship classes.
fn seed_bots(game: &mut GameSimulation, count: usize) {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let class_count = shared::ship_classes().len();

    for i in 0..count {
        let id = BOT_ID_BASE + i as PlayerId;
        let name = format!("Unit{:02}", i);
        match game.add_player(id, &name) {
            Ok(player) => player.bot = true,
            Err(e) => {
                error!("failed to add bot {}: {}", id, e);
                continue;
            }
        }
        let class = rng.gen_range(0..class_count);
        game.set_player_ship(id, class).ok();
    }
}

/// Maps one tick's simulation events onto wire deltas.
///
/// Events that only matter to local observers (reload cues, idle flips)
/// stay off the wire; ammo and health ride the snapshot instead.
pub fn events_to_deltas(game: &GameSimulation, events: &[GameEvent]) -> Vec<StateDelta> {
    let mut deltas = Vec::new();

    for event in events {
        match event {
            GameEvent::AddPlayer { player } => {
                if let Some(p) = game.players.get(player) {
                    deltas.push(StateDelta::PlayerJoined {
                        id: *player,
                        name: p.name.clone(),
                        ship_index: p.ship_index as u32,
                    });
                }
            }
            GameEvent::RemovePlayer { player } => {
                deltas.push(StateDelta::PlayerLeft { id: *player });
            }
            GameEvent::PlayerSetShip { player, ship_index } => {
                deltas.push(StateDelta::PlayerShip {
                    id: *player,
                    ship_index: *ship_index as u32,
                });
            }
            GameEvent::PlayerSpawn { player } => {
                deltas.push(StateDelta::PlayerSpawned { id: *player });
            }
            GameEvent::PlayerDespawn { player } => {
                deltas.push(StateDelta::PlayerDespawned { id: *player });
            }
            GameEvent::SetHost { player } => {
                deltas.push(StateDelta::HostChanged { id: Some(*player) });
            }
            GameEvent::RemoveHost => {
                deltas.push(StateDelta::HostChanged { id: None });
            }
            GameEvent::PhaseChange { phase } => {
                deltas.push(StateDelta::PhaseChanged {
                    phase: *phase,
                    countdown: game.countdown,
                });
            }
            GameEvent::SetMap { map_index } => {
                deltas.push(StateDelta::MapChanged {
                    index: *map_index as u32,
                });
            }
            GameEvent::AddBullet { bullet, owner } => {
                // Kinematics come from the live body; a bullet destroyed in
                // the same tick it spawned has nothing worth mirroring.
                if let Some(body) = game.physics.body(*bullet) {
                    deltas.push(StateDelta::BulletSpawned {
                        owner: *owner,
                        x: body.position.x,
                        y: body.position.y,
                        vx: body.velocity.x,
                        vy: body.velocity.y,
                        radius: body.radius,
                    });
                }
            }
            GameEvent::DealDamage {
                target,
                attacker,
                amount,
            } => {
                deltas.push(StateDelta::DamageDealt {
                    target: *target,
                    attacker: *attacker,
                    amount: *amount,
                });
            }
            GameEvent::PlayerKill { killer, victim } => {
                deltas.push(StateDelta::PlayerKilled {
                    killer: *killer,
                    victim: *victim,
                });
                for id in [*killer, *victim] {
                    if let Some(p) = game.players.get(&id) {
                        deltas.push(StateDelta::ScoreUpdate {
                            id,
                            kills: p.score.kills,
                            assists: p.score.assists,
                            deaths: p.score.deaths,
                        });
                    }
                }
            }
            GameEvent::RemoveBullet { .. }
            | GameEvent::ReloadStart { .. }
            | GameEvent::ReloadEnd { .. }
            | GameEvent::PlayerIdleChange { .. }
            | GameEvent::SettingsChange => {}
        }
    }

    deltas
}

/// The shooter predicted its own shot; don't echo it back.
fn is_own_bullet(delta: &StateDelta, client_id: PlayerId) -> bool {
    matches!(delta, StateDelta::BulletSpawned { owner: Some(owner), .. } if *owner == client_id)
}
