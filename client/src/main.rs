mod input;
mod network;
mod reconcile;
mod rendering;

use clap::Parser;
use input::InputManager;
use log::{info, warn};
use macroquad::prelude::*;
use network::NetworkClient;
use ::rand::Rng;
use reconcile::{apply_delta, Reconciler};
use rendering::Renderer;
use shared::protocol::Packet;
use shared::{GameOptions, GameSimulation, PlayerId, TICKS_PER_SECOND, PROTOCOL_VERSION};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Pilot name (random callsign if omitted)
    #[arg(short, long, default_value = "")]
    name: String,

    /// Simulated round-trip latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Driftfire".to_string(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let name = if args.name.is_empty() {
        format!("Pilot{:03}", ::rand::thread_rng().gen_range(0..1000))
    } else {
        args.name.clone()
    };

    info!("connecting to {} as {}", args.server, name);
    if args.fake_ping > 0 {
        info!("simulating {}ms round-trip latency", args.fake_ping);
    }
    info!("controls: WASD move, mouse aim, LMB/Space fire, Shift dash, R reload, Enter spawn");

    let net = match NetworkClient::connect(&args.server, args.fake_ping) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("failed to start networking: {}", e);
            return;
        }
    };
    net.send(Packet::Connect {
        client_version: PROTOCOL_VERSION,
        name: name.clone(),
    });

    // The client mirrors the server's simulation and predicts only its own
    // ship; hits, phases, and hosts arrive over the wire.
    let mut game = GameSimulation::new(GameOptions::predicted());
    let mut reconciler = Reconciler::new();
    let mut input_manager = InputManager::new();
    let renderer = Renderer::new();

    let mut local_id: Option<PlayerId> = None;
    let mut ping_ms: f32 = 0.0;
    let mut last_ping_sent = Instant::now();
    let mut tick_accumulator: f32 = 0.0;
    let tick_seconds = 1.0 / TICKS_PER_SECOND;

    loop {
        // Decoded packets are applied synchronously, between ticks.
        for packet in net.poll() {
            match packet {
                Packet::Connected {
                    client_id,
                    map_index,
                    ..
                } => {
                    info!("connected as player {}", client_id);
                    local_id = Some(client_id);
                    game.set_map(map_index as usize);
                    game.add_player(client_id, &name).ok();
                }
                Packet::Disconnected { reason } => {
                    warn!("disconnected: {}", reason);
                    if let Some(id) = local_id.take() {
                        game.remove_player(id).ok();
                    }
                }
                Packet::Snapshot { tick, players, .. } => {
                    if let Some(player) = local_id.and_then(|id| game.players.get_mut(&id)) {
                        player.ping_ms = ping_ms;
                    }
                    reconciler.apply_snapshot(&mut game, local_id, tick, &players);
                }
                Packet::Deltas { deltas, .. } => {
                    for delta in &deltas {
                        apply_delta(&mut game, &mut reconciler, local_id, delta);
                    }
                }
                Packet::Pong { timestamp } => {
                    ping_ms = input::now_ms().saturating_sub(timestamp) as f32;
                }
                _ => {}
            }
        }

        if last_ping_sent.elapsed() >= Duration::from_secs(1) {
            net.send(Packet::Ping {
                timestamp: input::now_ms(),
            });
            last_ping_sent = Instant::now();
        }

        // Fixed-rate local simulation; the render loop below only reads.
        tick_accumulator += get_frame_time();
        while tick_accumulator >= tick_seconds {
            tick_accumulator -= tick_seconds;

            let (current, to_send) = input_manager.update();
            if let Some((sequence, timestamp, inputs)) = to_send {
                net.send(Packet::Input {
                    sequence,
                    timestamp,
                    ping_ms,
                    inputs,
                });
            }
            if let Some(id) = local_id {
                game.set_player_inputs(id, current.into());
            }
            game.update();
            // Local prediction events have no subscribers here.
            game.events.drain();
        }

        renderer.render(&game, local_id, ping_ms);

        if is_key_pressed(KeyCode::Escape) {
            net.send(Packet::Disconnect);
            break;
        }

        next_frame().await;
    }
}
