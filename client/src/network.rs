//! Client-side UDP transport.
//!
//! macroquad owns the main thread, so the socket lives on a background
//! thread running a small tokio runtime. Decoded packets cross back over a
//! channel and are handed to the simulation synchronously between ticks;
//! the game loop never blocks on the network.

use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::protocol::Packet;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub struct NetworkClient {
    outbound: mpsc::UnboundedSender<Packet>,
    inbound: std_mpsc::Receiver<Packet>,
}

impl NetworkClient {
    /// Binds a socket and starts the transport thread. `fake_ping_ms` adds
    /// artificial symmetric latency for testing prediction under lag.
    pub fn connect(
        server_addr: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: std::net::SocketAddr = server_addr.parse()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Packet>();
        let (inbound_tx, inbound_rx) = std_mpsc::channel::<Packet>();

        thread::Builder::new()
            .name("net-transport".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("failed to build transport runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(transport_loop(
                    server_addr,
                    fake_ping_ms,
                    outbound_rx,
                    inbound_tx,
                ));
            })?;

        info!("transport started toward {}", server_addr);
        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }

    /// Queues a packet for transmission.
    pub fn send(&self, packet: Packet) {
        if self.outbound.send(packet).is_err() {
            warn!("transport thread gone; packet dropped");
        }
    }

    /// Drains every packet received since the last poll.
    pub fn poll(&self) -> Vec<Packet> {
        self.inbound.try_iter().collect()
    }
}

async fn transport_loop(
    server_addr: std::net::SocketAddr,
    fake_ping_ms: u64,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
    inbound: std_mpsc::Sender<Packet>,
) {
    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(e) => {
            error!("failed to bind client socket: {}", e);
            return;
        }
    };

    let mut buffer = [0u8; 65536];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, addr)) => {
                        if addr != server_addr {
                            continue;
                        }
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if fake_ping_ms > 0 {
                                sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                            }
                            if inbound.send(packet).is_err() {
                                // Game loop dropped the receiver; shut down.
                                return;
                            }
                        } else {
                            warn!("failed to decode packet from server");
                        }
                    }
                    Err(e) => {
                        error!("error receiving packet: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                }
            },

            packet = outbound.recv() => {
                let Some(packet) = packet else {
                    return;
                };
                if fake_ping_ms > 0 {
                    sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                }
                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, server_addr).await {
                            error!("failed to send packet: {}", e);
                        }
                    }
                    Err(e) => error!("failed to encode packet: {}", e),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_round_trip_against_echo_server() {
        // Stand-in server that echoes one datagram back.
        let server = UdpSocket::bind("127.0.0.1:0").await.expect("bind server");
        let server_addr = server.local_addr().expect("server addr");
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            if let Ok((len, addr)) = server.recv_from(&mut buf).await {
                let _ = server.send_to(&buf[..len], addr).await;
            }
        });

        let client = NetworkClient::connect(&server_addr.to_string(), 0).expect("connect");
        client.send(Packet::Ping { timestamp: 7 });

        // Give the echo a moment to come back.
        let mut received = Vec::new();
        for _ in 0..50 {
            received = client.poll();
            if !received.is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(received.len(), 1);
        assert!(matches!(received[0], Packet::Ping { timestamp: 7 }));
    }
}
