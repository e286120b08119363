//! Client connection management and input queuing for the authoritative
//! server.
//!
//! The manager owns the roster of connected clients, buffers their inputs
//! in sequence order, and merges them chronologically across clients so the
//! simulation applies them deterministically. It also tracks each client's
//! self-reported ping for lag compensation and sweeps out connections that
//! go quiet.

use log::info;
use shared::protocol::NetInputs;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Connections quiet for longer than this are dropped.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// One buffered input with its ordering metadata.
#[derive(Debug, Clone)]
pub struct QueuedInput {
    pub sequence: u32,
    pub timestamp: u64,
    pub inputs: NetInputs,
}

/// A connected client and their pending input queue.
#[derive(Debug)]
pub struct Client {
    pub id: PlayerId,
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client.
    pub last_seen: Instant,
    /// Highest input sequence applied to the simulation.
    pub last_processed_input: u32,
    pub pending_inputs: Vec<QueuedInput>,
    /// Client-measured round trip in milliseconds.
    pub ping_ms: f32,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed_input: 0,
            pending_inputs: Vec::new(),
            ping_ms: 0.0,
        }
    }

    /// Buffers an input, keeping the queue sorted by sequence so
    /// out-of-order delivery doesn't reorder application.
    pub fn add_input(&mut self, input: QueuedInput) {
        self.last_seen = Instant::now();
        self.pending_inputs.push(input);
        self.pending_inputs.sort_by_key(|i| i.sequence);
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Roster of all connected clients with capacity enforcement.
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    next_client_id: PlayerId,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Admits a new client, returning its assigned id, or `None` at
    /// capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: PlayerId) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn add_input(&mut self, client_id: PlayerId, input: QueuedInput) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.add_input(input);
            true
        } else {
            false
        }
    }

    /// Marks any packet activity so timeouts don't fire on quiet-but-alive
    /// connections.
    pub fn touch(&mut self, client_id: PlayerId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    pub fn record_ping(&mut self, client_id: PlayerId, ping_ms: f32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.ping_ms = ping_ms.max(0.0);
        }
    }

    pub fn ping_of(&self, client_id: PlayerId) -> Option<f32> {
        self.clients.get(&client_id).map(|c| c.ping_ms)
    }

    /// All unprocessed inputs across all clients, ordered by timestamp.
    ///
    /// Cross-client timestamp ordering keeps input application fair and
    /// deterministic regardless of which socket read happened first.
    pub fn get_chronological_inputs(&self) -> Vec<(PlayerId, QueuedInput)> {
        let mut all_inputs: Vec<(PlayerId, QueuedInput)> = Vec::new();

        for (client_id, client) in &self.clients {
            for input in &client.pending_inputs {
                if input.sequence > client.last_processed_input {
                    all_inputs.push((*client_id, input.clone()));
                }
            }
        }

        all_inputs.sort_by_key(|(_, input)| input.timestamp);
        all_inputs
    }

    pub fn mark_input_processed(&mut self, client_id: PlayerId, sequence: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_processed_input = client.last_processed_input.max(sequence);
        }
    }

    /// Drops inputs that have already been applied.
    pub fn cleanup_processed_inputs(&mut self) {
        for client in self.clients.values_mut() {
            client
                .pending_inputs
                .retain(|input| input.sequence > client.last_processed_input);
        }
    }

    /// Per-client highest applied sequence, sent back for reconciliation.
    pub fn get_last_processed_inputs(&self) -> HashMap<PlayerId, u32> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.last_processed_input))
            .collect()
    }

    /// Removes and returns every timed-out client id.
    pub fn check_timeouts(&mut self) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(*client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().expect("valid address")
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().expect("valid address")
    }

    fn input(sequence: u32, timestamp: u64) -> QueuedInput {
        QueuedInput {
            sequence,
            timestamp,
            inputs: NetInputs {
                movement_angle: 0.0,
                movement_amount: 0.0,
                aim_rotation: 0.0,
                use_weapon: false,
                use_tactical: false,
                do_reload: false,
                spawn: false,
            },
        }
    }

    #[test]
    fn test_add_client_assigns_sequential_ids() {
        let mut manager = ClientManager::new(3);
        assert_eq!(manager.add_client(test_addr()), Some(1));
        assert_eq!(manager.add_client(test_addr2()), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_capacity_enforced() {
        let mut manager = ClientManager::new(1);
        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).expect("admitted");
        assert!(manager.remove_client(id));
        assert!(!manager.remove_client(id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).expect("admitted");
        assert_eq!(manager.find_client_by_addr(test_addr()), Some(id));
        assert_eq!(manager.find_client_by_addr(test_addr2()), None);
    }

    #[test]
    fn test_inputs_sorted_by_sequence_within_client() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).expect("admitted");

        manager.add_input(id, input(2, 100));
        manager.add_input(id, input(1, 50));

        let inputs = manager.get_chronological_inputs();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].1.sequence, 1);
        assert_eq!(inputs[1].1.sequence, 2);
    }

    #[test]
    fn test_chronological_merge_across_clients() {
        let mut manager = ClientManager::new(3);
        let a = manager.add_client(test_addr()).expect("admitted");
        let b = manager.add_client(test_addr2()).expect("admitted");

        manager.add_input(a, input(1, 300));
        manager.add_input(b, input(1, 100));
        manager.add_input(a, input(2, 200));

        let inputs = manager.get_chronological_inputs();
        let timestamps: Vec<u64> = inputs.iter().map(|(_, i)| i.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn test_processed_inputs_excluded_and_cleaned() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).expect("admitted");

        manager.add_input(id, input(1, 10));
        manager.add_input(id, input(2, 20));
        manager.mark_input_processed(id, 1);

        let inputs = manager.get_chronological_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].1.sequence, 2);

        manager.cleanup_processed_inputs();
        let last = manager.get_last_processed_inputs();
        assert_eq!(last.get(&id), Some(&1));
    }

    #[test]
    fn test_mark_processed_never_regresses() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).expect("admitted");

        manager.mark_input_processed(id, 5);
        manager.mark_input_processed(id, 3);
        assert_eq!(manager.get_last_processed_inputs().get(&id), Some(&5));
    }

    #[test]
    fn test_timeout_sweep() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).expect("admitted");

        assert!(manager.check_timeouts().is_empty());

        if let Some(client) = manager.clients.get_mut(&id) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }
        assert_eq!(manager.check_timeouts(), vec![id]);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_ping_recording_clamps_negative() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).expect("admitted");

        manager.record_ping(id, 120.0);
        assert_eq!(manager.ping_of(id), Some(120.0));

        manager.record_ping(id, -5.0);
        assert_eq!(manager.ping_of(id), Some(0.0));
    }
}
