//! Authoritative server for the arena shooter.
//!
//! The server owns the only simulation that counts. Clients predict, but
//! every gameplay outcome (hits, kills, scores, phases) is decided here and
//! streamed back out as tick-tagged snapshots and deltas.
//!
//! ## Architecture
//!
//! A single-threaded main loop (`network::Server::run`) multiplexes three
//! event sources with `tokio::select!`:
//!
//! - decoded packets forwarded by the receiver task,
//! - timeout notices from the connection sweeper,
//! - the fixed-rate tick timer.
//!
//! All simulation mutation happens on this loop between ticks; the network
//! tasks only move packets. That makes the tick body a plain synchronous
//! call chain into the shared simulation with no interleaving to reason
//! about.
//!
//! ## Modules
//!
//! - [`client_manager`]: connection roster, sequenced input queues, ping
//!   tracking, timeout sweeps.
//! - [`network`]: UDP transport, packet dispatch, the tick loop, and the
//!   event-to-delta mapping (including per-client bullet-echo filtering).

pub mod client_manager;
pub mod network;
