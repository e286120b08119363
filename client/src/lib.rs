//! Game client: input capture, prediction, reconciliation, rendering.
//!
//! The client runs its own copy of the shared simulation and applies local
//! inputs immediately, so the ship answers the stick with zero perceived
//! latency. Authoritative snapshots arriving one round trip later are
//! compared against the prediction history: agreements are discarded,
//! disagreements snap the ship back onto server truth (see [`reconcile`]).
//!
//! ## Modules
//!
//! - [`input`]: device sampling, movement/aim derivation, sequencing.
//! - [`network`]: UDP transport on a background thread; packets cross into
//!   the game loop over channels and are applied between ticks.
//! - [`reconcile`]: the prediction/correction core, plus delta application
//!   for everything the client does not predict.
//! - [`rendering`]: debug-quality macroquad view of the mirrored world.

pub mod input;
pub mod network;
pub mod reconcile;
pub mod rendering;
