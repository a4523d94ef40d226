//! Per-operation tiling for the npucl lowering pipeline.
//!
//! Splits an operation's output into tiles whose working set fits the
//! accelerator's local memory, back-infers the input tile each output tile
//! needs, and adjusts position-dependent attributes into each tile's local
//! frame. Everything is computed by value from the operation's current
//! state; no shared mutable state exists across calls.

mod error;
mod logger;
mod pass;
mod policy;
mod strategy;
mod tile;

pub use error::*;
pub use logger::*;
pub use pass::*;
pub use policy::*;
pub use strategy::*;
pub use tile::*;
