//! Front-end engine for the certification test service.
//!
//! The engine is a pure client: it discovers the service's object
//! hierarchy, resolves which jobs the enabled whitelists designate,
//! sequences local "generator" jobs ahead of the real test batch, and
//! reconstructs the display hierarchy the test picker shows. All
//! state lives in [`TestEngine`](engine::TestEngine) and is mutated
//! from a single task; the service remains the sole source of truth
//! for execution state.

pub mod engine;
pub mod events;
pub mod hierarchy;
pub mod object_tree;
pub mod selection;
pub mod tristate;
