//! Pulse - turn-based simulation and retrodiction kernel

pub mod core;
pub mod gravity;
pub mod regime;
pub mod retrodiction;
pub mod rules;
pub mod simulation;
pub mod world;
