//! World state and the primitives that mutate it

pub mod checkpoint;
pub mod mutation;
pub mod state;

pub use checkpoint::{checkpoint_path, load_checkpoint, save_checkpoint};
pub use state::{WorldState, DEFAULT_OVERLAYS};
