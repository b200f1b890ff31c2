// SLV-World: region and world management for a Second Life viewer in Rust

pub mod config;
pub mod utils;
pub mod world;

// Re-export commonly used types for convenience
pub use config::{Grid, WorldSettings};
pub use world::{
    Direction, Region, RegionHandle, RemoveOutcome, World, WorldError, WorldEvent, WorldEventKind,
    WorldResult,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
