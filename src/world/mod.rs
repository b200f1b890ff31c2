//! Region/world management
//!
//! Tracks the simulator regions the viewer is connected to, links them to
//! their neighbors, fills the gaps with water and updates them within a
//! per-frame time budget.

pub mod direction;
pub mod events;
pub mod handle;
pub mod handlers;
pub mod limits;
pub mod manager;
pub mod messages;
pub mod region;
pub mod surface;
pub mod update;
pub mod water;

// Re-export the types most callers need
pub use direction::Direction;
pub use events::{WorldEvent, WorldEventKind};
pub use handle::RegionHandle;
pub use limits::{OpenSimExtras, WorldLimits};
pub use manager::{RemoveOutcome, World};
pub use messages::WorldMessage;
pub use region::{MapAvatar, Region, RegionFlags};
pub use water::{WaterKind, WaterLayout, WaterObject};

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum WorldError {
    #[error("Invalid region size {size_x}x{size_y}: must be a positive multiple of 256")]
    InvalidRegionSize { size_x: u32, size_y: u32 },

    #[error("Region handle {handle} is not aligned to the region grid")]
    MisalignedHandle { handle: RegionHandle },

    #[error("No region with handle {handle}")]
    UnknownRegion { handle: RegionHandle },

    #[error("No region on host {host}")]
    UnknownHost { host: SocketAddr },

    #[error("Host {host} is in use by the agent's region {handle}")]
    HostInUse { host: SocketAddr, handle: RegionHandle },

    #[error("Malformed {name} message: {reason}")]
    MalformedMessage { name: String, reason: String },

    #[error("Unknown message: {name}")]
    UnknownMessage { name: String },

    #[error("Invalid surface patch: {reason}")]
    InvalidPatch { reason: String },
}

pub type WorldResult<T> = Result<T, WorldError>;
