use super::handle::RegionHandle;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Events sent from the world to the application.
/// The application drains them once per frame.
#[derive(Debug, Clone)]
pub struct WorldEvent {
    pub kind: WorldEventKind,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEventKind {
    /// A region was created and linked to its neighbors
    RegionAdded {
        handle: RegionHandle,
        host: SocketAddr,
    },
    /// A region was torn down
    RegionRemoved {
        handle: RegionHandle,
        host: SocketAddr,
    },
    /// The agent's own region went away; the session must end
    ForceDisconnect { reason: String },
    /// Filler water was rebuilt
    WaterUpdated { holes: usize, edges: usize },
    /// Grid limits were recomputed
    LimitsRefreshed,
}

impl WorldEvent {
    pub fn new(kind: WorldEventKind) -> Self {
        Self {
            kind,
            timestamp: SystemTime::now(),
        }
    }

    /// True for events after which the session cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, WorldEventKind::ForceDisconnect { .. })
    }
}
