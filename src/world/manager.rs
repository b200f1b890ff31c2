//! The region registry.
//!
//! Regions live in insertion order in a plain `Vec`; every lookup is a linear
//! scan, which is fine for the few dozen regions a viewer is ever connected to.

use super::direction::Direction;
use super::events::{WorldEvent, WorldEventKind};
use super::handle::RegionHandle;
use super::limits::WorldLimits;
use super::region::{Region, SEED_CAPABILITY};
use super::water::{sanitize_far_clip, WaterLayout};
use super::{WorldError, WorldResult};
use crate::config::{DrawSettings, Grid, WorldSettings};
use crate::utils::math::{clip_factor_xy, format_sl_vector, REGION_WIDTH_METERS};
use crossbeam_channel::{Receiver, Sender};
use glam::{DVec3, Vec3};
use std::net::SocketAddr;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DISCONNECT_REASON: &str = "You have been disconnected from the region you were in.";

/// Result of asking the world to drop a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The host was not connected
    NotFound,
    /// The host served the agent's region; the session is being torn down instead
    ForcedDisconnect,
}

#[derive(Debug)]
pub struct World {
    pub(super) settings: WorldSettings,
    pub(super) regions: Vec<Region>,
    pub(super) visible: Vec<RegionHandle>,
    pub(super) culled: Vec<RegionHandle>,
    pub(super) agent_region: Option<RegionHandle>,
    pub(super) land_far_clip: f32,
    pub(super) water: WaterLayout,
    pub(super) grid: Grid,
    pub(super) limits: WorldLimits,
    pub(super) limits_need_refresh: bool,
    pub(super) frame: u64,
    pub(super) disconnected: bool,
    subscribers: Vec<Sender<WorldEvent>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

impl World {
    pub fn new(settings: WorldSettings) -> Self {
        let grid = settings.grid.clone();
        Self {
            land_far_clip: sanitize_far_clip(settings.draw.draw_distance)
                .unwrap_or_else(|| DrawSettings::default().draw_distance),
            limits: WorldLimits::for_grid(&grid),
            grid,
            settings,
            regions: Vec::new(),
            visible: Vec::new(),
            culled: Vec::new(),
            agent_region: None,
            water: WaterLayout::default(),
            limits_need_refresh: false,
            frame: 0,
            disconnected: false,
            subscribers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> Receiver<WorldEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(super) fn emit(&mut self, kind: WorldEventKind) {
        let event = WorldEvent::new(kind);
        self.subscribers.retain(|tx| match tx.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dropping world event subscriber that went away");
                false
            }
        });
    }

    // ------------------------------------------------------------------
    // Adding and removing regions
    // ------------------------------------------------------------------

    /// Connect a region. An alive region already on this handle and host is
    /// returned untouched; anything else at the handle is replaced.
    pub fn add_region(
        &mut self,
        handle: RegionHandle,
        host: SocketAddr,
        size_x: u32,
        size_y: u32,
    ) -> WorldResult<&Region> {
        let on_grid = |size: u32| size != 0 && size % REGION_WIDTH_METERS == 0;
        if !on_grid(size_x) || !on_grid(size_y) {
            return Err(WorldError::InvalidRegionSize { size_x, size_y });
        }
        if !handle.is_aligned() {
            return Err(WorldError::MisalignedHandle { handle });
        }

        info!("Add region with handle: {} on host {}", handle, host);

        let existing = self.index_covering(handle);
        if let Some(index) = existing {
            let region = &self.regions[index];
            if region.host() == host && region.is_alive() {
                info!("Region already exists and is alive, using existing region");
                return Ok(&self.regions[index]);
            }
        }

        // A live region elsewhere on the same host is stale
        let stale = self
            .regions
            .iter()
            .position(|r| r.host() == host && r.is_alive())
            .map(|i| self.regions[i].handle());
        if let Some(stale_handle) = stale {
            if Some(stale_handle) == self.agent_region {
                return Err(WorldError::HostInUse { host, handle: stale_handle });
            }
        }

        let mut seed_url = None;
        let mut replaced_agent_region = false;
        if let Some(index) = existing {
            let old = &self.regions[index];
            if old.host() != host {
                warn!(
                    "Region {} exists, but old host {} does not match new host {}, \
                     removing old region and creating new",
                    old.handle(),
                    old.host(),
                    host
                );
            }
            if !old.is_alive() {
                warn!(
                    "Region {} exists, but isn't alive. Removing old region and creating new",
                    old.handle()
                );
            }
            seed_url = old.capability(SEED_CAPABILITY).map(str::to_owned);
            replaced_agent_region = Some(old.handle()) == self.agent_region;
            self.teardown(index);
        } else {
            info!("Region does not exist, creating new one");
        }

        if let Some(stale_handle) = stale {
            if let Some(index) = self.index_of(stale_handle) {
                warn!(
                    "Host {} moved from region {} to {}, removing stale region",
                    host, stale_handle, handle
                );
                self.teardown(index);
            }
        }

        let (gx, gy) = handle.grid();
        info!("Adding new region ({}:{}) on host: {}", gx, gy, host);

        let water_height = self.settings.water.default_height;
        let mut region = Region::new(handle, host, size_x, size_y, water_height);
        if let Some(url) = seed_url {
            region.set_capability(SEED_CAPABILITY, url);
        }
        self.regions.push(region);
        self.culled.push(handle);
        if replaced_agent_region {
            self.agent_region = Some(handle);
        }

        let index = self.regions.len() - 1;
        self.connect_neighbors(index);
        self.update_water_objects();
        self.emit(WorldEventKind::RegionAdded { handle, host });

        Ok(&self.regions[index])
    }

    /// Disconnect the region served by `host`. The agent's own region is never
    /// removed here: that forces a full disconnect instead.
    pub fn remove_region(&mut self, host: SocketAddr) -> RemoveOutcome {
        let Some(index) = self.index_by_host(host) else {
            warn!("Trying to remove region that doesn't exist! {}", host);
            return RemoveOutcome::NotFound;
        };

        let handle = self.regions[index].handle();
        if Some(handle) == self.agent_region {
            for region in &self.regions {
                warn!(
                    "RegionDump: {} {} {}",
                    region.name(),
                    region.host(),
                    format_sl_vector(region.origin_global())
                );
            }
            warn!("Frame {}", self.frame);
            warn!("Disabling region {} that agent is in!", handle);
            self.disconnected = true;
            self.emit(WorldEventKind::ForceDisconnect {
                reason: DISCONNECT_REASON.to_string(),
            });
            return RemoveOutcome::ForcedDisconnect;
        }

        info!("Removing region {}", handle);
        self.teardown(index);
        self.update_water_objects();
        RemoveOutcome::Removed
    }

    /// Drop every region, the agent's included
    pub fn disconnect_regions(&mut self) {
        info!("Disconnecting {} regions", self.regions.len());
        self.agent_region = None;
        while !self.regions.is_empty() {
            self.teardown(self.regions.len() - 1);
        }
        self.visible.clear();
        self.culled.clear();
        self.water = WaterLayout::default();
    }

    /// True once the agent's region has been disabled
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Mark a region's circuit alive or dead; dead regions get replaced on the next add
    pub fn set_region_alive(&mut self, host: SocketAddr, alive: bool) -> bool {
        match self.region_by_host_mut(host) {
            Some(region) => {
                region.set_alive(alive);
                true
            }
            None => {
                warn!("No region on host {} to mark alive={}", host, alive);
                false
            }
        }
    }

    fn teardown(&mut self, index: usize) -> Region {
        let region = self.regions.remove(index);
        let handle = region.handle();
        for (dir, neighbor) in region.neighbors() {
            self.clear_link(neighbor, dir.opposite(), handle);
        }
        self.visible.retain(|&h| h != handle);
        self.culled.retain(|&h| h != handle);
        self.emit(WorldEventKind::RegionRemoved { handle, host: region.host() });
        region
    }

    // ------------------------------------------------------------------
    // Neighbors
    // ------------------------------------------------------------------

    fn connect_neighbors(&mut self, index: usize) {
        for dir in Direction::ALL {
            let Some(beyond) = self.regions[index].handle_beyond(dir) else {
                continue;
            };
            let neighbor = (0..self.regions.len())
                .find(|&i| i != index && self.regions[i].contains_handle(beyond));
            if let Some(other) = neighbor {
                self.link(index, dir, other);
            }
        }
    }

    /// Link `a` to `b` in `dir` and `b` back to `a`, unlinking whatever held those slots
    fn link(&mut self, a: usize, dir: Direction, b: usize) {
        let a_handle = self.regions[a].handle();
        let b_handle = self.regions[b].handle();

        if let Some(old) = self.regions[a].neighbor(dir) {
            if old != b_handle {
                self.clear_link(old, dir.opposite(), a_handle);
            }
        }
        if let Some(old) = self.regions[b].neighbor(dir.opposite()) {
            if old != a_handle {
                self.clear_link(old, dir, b_handle);
            }
        }

        self.regions[a].set_neighbor(dir, Some(b_handle));
        self.regions[b].set_neighbor(dir.opposite(), Some(a_handle));
        debug!("Connected {} to {} ({})", a_handle, b_handle, dir);
    }

    fn clear_link(&mut self, at: RegionHandle, dir: Direction, expected: RegionHandle) {
        if let Some(index) = self.index_of(at) {
            if self.regions[index].neighbor(dir) == Some(expected) {
                self.regions[index].set_neighbor(dir, None);
            }
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    fn index_of(&self, handle: RegionHandle) -> Option<usize> {
        self.regions.iter().position(|r| r.handle() == handle)
    }

    /// A region whose origin is `handle` wins over one that merely covers it
    fn index_covering(&self, handle: RegionHandle) -> Option<usize> {
        self.index_of(handle)
            .or_else(|| self.regions.iter().position(|r| r.contains_handle(handle)))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// The alive region on `host`, else a dead one waiting to be replaced
    fn index_by_host(&self, host: SocketAddr) -> Option<usize> {
        self.regions
            .iter()
            .position(|r| r.host() == host && r.is_alive())
            .or_else(|| self.regions.iter().position(|r| r.host() == host))
    }

    pub fn region_by_host(&self, host: SocketAddr) -> Option<&Region> {
        self.index_by_host(host).map(|i| &self.regions[i])
    }

    pub fn region_by_host_mut(&mut self, host: SocketAddr) -> Option<&mut Region> {
        let index = self.index_by_host(host)?;
        Some(&mut self.regions[index])
    }

    /// Region covering the cell `handle` addresses; large regions answer for all their cells
    pub fn region_from_handle(&self, handle: RegionHandle) -> Option<&Region> {
        self.index_covering(handle).map(|i| &self.regions[i])
    }

    pub fn region_from_handle_mut(&mut self, handle: RegionHandle) -> Option<&mut Region> {
        let index = self.index_covering(handle)?;
        Some(&mut self.regions[index])
    }

    pub fn region_from_pos_global(&self, pos: DVec3) -> Option<&Region> {
        self.regions.iter().find(|r| r.point_in_region_global(pos))
    }

    pub fn region_from_pos_agent(&self, pos: Vec3) -> Option<&Region> {
        self.region_from_pos_global(self.pos_global_from_agent(pos))
    }

    pub fn region_from_id(&self, region_id: Uuid) -> Option<&Region> {
        self.regions.iter().find(|r| r.region_id() == Some(region_id))
    }

    pub fn region_from_name(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name().eq_ignore_ascii_case(name))
    }

    pub fn position_region_valid_global(&self, pos: DVec3) -> bool {
        self.region_from_pos_global(pos).is_some()
    }

    // ------------------------------------------------------------------
    // Agent frame
    // ------------------------------------------------------------------

    /// Record which region the agent is standing in
    pub fn set_agent_region(&mut self, handle: RegionHandle) -> WorldResult<()> {
        let region = self
            .region_from_handle(handle)
            .ok_or(WorldError::UnknownRegion { handle })?;
        let handle = region.handle();
        if self.agent_region != Some(handle) {
            info!("Agent region is now {}", handle);
            self.agent_region = Some(handle);
            self.update_water_objects();
        }
        Ok(())
    }

    pub fn agent_region(&self) -> Option<&Region> {
        self.agent_region.and_then(|h| self.index_of(h)).map(|i| &self.regions[i])
    }

    /// Global origin of the agent frame: the agent region's origin
    pub fn agent_origin_global(&self) -> DVec3 {
        self.agent_region().map(Region::origin_global).unwrap_or(DVec3::ZERO)
    }

    pub fn pos_agent_from_global(&self, pos: DVec3) -> Vec3 {
        (pos - self.agent_origin_global()).as_vec3()
    }

    pub fn pos_global_from_agent(&self, pos: Vec3) -> DVec3 {
        self.agent_origin_global() + pos.as_dvec3()
    }

    // ------------------------------------------------------------------
    // Geometry queries
    // ------------------------------------------------------------------

    /// `end` if it lies in a connected region; otherwise the segment from
    /// `start` clipped to the footprint of the region `start` is in.
    pub fn clip_to_visible_regions(&self, start: DVec3, end: DVec3) -> DVec3 {
        if self.position_region_valid_global(end) {
            return end;
        }
        let Some(region) = self.region_from_pos_global(start) else {
            return start;
        };
        let (min, max) = region.bounds_xy();
        let t = clip_factor_xy(start, end, min, max);
        start + (end - start) * t
    }

    /// Terrain height under `pos`, or zero where there is no region
    pub fn resolve_land_height_global(&self, pos: DVec3) -> f32 {
        match self.region_from_pos_global(pos) {
            Some(region) => {
                let local = region.pos_region_from_global(pos);
                region.land_height_region(local.x, local.y)
            }
            None => 0.0,
        }
    }

    /// Store one terrain patch for the region covering `handle`
    pub fn update_land_patch(
        &mut self,
        handle: RegionHandle,
        px: u32,
        py: u32,
        heights: &[f32],
    ) -> WorldResult<()> {
        let region = self
            .region_from_handle_mut(handle)
            .ok_or(WorldError::UnknownRegion { handle })?;
        region.surface_mut().set_patch_heights(px, py, heights)
    }

    /// Coarse avatar positions within `radius` meters of `pos`
    pub fn avatars_near(&self, pos: DVec3, radius: f64) -> Vec<(Uuid, DVec3)> {
        self.regions
            .iter()
            .flat_map(|region| {
                region.map_avatars().iter().map(move |avatar| {
                    (avatar.agent_id, region.pos_global_from_region(avatar.position))
                })
            })
            .filter(|(_, global)| global.distance(pos) <= radius)
            .collect()
    }
}
