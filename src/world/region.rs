use super::direction::Direction;
use super::handle::RegionHandle;
use super::surface::Surface;
use bitflags::bitflags;
use glam::{DVec2, DVec3, Vec3};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

pub const SEED_CAPABILITY: &str = "Seed";

bitflags! {
    /// Region flags reported in the region handshake
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RegionFlags: u32 {
        const ALLOW_DAMAGE = 1 << 0;
        const ALLOW_LANDMARK = 1 << 1;
        const ALLOW_SET_HOME = 1 << 2;
        const RESET_HOME_ON_TELEPORT = 1 << 3;
        const SUN_FIXED = 1 << 4;
        const BLOCK_TERRAFORM = 1 << 6;
        const BLOCK_FLY = 1 << 19;
        const ALLOW_DIRECT_TELEPORT = 1 << 20;
        const SKIP_SCRIPTS = 1 << 21;
        const SKIP_PHYSICS = 1 << 22;
        const EXTERNALLY_VISIBLE = 1 << 15;
    }
}

/// Coarse avatar location as reported by the simulator, region-local
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapAvatar {
    pub agent_id: Uuid,
    pub position: Vec3,
}

/// One connected simulator region
#[derive(Debug)]
pub struct Region {
    handle: RegionHandle,
    host: SocketAddr,
    region_id: Option<Uuid>,
    name: String,
    size_x: u32,
    size_y: u32,
    alive: bool,
    neighbors: [Option<RegionHandle>; 8],
    water_height: f32,
    flags: RegionFlags,
    sim_access: u8,
    capabilities: HashMap<String, String>,
    surface: Surface,
    map_avatars: Vec<MapAvatar>,
    last_update: u64,
    skipped_updates: u32,
}

impl Region {
    pub fn new(
        handle: RegionHandle,
        host: SocketAddr,
        size_x: u32,
        size_y: u32,
        water_height: f32,
    ) -> Self {
        Self {
            handle,
            host,
            region_id: None,
            name: String::new(),
            size_x,
            size_y,
            alive: true,
            neighbors: [None; 8],
            water_height,
            flags: RegionFlags::empty(),
            sim_access: 0,
            capabilities: HashMap::new(),
            surface: Surface::new(size_x, size_y),
            map_avatars: Vec::new(),
            last_update: 0,
            skipped_updates: 0,
        }
    }

    pub fn handle(&self) -> RegionHandle {
        self.handle
    }

    pub fn host(&self) -> SocketAddr {
        self.host
    }

    pub fn region_id(&self) -> Option<Uuid> {
        self.region_id
    }

    /// Name reported by the handshake; empty until then
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> (u32, u32) {
        (self.size_x, self.size_y)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn water_height(&self) -> f32 {
        self.water_height
    }

    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    pub fn sim_access(&self) -> u8 {
        self.sim_access
    }

    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    /// Apply the identity and environment carried by the region handshake
    pub fn apply_handshake(
        &mut self,
        name: &str,
        region_id: Uuid,
        flags: RegionFlags,
        water_height: f32,
        sim_access: u8,
    ) {
        self.name = name.to_string();
        self.region_id = Some(region_id);
        self.flags = flags;
        self.water_height = water_height;
        self.sim_access = sim_access;
    }

    // Capabilities

    pub fn capability(&self, name: &str) -> Option<&str> {
        self.capabilities.get(name).map(String::as_str)
    }

    pub fn set_capability(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.capabilities.insert(name.into(), url.into());
    }

    // Neighbors

    pub fn neighbor(&self, dir: Direction) -> Option<RegionHandle> {
        self.neighbors[dir.index()]
    }

    pub fn neighbors(&self) -> impl Iterator<Item = (Direction, RegionHandle)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.neighbors[dir.index()].map(|handle| (dir, handle)))
    }

    pub(crate) fn set_neighbor(&mut self, dir: Direction, handle: Option<RegionHandle>) {
        self.neighbors[dir.index()] = handle;
    }

    /// Handle of the grid cell just beyond this region in `dir`
    pub(crate) fn handle_beyond(&self, dir: Direction) -> Option<RegionHandle> {
        let (ax, ay) = dir.axes();
        let step = |axis: i32, size: u32| -> i64 {
            match axis {
                1 => i64::from(size),
                -1 => -i64::from(crate::utils::math::REGION_WIDTH_METERS),
                _ => 0,
            }
        };
        self.handle.offset(step(ax, self.size_x), step(ay, self.size_y))
    }

    // Coordinates

    pub fn origin_global(&self) -> DVec3 {
        self.handle.origin_global()
    }

    pub fn center_global(&self) -> DVec3 {
        let half = DVec3::new(f64::from(self.size_x), f64::from(self.size_y), 0.0) * 0.5;
        self.origin_global() + half
    }

    /// Footprint on the x/y plane as (min, max) corners
    pub fn bounds_xy(&self) -> (DVec2, DVec2) {
        let min = self.origin_global().truncate();
        (min, min + DVec2::new(f64::from(self.size_x), f64::from(self.size_y)))
    }

    pub fn pos_region_from_global(&self, pos_global: DVec3) -> Vec3 {
        (pos_global - self.origin_global()).as_vec3()
    }

    pub fn pos_global_from_region(&self, pos_region: Vec3) -> DVec3 {
        self.origin_global() + pos_region.as_dvec3()
    }

    pub fn point_in_region_global(&self, pos_global: DVec3) -> bool {
        let (min, max) = self.bounds_xy();
        (min.x..max.x).contains(&pos_global.x) && (min.y..max.y).contains(&pos_global.y)
    }

    /// True when the cell `handle` addresses lies inside this region
    pub fn contains_handle(&self, handle: RegionHandle) -> bool {
        let (x, y) = handle.to_global();
        let (ox, oy) = self.handle.to_global();
        let (x, y, ox, oy) = (u64::from(x), u64::from(y), u64::from(ox), u64::from(oy));
        x >= ox && x < ox + u64::from(self.size_x) && y >= oy && y < oy + u64::from(self.size_y)
    }

    // Terrain

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn land_height_region(&self, x: f32, y: f32) -> f32 {
        self.surface.height_at(x, y)
    }

    // Coarse avatar locations

    pub fn map_avatars(&self) -> &[MapAvatar] {
        &self.map_avatars
    }

    pub(crate) fn set_map_avatars(&mut self, avatars: Vec<MapAvatar>) {
        self.map_avatars = avatars;
    }

    // Per-frame updates

    /// Full update within `max_time`; stamps the region with `frame`
    pub fn idle_update(&mut self, max_time: Duration, frame: u64) -> bool {
        self.last_update = frame;
        self.skipped_updates = 0;
        let deadline = Instant::now() + max_time;
        let did_update = self.surface.idle_update(deadline);
        if did_update {
            debug!(
                "Region {} retired dirty patches, {} left",
                self.handle,
                self.surface.dirty_patch_count()
            );
        }
        did_update
    }

    /// Bookkeeping for frames where the budget is spent; terrain work waits
    pub fn light_idle_update(&mut self) {
        self.skipped_updates = self.skipped_updates.saturating_add(1);
    }

    /// Light updates since the last full one
    pub fn skipped_updates(&self) -> u32 {
        self.skipped_updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> SocketAddr {
        "127.0.0.1:13000".parse().unwrap()
    }

    #[test]
    fn test_coordinates() {
        let region = Region::new(RegionHandle::from_global(256000, 256256), host(), 256, 256, 20.0);
        let global = DVec3::new(256010.0, 256300.0, 25.0);

        assert_eq!(region.pos_region_from_global(global), Vec3::new(10.0, 44.0, 25.0));
        assert_eq!(region.pos_global_from_region(Vec3::new(10.0, 44.0, 25.0)), global);
        assert!(region.point_in_region_global(global));
        assert!(!region.point_in_region_global(DVec3::new(256256.0, 256300.0, 0.0)));
        assert_eq!(region.center_global(), DVec3::new(256128.0, 256384.0, 0.0));
    }

    #[test]
    fn test_contains_handle_for_large_region() {
        let region = Region::new(RegionHandle::from_global(1024, 1024), host(), 512, 512, 20.0);
        assert!(region.contains_handle(RegionHandle::from_global(1280, 1280)));
        assert!(!region.contains_handle(RegionHandle::from_global(1536, 1024)));
        assert!(!region.contains_handle(RegionHandle::from_global(768, 1024)));
    }

    #[test]
    fn test_handles_beyond() {
        let region = Region::new(RegionHandle::from_global(1024, 1024), host(), 512, 256, 20.0);
        let at = |x, y| Some(RegionHandle::from_global(x, y));
        assert_eq!(region.handle_beyond(Direction::East), at(1536, 1024));
        assert_eq!(region.handle_beyond(Direction::North), at(1024, 1280));
        assert_eq!(region.handle_beyond(Direction::SouthWest), at(768, 768));

        let corner = Region::new(RegionHandle::from_global(0, 0), host(), 256, 256, 20.0);
        assert_eq!(corner.handle_beyond(Direction::West), None);
    }

    #[test]
    fn test_idle_update_stamps_frame() {
        let mut region = Region::new(RegionHandle::from_global(0, 0), host(), 256, 256, 20.0);
        region.light_idle_update();
        region.light_idle_update();
        assert_eq!(region.last_update(), 0);
        assert_eq!(region.skipped_updates(), 2);
        region.idle_update(Duration::from_millis(5), 7);
        assert_eq!(region.last_update(), 7);
        assert_eq!(region.skipped_updates(), 0);
    }

    #[test]
    fn test_flags_from_bits() {
        let flags = RegionFlags::from_bits_truncate((1 << 0) | (1 << 19) | (1 << 30));
        assert!(flags.contains(RegionFlags::ALLOW_DAMAGE | RegionFlags::BLOCK_FLY));
    }
}
