//! Per-frame work: budgeted region updates, visibility, filler water and limits.

use super::events::WorldEventKind;
use super::handle::RegionHandle;
use super::limits::{OpenSimExtras, WorldLimits};
use super::manager::World;
use super::water::{far_clip_bucket, sanitize_far_clip, RegionBounds, WaterLayout};
use crate::config::{DrawSettings, Grid};
use crate::utils::math::distance_xy_to_rect;
use glam::DVec3;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

impl World {
    /// Idle-time update of every region within `max_update_time`.
    ///
    /// Regions are visited least recently updated first. Each gets at most a
    /// tenth of the budget. Once the budget is gone the rest only get a light
    /// update and keep their place at the front of the queue, but the frame
    /// keeps giving full updates until one region has actually done work.
    pub fn update_regions(&mut self, max_update_time: Duration) {
        let timer = Instant::now();
        self.frame += 1;
        self.update_limits();

        let slice_cap = max_update_time / 10;
        let frame = self.frame;
        let mut did_one = false;
        let mut full = 0usize;
        let mut light = 0usize;

        for index in self.update_order_indices() {
            let elapsed = timer.elapsed();
            let region = &mut self.regions[index];
            if did_one && elapsed >= max_update_time {
                // perform some necessary but very light updates
                region.light_idle_update();
                light += 1;
            } else {
                let max_time = max_update_time.saturating_sub(elapsed).min(slice_cap);
                did_one |= region.idle_update(max_time, frame);
                full += 1;
            }
        }

        debug!(
            "Frame {}: {} full / {} light region updates in {:?}",
            frame,
            full,
            light,
            timer.elapsed()
        );
    }

    fn update_order_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.regions.len()).collect();
        // stable: ties keep insertion order
        order.sort_by_key(|&i| self.regions[i].last_update());
        order
    }

    /// Handles in the order the next `update_regions` call will visit them
    pub fn update_order(&self) -> Vec<RegionHandle> {
        self.update_order_indices()
            .into_iter()
            .map(|i| self.regions[i].handle())
            .collect()
    }

    /// Number of `update_regions` calls so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------

    /// Split regions into visible and culled by planar distance from the camera
    pub fn update_visibilities(&mut self, camera_global: DVec3, far_clip: f32) {
        self.visible.clear();
        self.culled.clear();
        for region in &self.regions {
            let (min, max) = region.bounds_xy();
            if distance_xy_to_rect(camera_global, min, max) <= f64::from(far_clip) {
                self.visible.push(region.handle());
            } else {
                self.culled.push(region.handle());
            }
        }
    }

    pub fn visible_regions(&self) -> &[RegionHandle] {
        &self.visible
    }

    pub fn culled_regions(&self) -> &[RegionHandle] {
        &self.culled
    }

    // ------------------------------------------------------------------
    // Water
    // ------------------------------------------------------------------

    pub fn land_far_clip(&self) -> f32 {
        self.land_far_clip
    }

    /// Water only moves when the far clip crosses a region-width boundary.
    /// Values outside `[0, MAX_FAR_CLIP]` are clamped; non-numbers fall back
    /// to the configured draw distance.
    pub fn set_land_far_clip(&mut self, requested: f32) {
        let far_clip = sanitize_far_clip(requested)
            .or_else(|| sanitize_far_clip(self.settings.draw.draw_distance))
            .unwrap_or_else(|| DrawSettings::default().draw_distance);
        if far_clip != requested {
            warn!("Far clip {} out of range, using {}", requested, far_clip);
        }
        let need_water_update = far_clip_bucket(self.land_far_clip) != far_clip_bucket(far_clip);
        self.land_far_clip = far_clip;
        if need_water_update {
            self.update_water_objects();
        }
    }

    pub fn water(&self) -> &WaterLayout {
        &self.water
    }

    /// Rebuild hole and edge water around the connected regions
    pub fn update_water_objects(&mut self) {
        if self.regions.is_empty() {
            warn!("No regions!");
            if !self.water.is_empty() {
                self.water = WaterLayout::default();
                self.emit(WorldEventKind::WaterUpdated { holes: 0, edges: 0 });
            }
            return;
        }

        let Some(bounds) = self
            .regions
            .iter()
            .map(|r| {
                let (x, y) = r.handle().to_global();
                let (sx, sy) = r.size();
                RegionBounds::from_footprint(x, y, sx, sy)
            })
            .reduce(RegionBounds::union)
        else {
            return;
        };

        // Holes take the water level of the region we are on
        let water_height = self
            .agent_region()
            .or_else(|| self.regions.first())
            .map(|r| r.water_height())
            .unwrap_or(self.settings.water.default_height);

        let regions = &self.regions;
        let layout = WaterLayout::compute(
            bounds,
            self.land_far_clip,
            water_height,
            self.settings.water.edge_extent,
            |x, y| match (u32::try_from(x), u32::try_from(y)) {
                (Ok(x), Ok(y)) => {
                    let cell = RegionHandle::from_global(x, y);
                    regions.iter().any(|r| r.contains_handle(cell))
                }
                _ => false,
            },
        );

        let (holes, edges) = (layout.holes.len(), layout.edges.len());
        debug!("Water rebuilt: {} hole tiles, {} edge slabs at z={}", holes, edges, water_height);
        self.water = layout;
        self.emit(WorldEventKind::WaterUpdated { holes, edges });
    }

    // ------------------------------------------------------------------
    // Limits
    // ------------------------------------------------------------------

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Switch grid flavor; limits follow on the next `update_limits`
    pub fn set_grid(&mut self, grid: Grid) {
        if self.grid != grid {
            info!("Grid changed to {}", grid);
            self.grid = grid;
            self.limits_need_refresh = true;
        }
    }

    pub fn limits_need_refresh(&self) -> bool {
        self.limits_need_refresh
    }

    pub fn update_limits(&mut self) {
        if self.limits_need_refresh {
            self.refresh_limits();
        }
    }

    pub fn refresh_limits(&mut self) {
        self.limits = WorldLimits::for_grid(&self.grid);
        self.limits_need_refresh = false;
        debug!("Limits refreshed for {}: {:?}", self.grid, self.limits);
        self.emit(WorldEventKind::LimitsRefreshed);
    }

    pub fn limits(&self) -> &WorldLimits {
        &self.limits
    }

    /// Apply OpenSim extras advertised by `host`; only the agent's region counts
    pub fn apply_simulator_features(&mut self, host: SocketAddr, extras: &OpenSimExtras) -> bool {
        if self.grid.is_second_life() {
            debug!("Ignoring OpenSim extras from {} on {}", host, self.grid);
            return false;
        }
        if self.agent_region().map(|r| r.host()) != Some(host) {
            debug!("Ignoring simulator features from {}: not the agent's region", host);
            return false;
        }
        self.update_limits();
        self.limits.apply_opensim_extras(extras);
        info!("Applied simulator features from {}", host);
        true
    }
}
