//! Terrain surface of a region, split into square patches.
//!
//! Height data arrives patch by patch. Each arrival marks the patch dirty; the
//! region's idle update refreshes the statistics of dirty patches and retires
//! them while its time slice lasts.

use super::{WorldError, WorldResult};
use std::collections::BTreeSet;
use std::time::Instant;

/// Patch edge in meters; one height sample per meter
pub const PATCH_WIDTH: u32 = 16;
pub const PATCH_SAMPLES: usize = (PATCH_WIDTH * PATCH_WIDTH) as usize;

#[derive(Debug, Clone)]
pub struct SurfacePatch {
    heights: Vec<f32>,
    min_z: f32,
    max_z: f32,
    mean_z: f32,
}

impl SurfacePatch {
    fn flat() -> Self {
        Self {
            heights: vec![0.0; PATCH_SAMPLES],
            min_z: 0.0,
            max_z: 0.0,
            mean_z: 0.0,
        }
    }

    fn update_vertical_stats(&mut self) {
        let (min, max, sum) = self.heights.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f32),
            |(min, max, sum), &h| (min.min(h), max.max(h), sum + h),
        );
        self.min_z = min;
        self.max_z = max;
        self.mean_z = sum / self.heights.len() as f32;
    }

    pub fn min_z(&self) -> f32 {
        self.min_z
    }

    pub fn max_z(&self) -> f32 {
        self.max_z
    }

    pub fn mean_z(&self) -> f32 {
        self.mean_z
    }
}

#[derive(Debug, Clone)]
pub struct Surface {
    patches_x: u32,
    patches_y: u32,
    patches: Vec<SurfacePatch>,
    dirty: BTreeSet<usize>,
}

impl Surface {
    /// Flat surface covering `size_x` by `size_y` meters
    pub fn new(size_x: u32, size_y: u32) -> Self {
        let patches_x = (size_x / PATCH_WIDTH).max(1);
        let patches_y = (size_y / PATCH_WIDTH).max(1);
        let count = (patches_x * patches_y) as usize;
        Self {
            patches_x,
            patches_y,
            patches: vec![SurfacePatch::flat(); count],
            dirty: BTreeSet::new(),
        }
    }

    pub fn patches_per_edge(&self) -> (u32, u32) {
        (self.patches_x, self.patches_y)
    }

    pub fn patch(&self, px: u32, py: u32) -> Option<&SurfacePatch> {
        self.patch_index(px, py).map(|i| &self.patches[i])
    }

    fn patch_index(&self, px: u32, py: u32) -> Option<usize> {
        (px < self.patches_x && py < self.patches_y).then(|| (py * self.patches_x + px) as usize)
    }

    /// Replace the height samples of one patch (row-major, 16x16) and mark it dirty
    pub fn set_patch_heights(&mut self, px: u32, py: u32, heights: &[f32]) -> WorldResult<()> {
        let index = self.patch_index(px, py).ok_or_else(|| WorldError::InvalidPatch {
            reason: format!("patch ({}, {}) outside {}x{}", px, py, self.patches_x, self.patches_y),
        })?;
        if heights.len() != PATCH_SAMPLES {
            return Err(WorldError::InvalidPatch {
                reason: format!("expected {} samples, got {}", PATCH_SAMPLES, heights.len()),
            });
        }
        self.patches[index].heights.copy_from_slice(heights);
        self.dirty.insert(index);
        Ok(())
    }

    pub fn dirty_patch_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn has_dirty_patches(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Refresh and retire dirty patches, lowest index first. At least one patch
    /// is processed per call; further ones only while `deadline` has not passed.
    /// Returns whether any patch was retired.
    pub fn idle_update(&mut self, deadline: Instant) -> bool {
        let mut did_update = false;
        while let Some(index) = self.dirty.pop_first() {
            self.patches[index].update_vertical_stats();
            did_update = true;
            if Instant::now() >= deadline {
                break;
            }
        }
        did_update
    }

    fn sample(&self, ix: i64, iy: i64) -> f32 {
        let max_x = i64::from(self.patches_x * PATCH_WIDTH) - 1;
        let max_y = i64::from(self.patches_y * PATCH_WIDTH) - 1;
        let x = ix.clamp(0, max_x) as u32;
        let y = iy.clamp(0, max_y) as u32;
        let patch = &self.patches[((y / PATCH_WIDTH) * self.patches_x + x / PATCH_WIDTH) as usize];
        patch.heights[((y % PATCH_WIDTH) * PATCH_WIDTH + x % PATCH_WIDTH) as usize]
    }

    /// Bilinear height at a region-local position; positions outside are clamped
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        let fx = x.floor();
        let fy = y.floor();
        let tx = x - fx;
        let ty = y - fy;
        let (ix, iy) = (fx as i64, fy as i64);

        let h00 = self.sample(ix, iy);
        let h10 = self.sample(ix + 1, iy);
        let h01 = self.sample(ix, iy + 1);
        let h11 = self.sample(ix + 1, iy + 1);

        let bottom = h00 + (h10 - h00) * tx;
        let top = h01 + (h11 - h01) * tx;
        bottom + (top - bottom) * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ramp() -> Vec<f32> {
        (0..PATCH_SAMPLES).map(|i| (i % PATCH_WIDTH as usize) as f32).collect()
    }

    #[test]
    fn test_patch_layout() {
        let surface = Surface::new(256, 512);
        assert_eq!(surface.patches_per_edge(), (16, 32));
        assert!(surface.patch(15, 31).is_some());
        assert!(surface.patch(16, 0).is_none());
    }

    #[test]
    fn test_set_heights_validates() {
        let mut surface = Surface::new(256, 256);
        assert!(surface.set_patch_heights(0, 0, &[1.0; 3]).is_err());
        assert!(surface.set_patch_heights(99, 0, &ramp()).is_err());
        assert!(surface.set_patch_heights(1, 2, &ramp()).is_ok());
        assert_eq!(surface.dirty_patch_count(), 1);
    }

    #[test]
    fn test_idle_update_refreshes_and_retires() {
        let mut surface = Surface::new(256, 256);
        surface.set_patch_heights(0, 0, &ramp()).unwrap();
        surface.set_patch_heights(1, 0, &[5.0; PATCH_SAMPLES]).unwrap();
        assert_eq!(surface.patch(0, 0).unwrap().max_z(), 0.0);

        // Spent deadline: one patch still goes through
        assert!(surface.idle_update(Instant::now()));
        assert_eq!(surface.dirty_patch_count(), 1);
        assert_eq!(surface.patch(0, 0).unwrap().max_z(), 15.0);
        assert_eq!(surface.patch(1, 0).unwrap().mean_z(), 0.0);

        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(surface.idle_update(deadline));
        assert!(!surface.has_dirty_patches());
        assert_eq!(surface.patch(1, 0).unwrap().mean_z(), 5.0);

        assert!(!surface.idle_update(deadline));
    }

    #[test]
    fn test_height_interpolation() {
        let mut surface = Surface::new(256, 256);
        surface.set_patch_heights(0, 0, &ramp()).unwrap();

        assert_eq!(surface.height_at(3.0, 7.0), 3.0);
        assert!((surface.height_at(3.5, 2.0) - 3.5).abs() < 1e-6);
        // Clamped outside the region
        assert_eq!(surface.height_at(-10.0, 0.0), 0.0);
    }
}
