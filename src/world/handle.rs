//! Packed grid coordinates identifying regions.
//!
//! The high 32 bits hold the region origin's global X in meters, the low 32
//! bits the global Y. Origins sit on the 256 m grid.

use crate::utils::math::{parse_sl_pair, REGION_WIDTH_F64, REGION_WIDTH_METERS};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionHandle(pub u64);

impl RegionHandle {
    /// Pack global meters
    pub const fn from_global(x: u32, y: u32) -> Self {
        Self(((x as u64) << 32) | y as u64)
    }

    /// Pack grid indices (meters / 256)
    pub const fn from_grid(grid_x: u32, grid_y: u32) -> Self {
        Self::from_global(grid_x * REGION_WIDTH_METERS, grid_y * REGION_WIDTH_METERS)
    }

    /// Handle of the 256 m cell containing `pos`, or `None` outside the u32 grid
    pub fn from_pos_global(pos: DVec3) -> Option<Self> {
        let gx = (pos.x / REGION_WIDTH_F64).floor();
        let gy = (pos.y / REGION_WIDTH_F64).floor();
        let max = f64::from(u32::MAX / REGION_WIDTH_METERS);
        if gx < 0.0 || gy < 0.0 || gx > max || gy > max {
            return None;
        }
        Some(Self::from_grid(gx as u32, gy as u32))
    }

    /// Unpack to global meters
    pub const fn to_global(self) -> (u32, u32) {
        ((self.0 >> 32) as u32, (self.0 & 0xFFFF_FFFF) as u32)
    }

    /// Unpack to grid indices
    pub const fn grid(self) -> (u32, u32) {
        let (x, y) = self.to_global();
        (x / REGION_WIDTH_METERS, y / REGION_WIDTH_METERS)
    }

    /// Global position of the cell origin (z = 0)
    pub fn origin_global(self) -> DVec3 {
        let (x, y) = self.to_global();
        DVec3::new(f64::from(x), f64::from(y), 0.0)
    }

    /// True when both coordinates lie on the 256 m grid
    pub const fn is_aligned(self) -> bool {
        let (x, y) = self.to_global();
        x % REGION_WIDTH_METERS == 0 && y % REGION_WIDTH_METERS == 0
    }

    /// Handle displaced by whole meters; `None` if it would leave the u32 grid
    pub fn offset(self, dx: i64, dy: i64) -> Option<Self> {
        let (x, y) = self.to_global();
        let nx = u32::try_from(i64::from(x) + dx).ok()?;
        let ny = u32::try_from(i64::from(y) + dy).ok()?;
        Some(Self::from_global(nx, ny))
    }

    /// Parse region handle from the login response format: "[r256000, r256000]"
    pub fn parse_sl_format(value: &str) -> Result<Self, String> {
        let (x, y) = parse_sl_pair(value)?;
        Ok(Self::from_global(x, y))
    }
}

impl From<u64> for RegionHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<RegionHandle> for u64 {
    fn from(handle: RegionHandle) -> u64 {
        handle.0
    }
}

impl fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (gx, gy) = self.grid();
        write!(f, "{:016x} ({}, {})", self.0, gx, gy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let handle = RegionHandle::from_global(256000, 254976);
        assert_eq!(handle.0, (256000u64 << 32) | 254976);
        assert_eq!(handle.to_global(), (256000, 254976));
        assert_eq!(handle.grid(), (1000, 996));
        assert_eq!(RegionHandle::from_grid(1000, 996), handle);
    }

    #[test]
    fn test_from_pos_global() {
        let pos = DVec3::new(256128.5, 255000.0, 30.0);
        assert_eq!(
            RegionHandle::from_pos_global(pos),
            Some(RegionHandle::from_global(256000, 254976))
        );
        assert_eq!(RegionHandle::from_pos_global(DVec3::new(-1.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_alignment_and_offset() {
        assert!(RegionHandle::from_global(512, 768).is_aligned());
        assert!(!RegionHandle::from_global(500, 768).is_aligned());

        let handle = RegionHandle::from_global(256, 0);
        assert_eq!(handle.offset(-256, 256), Some(RegionHandle::from_global(0, 256)));
        assert_eq!(handle.offset(0, -256), None);
    }

    #[test]
    fn test_parse_sl_format() {
        let handle = RegionHandle::parse_sl_format("[r256000, r256256]").unwrap();
        assert_eq!(handle.to_global(), (256000, 256256));
        assert!(RegionHandle::parse_sl_format("nonsense").is_err());
    }
}
