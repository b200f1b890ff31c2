//! Filler water for the parts of the world no connected region covers.
//!
//! Hole tiles fill empty grid cells inside the bounding box of the connected
//! regions, expanded by the far-clip range. Eight edge slabs tile the plane
//! around that box out to the horizon.

use super::direction::Direction;
use crate::utils::math::{REGION_WIDTH_F64, REGION_WIDTH_METERS};
use glam::{DVec3, Vec3};
use tracing::warn;

/// Largest far clip the world honors, in meters
pub const MAX_FAR_CLIP: f32 = 4096.0;

/// Hole tiles one rebuild may lay out; larger boxes get edge water only
pub const MAX_HOLE_TILES: i64 = 128 * 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterKind {
    Hole,
    Edge(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterObject {
    pub kind: WaterKind,
    /// Center of the water sheet
    pub position_global: DVec3,
    /// Extent on x/y; z is always zero
    pub scale: Vec3,
}

/// Bounding box of the connected regions in global meters: min inclusive, max exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl RegionBounds {
    pub fn from_footprint(x: u32, y: u32, size_x: u32, size_y: u32) -> Self {
        Self {
            min_x: i64::from(x),
            min_y: i64::from(y),
            max_x: i64::from(x) + i64::from(size_x),
            max_y: i64::from(y) + i64::from(size_y),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn expand(self, by: i64) -> Self {
        Self {
            min_x: self.min_x - by,
            min_y: self.min_y - by,
            max_x: self.max_x + by,
            max_y: self.max_y + by,
        }
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }
}

/// `far_clip` limited to `[0, MAX_FAR_CLIP]`, or `None` when it is not a number
pub fn sanitize_far_clip(far_clip: f32) -> Option<f32> {
    far_clip
        .is_finite()
        .then(|| far_clip.clamp(0.0, MAX_FAR_CLIP))
}

fn far_clip_meters(far_clip: f32) -> i64 {
    sanitize_far_clip(far_clip).map_or(0, |f| f.ceil() as i64)
}

/// Far clip rounded up to whole region widths, never less than one region
pub fn water_range(far_clip: f32) -> i64 {
    let width = i64::from(REGION_WIDTH_METERS);
    let draw_distance = far_clip_meters(far_clip).max(1);
    ((draw_distance - 1) / width + 1) * width
}

/// Region-width bucket of a far clip; water only changes when it does
pub fn far_clip_bucket(far_clip: f32) -> i64 {
    (far_clip_meters(far_clip) - 1).div_euclid(i64::from(REGION_WIDTH_METERS))
}

#[derive(Debug, Clone, Default)]
pub struct WaterLayout {
    pub holes: Vec<WaterObject>,
    pub edges: Vec<WaterObject>,
    /// The area hole tiles are laid out in
    pub covered: Option<RegionBounds>,
}

fn hole_tiles<F>(covered: RegionBounds, z: f64, occupied: &F) -> Vec<WaterObject>
where
    F: Fn(i64, i64) -> bool,
{
    let step = i64::from(REGION_WIDTH_METERS);
    let mut holes = Vec::new();
    let mut y = covered.min_y;
    while y < covered.max_y {
        let mut x = covered.min_x;
        while x < covered.max_x {
            if !occupied(x, y) {
                holes.push(WaterObject {
                    kind: WaterKind::Hole,
                    position_global: DVec3::new(
                        x as f64 + REGION_WIDTH_F64 * 0.5,
                        y as f64 + REGION_WIDTH_F64 * 0.5,
                        z,
                    ),
                    scale: Vec3::new(step as f32, step as f32, 0.0),
                });
            }
            x += step;
        }
        y += step;
    }
    holes
}

impl WaterLayout {
    /// Lay out water around `regions`. `occupied` reports whether a grid cell
    /// (given by its global origin) belongs to a connected region.
    pub fn compute<F>(
        regions: RegionBounds,
        far_clip: f32,
        water_height: f32,
        edge_extent: f32,
        occupied: F,
    ) -> Self
    where
        F: Fn(i64, i64) -> bool,
    {
        let step = i64::from(REGION_WIDTH_METERS);
        let covered = regions.expand(water_range(far_clip));
        let z = f64::from(water_height);

        let tiles = (covered.width() / step) * (covered.height() / step);
        let holes = if tiles > MAX_HOLE_TILES {
            warn!("Water box of {} tiles exceeds {}, skipping hole water", tiles, MAX_HOLE_TILES);
            Vec::new()
        } else {
            hole_tiles(covered, z, &occupied)
        };

        let wx = covered.width() as f64;
        let wy = covered.height() as f64;
        let center_x = covered.min_x as f64 + wx * 0.5;
        let center_y = covered.min_y as f64 + wy * 0.5;
        let extent = f64::from(edge_extent.max(0.0));

        let edges = Direction::ALL
            .into_iter()
            .map(|dir| {
                let (ax, ay) = dir.axes();
                let dim_x = if ax == 0 { wx } else { extent };
                let dim_y = if ay == 0 { wy } else { extent };
                WaterObject {
                    kind: WaterKind::Edge(dir),
                    position_global: DVec3::new(
                        center_x + (wx + dim_x) * 0.5 * f64::from(ax),
                        center_y + (wy + dim_y) * 0.5 * f64::from(ay),
                        z,
                    ),
                    scale: Vec3::new(dim_x as f32, dim_y as f32, 0.0),
                }
            })
            .collect();

        Self {
            holes,
            edges,
            covered: Some(covered),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty() && self.edges.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &WaterObject> {
        self.holes.iter().chain(self.edges.iter())
    }
}
