//! Building and chat limits that depend on the grid flavor.

use crate::config::Grid;
use serde::Deserialize;

/// Second Life object and build constraints
pub mod second_life {
    pub const MAX_OBJECT_Z: f32 = 4096.0;
    pub const MIN_PRIM_SCALE: f32 = 0.01;
    pub const MAX_PRIM_SCALE: f32 = 64.0;
    pub const MAX_PRIM_SCALE_NO_MESH: f32 = 10.0;
    pub const MAX_HOLLOW_SIZE: f32 = 95.0;
    pub const MIN_HOLE_SIZE: f32 = 0.05;
    pub const MAX_LINKED_PRIMS: u32 = 255;
    pub const MAX_PHYS_LINKED_PRIMS: u32 = 32;
}

/// OpenSimulator defaults before the simulator reports its own
pub mod opensim {
    pub const MAX_OBJECT_Z: f32 = 10000.0;
    pub const MIN_PRIM_SCALE: f32 = 0.001;
    pub const MAX_PRIM_SCALE: f32 = 256.0;
    pub const MAX_HOLLOW_SIZE: f32 = 99.0;
    pub const MIN_HOLE_SIZE: f32 = 0.01;
    pub const MAX_LINKED_PRIMS: u32 = 255;
    pub const MAX_PHYS_LINKED_PRIMS: u32 = 32;
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldLimits {
    pub max_height: f32,
    pub min_prim_scale: f32,
    pub max_prim_scale: f32,
    pub max_prim_scale_no_mesh: f32,
    pub max_phys_prim_scale: f32,
    pub max_hollow_size: f32,
    pub min_hole_size: f32,
    pub max_linked_prims: u32,
    pub max_phys_linked_prims: u32,
    /// Zero means unlimited
    pub max_drag_distance: f32,
    pub whisper_distance: f32,
    pub say_distance: f32,
    pub shout_distance: f32,
    pub min_build_z: f32,
    pub allow_minimap: bool,
    pub allow_physical_prims: bool,
    pub allow_render_water: bool,
}

impl WorldLimits {
    pub fn for_grid(grid: &Grid) -> Self {
        if grid.is_second_life() {
            Self {
                max_height: second_life::MAX_OBJECT_Z,
                min_prim_scale: second_life::MIN_PRIM_SCALE,
                max_prim_scale: second_life::MAX_PRIM_SCALE,
                max_prim_scale_no_mesh: second_life::MAX_PRIM_SCALE_NO_MESH,
                max_phys_prim_scale: second_life::MAX_PRIM_SCALE,
                max_hollow_size: second_life::MAX_HOLLOW_SIZE,
                min_hole_size: second_life::MIN_HOLE_SIZE,
                max_linked_prims: second_life::MAX_LINKED_PRIMS,
                max_phys_linked_prims: second_life::MAX_PHYS_LINKED_PRIMS,
                max_drag_distance: 0.0,
                whisper_distance: 10.0,
                say_distance: 20.0,
                shout_distance: 100.0,
                min_build_z: 0.0,
                allow_minimap: true,
                allow_physical_prims: true,
                allow_render_water: true,
            }
        } else {
            Self {
                max_height: opensim::MAX_OBJECT_Z,
                min_prim_scale: opensim::MIN_PRIM_SCALE,
                max_prim_scale: opensim::MAX_PRIM_SCALE,
                // no mesh restriction on OpenSim
                max_prim_scale_no_mesh: opensim::MAX_PRIM_SCALE,
                max_phys_prim_scale: opensim::MAX_PRIM_SCALE,
                max_hollow_size: opensim::MAX_HOLLOW_SIZE,
                min_hole_size: opensim::MIN_HOLE_SIZE,
                max_linked_prims: opensim::MAX_LINKED_PRIMS,
                max_phys_linked_prims: opensim::MAX_PHYS_LINKED_PRIMS,
                max_drag_distance: 0.0,
                whisper_distance: 10.0,
                say_distance: 20.0,
                shout_distance: 100.0,
                min_build_z: 0.0,
                allow_minimap: true,
                allow_physical_prims: true,
                allow_render_water: true,
            }
        }
    }

    /// Largest prim edge allowed; mesh-enabled regions get the bigger bound
    pub fn max_prim_scale(&self, mesh_enabled: bool) -> f32 {
        if mesh_enabled {
            self.max_prim_scale
        } else {
            self.max_prim_scale_no_mesh
        }
    }

    pub fn clamp_prim_scale(&self, scale: f32, mesh_enabled: bool) -> f32 {
        scale.clamp(self.min_prim_scale, self.max_prim_scale(mesh_enabled))
    }

    /// Overlay the values an OpenSimulator region advertises
    pub fn apply_opensim_extras(&mut self, extras: &OpenSimExtras) {
        macro_rules! overlay {
            ($($field:ident <- $src:ident),* $(,)?) => {
                $(if let Some(v) = extras.$src { self.$field = v; })*
            };
        }
        overlay!(
            min_prim_scale <- min_prim_scale,
            max_prim_scale <- max_prim_scale,
            max_phys_prim_scale <- max_phys_prim_scale,
            max_hollow_size <- max_hollow_size,
            min_hole_size <- min_hole_size,
            max_height <- max_pos_z,
            min_build_z <- min_pos_z,
            max_drag_distance <- max_drag_distance,
            whisper_distance <- whisper_range,
            say_distance <- say_range,
            shout_distance <- shout_range,
        );
        if let Some(max) = extras.max_prim_scale {
            self.max_prim_scale_no_mesh = max;
        }
        if let Some(links) = extras.max_link_count {
            self.max_linked_prims = links;
        }
        if let Some(links) = extras.max_link_count_phys {
            self.max_phys_linked_prims = links;
        }
        if let Some(allow) = extras.map_allowed {
            self.allow_minimap = allow;
        }
        if let Some(allow) = extras.render_water {
            self.allow_render_water = allow;
        }
    }
}

impl Default for WorldLimits {
    fn default() -> Self {
        Self::for_grid(&Grid::default())
    }
}

/// The `OpenSimExtras` block of the simulator features capability
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OpenSimExtras {
    pub min_prim_scale: Option<f32>,
    pub max_prim_scale: Option<f32>,
    pub max_phys_prim_scale: Option<f32>,
    pub max_hollow_size: Option<f32>,
    pub min_hole_size: Option<f32>,
    pub max_pos_z: Option<f32>,
    pub min_pos_z: Option<f32>,
    pub max_drag_distance: Option<f32>,
    pub whisper_range: Option<f32>,
    pub say_range: Option<f32>,
    pub shout_range: Option<f32>,
    pub max_link_count: Option<u32>,
    pub max_link_count_phys: Option<u32>,
    pub map_allowed: Option<bool>,
    pub render_water: Option<bool>,
}
