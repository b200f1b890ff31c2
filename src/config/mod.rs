pub mod grid;
pub mod settings;

// Re-export commonly used types
pub use grid::Grid;
pub use settings::{
    DrawSettings, UpdateSettings, WaterSettings, WorldSettings,
    load_world_settings, load_world_settings_from, save_world_settings, save_world_settings_to,
};
