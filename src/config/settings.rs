use crate::config::Grid;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const WORLD_CONFIG_FILE: &str = "world.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSettings {
    /// Land far clip in meters
    pub draw_distance: f32,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self { draw_distance: 128.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Wall-clock allowance shared by all regions in one idle frame
    pub region_update_budget_ms: f32,
    /// Idle frames per second when the binary drives the world itself
    pub idle_frame_hz: u32,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            region_update_budget_ms: 1.0,
            idle_frame_hz: 30,
        }
    }
}

impl UpdateSettings {
    pub fn region_update_budget(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.region_update_budget_ms.max(0.0)) / 1000.0)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.idle_frame_hz.max(1)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterSettings {
    /// Water height used for filler water when no region reports one
    pub default_height: f32,
    /// How far edge water stretches past the covered area, in meters
    pub edge_extent: f32,
}

impl Default for WaterSettings {
    fn default() -> Self {
        Self {
            default_height: 20.0,
            edge_extent: 2048.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    pub grid: Grid,
    pub draw: DrawSettings,
    pub update: UpdateSettings,
    pub water: WaterSettings,
}

fn world_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "slv", "slv-world")
        .map(|proj| proj.config_dir().join(WORLD_CONFIG_FILE))
}

pub fn save_world_settings_to(settings: &WorldSettings, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml = toml::to_string_pretty(settings)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(path, toml)
}

pub fn load_world_settings_from(path: &Path) -> std::io::Result<WorldSettings> {
    let data = fs::read_to_string(path)?;
    toml::from_str::<WorldSettings>(&data)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

pub fn save_world_settings(settings: &WorldSettings) -> std::io::Result<()> {
    if let Some(path) = world_config_path() {
        save_world_settings_to(settings, &path)?;
    }
    Ok(())
}

pub fn load_world_settings() -> Option<WorldSettings> {
    let path = world_config_path()?;
    match load_world_settings_from(&path) {
        Ok(settings) => Some(settings),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
            None
        }
    }
}
