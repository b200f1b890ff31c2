use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use slv_world::config::{load_world_settings, load_world_settings_from};
use slv_world::utils::logging::{init_logging, log_system_info};
use slv_world::utils::math::parse_sl_vector;
use slv_world::{RegionHandle, World, WorldEventKind};
use std::net::SocketAddr;
use std::path::Path;
use tracing::{info, warn};

/// A region to connect at startup
#[derive(Debug, Deserialize)]
struct ScenarioRegion {
    /// "[r256000, r256000]"
    handle: String,
    host: SocketAddr,
    #[serde(default = "default_size")]
    size_x: u32,
    #[serde(default = "default_size")]
    size_y: u32,
}

fn default_size() -> u32 {
    256
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default = "default_frames")]
    frames: u64,
    agent_region: Option<String>,
    camera: Option<String>,
    settings: Option<String>,
    #[serde(default, rename = "region")]
    regions: Vec<ScenarioRegion>,
}

fn default_frames() -> u64 {
    90
}

impl Default for Scenario {
    fn default() -> Self {
        // A plus-shaped cluster around the agent's region
        let centre = (256000u32, 256000u32);
        let offsets = [(0i64, 0i64), (256, 0), (-256, 0), (0, 256), (0, -256)];
        let regions = offsets
            .iter()
            .enumerate()
            .map(|(i, (dx, dy))| ScenarioRegion {
                handle: format!("[r{}, r{}]", i64::from(centre.0) + dx, i64::from(centre.1) + dy),
                host: SocketAddr::from(([127, 0, 0, 1], 13000 + i as u16)),
                size_x: 256,
                size_y: 256,
            })
            .collect();
        Self {
            frames: default_frames(),
            agent_region: Some(format!("[r{}, r{}]", centre.0, centre.1)),
            camera: Some(format!("[r{}, r{}, r30]", centre.0 + 128, centre.1 + 128)),
            settings: None,
            regions,
        }
    }
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn populate(world: &mut World, scenario: &Scenario) -> Result<()> {
    for region in &scenario.regions {
        let handle = RegionHandle::parse_sl_format(&region.handle).map_err(|e| anyhow!(e))?;
        world.add_region(handle, region.host, region.size_x, region.size_y)?;
    }

    if let Some(agent) = &scenario.agent_region {
        let handle = RegionHandle::parse_sl_format(agent).map_err(|e| anyhow!(e))?;
        world.set_agent_region(handle)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    log_system_info();
    info!("{} {}", slv_world::APP_NAME, slv_world::VERSION);

    let scenario = match std::env::args().nth(1) {
        Some(path) => load_scenario(Path::new(&path))?,
        None => {
            info!("No scenario given, using the built-in region cluster");
            Scenario::default()
        }
    };

    let settings = match &scenario.settings {
        Some(path) => load_world_settings_from(Path::new(path))
            .with_context(|| format!("loading settings {}", path))?,
        None => load_world_settings().unwrap_or_default(),
    };
    let budget = settings.update.region_update_budget();
    let frame_interval = settings.update.frame_interval();
    let far_clip = settings.draw.draw_distance;

    let mut world = World::new(settings);
    let events = world.subscribe();
    populate(&mut world, &scenario)?;

    let camera = match &scenario.camera {
        Some(text) => Some(parse_sl_vector(text).map_err(|e| anyhow!(e))?),
        None => world.agent_region().map(|r| r.center_global()),
    };

    info!(
        "Running {} frames over {} regions ({} hole tiles, budget {:?})",
        scenario.frames,
        world.region_count(),
        world.water().holes.len(),
        budget
    );

    let mut ticker = tokio::time::interval(frame_interval);
    for _ in 0..scenario.frames {
        ticker.tick().await;

        if let Some(camera) = camera {
            world.update_visibilities(camera, far_clip);
        }
        world.update_regions(budget);

        for event in events.try_iter() {
            match &event.kind {
                WorldEventKind::ForceDisconnect { reason } => {
                    warn!("Forced disconnect: {}", reason);
                    return Ok(());
                }
                kind => info!("World event: {:?}", kind),
            }
        }
    }

    info!(
        "Done after {} frames: {} visible, {} culled regions",
        world.frame(),
        world.visible_regions().len(),
        world.culled_regions().len()
    );
    world.disconnect_regions();
    Ok(())
}
