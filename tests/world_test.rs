use glam::{DVec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use slv_world::config::{Grid, WorldSettings};
use slv_world::world::limits::OpenSimExtras;
use slv_world::world::surface::PATCH_SAMPLES;
use slv_world::world::WaterKind;
use slv_world::{Direction, RegionHandle, RemoveOutcome, World, WorldError, WorldEventKind};
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

const BASE: u32 = 256000;

fn host(port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], port))
}

fn cell(gx: u32, gy: u32) -> RegionHandle {
    RegionHandle::from_global(BASE + gx * 256, BASE + gy * 256)
}

/// Every link must be mirrored by the linked region
fn assert_symmetric(world: &World) {
    for region in world.regions() {
        for (dir, neighbor) in region.neighbors() {
            let other = world
                .regions()
                .iter()
                .find(|r| r.handle() == neighbor)
                .unwrap_or_else(|| panic!("{} links to missing {}", region.handle(), neighbor));
            assert_eq!(
                other.neighbor(dir.opposite()),
                Some(region.handle()),
                "{} -> {} ({}) is not mirrored",
                region.handle(),
                neighbor,
                dir
            );
        }
    }
}

fn grid_world(n: u32) -> World {
    let mut world = World::default();
    for gy in 0..n {
        for gx in 0..n {
            let port = 13000 + (gy * n + gx) as u16;
            world.add_region(cell(gx, gy), host(port), 256, 256).unwrap();
        }
    }
    world
}

#[test]
fn test_neighbors_in_grid() {
    let world = grid_world(3);
    assert_eq!(world.region_count(), 9);
    assert_symmetric(&world);

    let centre = world.region_from_handle(cell(1, 1)).unwrap();
    assert_eq!(centre.neighbors().count(), 8);
    assert_eq!(centre.neighbor(Direction::North), Some(cell(1, 2)));
    assert_eq!(centre.neighbor(Direction::SouthWest), Some(cell(0, 0)));

    let corner = world.region_from_handle(cell(0, 0)).unwrap();
    assert_eq!(corner.neighbors().count(), 3);
    assert_eq!(corner.neighbor(Direction::West), None);
    assert_eq!(corner.neighbor(Direction::NorthEast), Some(cell(1, 1)));
}

#[test]
fn test_add_existing_alive_region_is_noop() {
    let mut world = World::default();
    let events = world.subscribe();
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    let added = events
        .try_iter()
        .filter(|e| matches!(e.kind, WorldEventKind::RegionAdded { .. }))
        .count();
    assert_eq!(added, 1);

    let region = world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    assert_eq!(region.host(), host(1));
    assert_eq!(world.region_count(), 1);
    assert!(events.try_iter().next().is_none());
}

#[test]
fn test_replacing_region_keeps_seed() {
    let mut world = World::default();
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    world.add_region(cell(1, 0), host(2), 256, 256).unwrap();
    world
        .region_by_host_mut(host(1))
        .unwrap()
        .set_capability("Seed", "https://sim1.agni.lindenlab.com:12043/cap/seed");

    // Same handle, new host
    let region = world.add_region(cell(0, 0), host(3), 256, 256).unwrap();
    assert_eq!(region.host(), host(3));
    assert_eq!(region.capability("Seed"), Some("https://sim1.agni.lindenlab.com:12043/cap/seed"));
    assert_eq!(region.neighbor(Direction::East), Some(cell(1, 0)));
    assert_eq!(world.region_count(), 2);
    assert!(world.region_by_host(host(1)).is_none());
    assert_symmetric(&world);
}

#[test]
fn test_dead_region_is_replaced() {
    let mut world = World::default();
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    assert!(world.set_region_alive(host(1), false));

    let events = world.subscribe();
    let region = world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    assert!(region.is_alive());

    let kinds: Vec<_> = events.try_iter().map(|e| e.kind).collect();
    assert!(kinds.iter().any(|k| matches!(k, WorldEventKind::RegionRemoved { .. })));
    assert!(kinds.iter().any(|k| matches!(k, WorldEventKind::RegionAdded { .. })));
}

#[test]
fn test_one_alive_region_per_host() {
    let mut world = World::default();
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    world.add_region(cell(2, 0), host(1), 256, 256).unwrap();

    assert_eq!(world.region_count(), 1);
    assert_eq!(world.region_by_host(host(1)).unwrap().handle(), cell(2, 0));
}

#[test]
fn test_host_in_use_by_agent_region() {
    let mut world = World::default();
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    world.set_agent_region(cell(0, 0)).unwrap();

    let err = world.add_region(cell(3, 3), host(1), 256, 256).unwrap_err();
    assert!(matches!(err, WorldError::HostInUse { .. }));
    assert_eq!(world.region_count(), 1);
}

#[test]
fn test_host_lookup_prefers_alive_region() {
    let mut world = World::default();
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    world.set_region_alive(host(1), false);
    world.add_region(cell(1, 0), host(1), 256, 256).unwrap();
    world.set_agent_region(cell(1, 0)).unwrap();
    assert_eq!(world.region_count(), 2);

    assert_eq!(world.region_by_host(host(1)).unwrap().handle(), cell(1, 0));
    assert_eq!(world.remove_region(host(1)), RemoveOutcome::ForcedDisconnect);
    assert_eq!(world.region_count(), 2);
}

#[test]
fn test_invalid_regions_rejected() {
    let mut world = World::default();
    assert!(matches!(
        world.add_region(cell(0, 0), host(1), 0, 256),
        Err(WorldError::InvalidRegionSize { .. })
    ));
    assert!(matches!(
        world.add_region(cell(0, 0), host(1), 300, 256),
        Err(WorldError::InvalidRegionSize { .. })
    ));
    assert!(matches!(
        world.add_region(RegionHandle::from_global(BASE + 10, BASE), host(1), 256, 256),
        Err(WorldError::MisalignedHandle { .. })
    ));
    assert_eq!(world.region_count(), 0);
}

#[test]
fn test_remove_region() {
    let mut world = grid_world(2);
    assert_eq!(world.remove_region(host(9999)), RemoveOutcome::NotFound);

    let removed = world.region_from_handle(cell(1, 1)).unwrap().host();
    assert_eq!(world.remove_region(removed), RemoveOutcome::Removed);
    assert_eq!(world.region_count(), 3);
    assert!(world.region_from_handle(cell(1, 1)).is_none());

    let corner = world.region_from_handle(cell(0, 0)).unwrap();
    assert_eq!(corner.neighbor(Direction::NorthEast), None);
    assert_eq!(corner.neighbor(Direction::East), Some(cell(1, 0)));
    assert_symmetric(&world);
}

#[test]
fn test_remove_agent_region_forces_disconnect() {
    let mut world = grid_world(2);
    world.set_agent_region(cell(0, 0)).unwrap();
    let events = world.subscribe();

    let agent_host = world.agent_region().unwrap().host();
    assert_eq!(world.remove_region(agent_host), RemoveOutcome::ForcedDisconnect);
    assert_eq!(world.region_count(), 4);
    assert!(world.is_disconnected());
    assert!(events.try_iter().any(|e| e.is_fatal()));
}

#[test]
fn test_random_add_remove_keeps_invariants() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut world = World::default();

    for step in 0..400u16 {
        let gx = rng.random_range(0..5);
        let gy = rng.random_range(0..5);
        if rng.random_bool(0.6) {
            let size = if rng.random_bool(0.2) { 512 } else { 256 };
            let port = 20000 + rng.random_range(0..30);
            let _ = world.add_region(cell(gx, gy), host(port), size, size);
        } else if let Some(region) = world.region_from_handle(cell(gx, gy)) {
            let h = region.host();
            assert_ne!(world.remove_region(h), RemoveOutcome::NotFound, "step {}", step);
        }

        assert_symmetric(&world);
        let mut hosts: Vec<_> = world
            .regions()
            .iter()
            .filter(|r| r.is_alive())
            .map(|r| r.host())
            .collect();
        let before = hosts.len();
        hosts.sort();
        hosts.dedup();
        assert_eq!(before, hosts.len(), "duplicate host at step {}", step);
    }
}

#[test]
fn test_large_region_lookups() {
    let mut world = World::default();
    world.add_region(cell(0, 0), host(1), 512, 512).unwrap();
    world.add_region(cell(2, 0), host(2), 256, 256).unwrap();

    assert_eq!(world.region_from_handle(cell(1, 1)).unwrap().host(), host(1));
    let big = world.region_from_handle(cell(0, 0)).unwrap();
    assert_eq!(big.neighbor(Direction::East), Some(cell(2, 0)));
    assert_symmetric(&world);

    let pos = DVec3::new(f64::from(BASE) + 400.0, f64::from(BASE) + 300.0, 25.0);
    assert_eq!(world.region_from_pos_global(pos).unwrap().host(), host(1));
    assert!(world.position_region_valid_global(pos));
    let outside = DVec3::new(f64::from(BASE) + 600.0, f64::from(BASE) + 300.0, 0.0);
    assert!(!world.position_region_valid_global(outside));
}

#[test]
fn test_agent_frame() {
    let mut world = grid_world(2);
    assert!(matches!(world.set_agent_region(cell(7, 7)), Err(WorldError::UnknownRegion { .. })));
    world.set_agent_region(cell(1, 0)).unwrap();

    let global = DVec3::new(f64::from(BASE) + 300.0, f64::from(BASE) + 10.0, 22.0);
    let agent = world.pos_agent_from_global(global);
    assert_eq!(agent, Vec3::new(44.0, 10.0, 22.0));
    assert_eq!(world.pos_global_from_agent(agent), global);

    let west = world.region_from_pos_agent(Vec3::new(-100.0, 10.0, 0.0)).unwrap();
    assert_eq!(west.handle(), cell(0, 0));
}

#[test]
fn test_handshake_and_lookup_by_id() {
    let mut world = grid_world(1);
    let region_id = Uuid::parse_str("11111111-2222-3333-4444-555555555555").unwrap();
    world.dispatch(
        "RegionHandshake",
        host(13000),
        &json!({
            "RegionInfo": {
                "SimName": "Ahern",
                "RegionID": region_id.to_string(),
                "RegionFlags": 1,
                "WaterHeight": 18.0,
                "SimAccess": 13
            }
        }),
    );

    let region = world.region_from_id(region_id).unwrap();
    assert_eq!(region.name(), "Ahern");
    assert_eq!(region.water_height(), 18.0);
    assert_eq!(world.region_from_name("ahern").unwrap().handle(), cell(0, 0));
}

#[test]
fn test_water_covers_box_around_regions() {
    let mut settings = WorldSettings::default();
    settings.draw.draw_distance = 128.0;
    let mut world = World::new(settings);
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    world.add_region(cell(1, 0), host(2), 256, 256).unwrap();

    // 4 x 3 cells around two regions
    assert_eq!(world.water().holes.len(), 10);
    assert_eq!(world.water().edges.len(), 8);
    assert!(world.water().holes.iter().all(|w| w.kind == WaterKind::Hole));
    assert!(world
        .water()
        .holes
        .iter()
        .all(|w| !world.position_region_valid_global(w.position_global)));

    let events = world.subscribe();
    world.set_land_far_clip(200.0);
    assert!(events.try_iter().next().is_none());

    world.set_land_far_clip(300.0);
    assert_eq!(world.water().holes.len(), 6 * 5 - 2);
    assert!(events
        .try_iter()
        .any(|e| e.kind == WorldEventKind::WaterUpdated { holes: 28, edges: 8 }));
}

#[test]
fn test_water_follows_regions() {
    let mut world = World::default();
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    assert_eq!(world.water().holes.len(), 8);

    world.add_region(cell(1, 1), host(2), 256, 256).unwrap();
    assert_eq!(world.water().holes.len(), 4 * 4 - 2);

    world.remove_region(host(2));
    assert_eq!(world.water().holes.len(), 8);

    world.remove_region(host(1));
    assert!(world.water().is_empty());
}

#[test]
fn test_far_clip_out_of_range() {
    let mut world = grid_world(1);
    assert_eq!(world.water().holes.len(), 8);

    world.set_land_far_clip(f32::MAX);
    assert_eq!(world.land_far_clip(), 4096.0);
    assert_eq!(world.water().holes.len(), 33 * 33 - 1);

    world.set_land_far_clip(f32::NEG_INFINITY);
    assert_eq!(world.land_far_clip(), 128.0);
    assert_eq!(world.water().holes.len(), 8);

    world.set_land_far_clip(f32::NAN);
    assert_eq!(world.land_far_clip(), 128.0);

    world.set_land_far_clip(-10.0);
    assert_eq!(world.land_far_clip(), 0.0);
    assert_eq!(world.water().holes.len(), 8);
}

#[test]
fn test_configured_far_clip_is_clamped() {
    let mut settings = WorldSettings::default();
    settings.draw.draw_distance = 100000.0;
    let mut world = World::new(settings.clone());
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    assert_eq!(world.land_far_clip(), 4096.0);
    assert_eq!(world.water().holes.len(), 33 * 33 - 1);

    settings.draw.draw_distance = f32::NAN;
    let world = World::new(settings);
    assert_eq!(world.land_far_clip(), 128.0);
}

#[test]
fn test_far_apart_regions_get_edge_water_only() {
    let mut world = World::default();
    world.set_land_far_clip(4096.0);
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    world.add_region(cell(600, 0), host(2), 256, 256).unwrap();

    assert!(world.water().holes.is_empty());
    assert_eq!(world.water().edges.len(), 8);
}

fn dirty_patch(world: &mut World, handle: RegionHandle, px: u32, py: u32, height: f32) {
    let heights = vec![height; PATCH_SAMPLES];
    world.update_land_patch(handle, px, py, &heights).unwrap();
}

fn dirty_count(world: &World, handle: RegionHandle) -> usize {
    world.region_from_handle(handle).unwrap().surface().dirty_patch_count()
}

fn last_update(world: &World, handle: RegionHandle) -> u64 {
    world.region_from_handle(handle).unwrap().last_update()
}

#[test]
fn test_update_regions_budget() {
    let mut world = grid_world(2);
    for region in [cell(0, 0), cell(1, 0), cell(0, 1), cell(1, 1)] {
        dirty_patch(&mut world, region, 0, 0, 10.0);
        dirty_patch(&mut world, region, 1, 0, 10.0);
    }
    assert!(world.regions().iter().all(|r| r.last_update() == 0));

    // No budget: the first region does its work, the rest wait
    world.update_regions(Duration::ZERO);
    assert_eq!(world.frame(), 1);
    assert_eq!(last_update(&world, cell(0, 0)), 1);
    assert_eq!(dirty_count(&world, cell(0, 0)), 1);
    for waiting in [cell(1, 0), cell(0, 1), cell(1, 1)] {
        assert_eq!(last_update(&world, waiting), 0);
        assert_eq!(dirty_count(&world, waiting), 2);
        assert_eq!(world.region_from_handle(waiting).unwrap().skipped_updates(), 1);
    }

    // Those that waited go first next frame
    world.update_regions(Duration::ZERO);
    assert_eq!(last_update(&world, cell(1, 0)), 2);
    assert_eq!(last_update(&world, cell(0, 0)), 1);

    world.update_regions(Duration::from_secs(10));
    assert!(world.regions().iter().all(|r| r.last_update() == 3));
    assert!(world.regions().iter().all(|r| !r.surface().has_dirty_patches()));

    // A newcomer has never been updated and goes first
    world.add_region(cell(5, 5), host(500), 256, 256).unwrap();
    let order = world.update_order();
    assert_eq!(order[0], cell(5, 5));
    assert_eq!(&order[1..], &[cell(0, 0), cell(1, 0), cell(0, 1), cell(1, 1)]);
}

#[test]
fn test_regions_without_work_do_not_use_up_the_frame() {
    let mut world = grid_world(2);
    world.update_regions(Duration::ZERO);
    assert!(world.regions().iter().all(|r| r.last_update() == 1));
}

#[test]
fn test_tiny_budget_still_makes_progress() {
    let mut world = grid_world(1);
    for px in 0..3 {
        dirty_patch(&mut world, cell(0, 0), px, 0, 12.0);
    }

    for frame in 1..=3 {
        world.update_regions(Duration::from_nanos(1));
        assert_eq!(last_update(&world, cell(0, 0)), frame);
    }
    assert_eq!(dirty_count(&world, cell(0, 0)), 0);
}

#[test]
fn test_dirty_patches_retired_by_update() {
    let mut world = grid_world(1);
    dirty_patch(&mut world, cell(0, 0), 2, 3, 30.0);
    dirty_patch(&mut world, cell(0, 0), 5, 5, 40.0);
    let heights = vec![0.0; PATCH_SAMPLES];
    assert!(world.update_land_patch(cell(9, 9), 0, 0, &heights).is_err());

    let pos = DVec3::new(f64::from(BASE) + 40.0, f64::from(BASE) + 52.0, 0.0);
    assert_eq!(world.resolve_land_height_global(pos), 30.0);
    assert_eq!(world.resolve_land_height_global(DVec3::new(1.0, 1.0, 0.0)), 0.0);
    assert_eq!(dirty_count(&world, cell(0, 0)), 2);

    // One patch per frame when there is no time to spare
    world.update_regions(Duration::ZERO);
    let surface = world.region_from_handle(cell(0, 0)).unwrap().surface();
    assert_eq!(surface.dirty_patch_count(), 1);
    assert_eq!(surface.patch(2, 3).unwrap().max_z(), 30.0);
    assert_eq!(surface.patch(5, 5).unwrap().max_z(), 0.0);

    world.update_regions(Duration::ZERO);
    let surface = world.region_from_handle(cell(0, 0)).unwrap().surface();
    assert_eq!(surface.dirty_patch_count(), 0);
    assert_eq!(surface.patch(5, 5).unwrap().max_z(), 40.0);
}

#[test]
fn test_visibility() {
    let mut world = grid_world(3);
    let camera = DVec3::new(f64::from(BASE) + 10.0, f64::from(BASE) + 10.0, 30.0);
    world.update_visibilities(camera, 400.0);

    assert_eq!(world.visible_regions().len() + world.culled_regions().len(), 9);
    assert!(world.visible_regions().contains(&cell(1, 1)));
    assert!(world.culled_regions().contains(&cell(2, 2)));
}

#[test]
fn test_clip_to_visible_regions() {
    let world = grid_world(1);
    let start = DVec3::new(f64::from(BASE) + 128.0, f64::from(BASE) + 128.0, 20.0);

    let inside = DVec3::new(f64::from(BASE) + 200.0, f64::from(BASE) + 10.0, 20.0);
    assert_eq!(world.clip_to_visible_regions(start, inside), inside);

    let outside = DVec3::new(f64::from(BASE) + 384.0, f64::from(BASE) + 128.0, 40.0);
    let clipped = world.clip_to_visible_regions(start, outside);
    assert_eq!(clipped, DVec3::new(f64::from(BASE) + 256.0, f64::from(BASE) + 128.0, 30.0));

    let nowhere = DVec3::new(1.0, 1.0, 1.0);
    assert_eq!(world.clip_to_visible_regions(nowhere, outside), nowhere);
}

#[test]
fn test_dispatch_enable_and_disable_simulator() {
    let mut world = World::default();
    let handle = cell(0, 0);
    world.dispatch(
        "EnableSimulator",
        host(1),
        &json!({"SimulatorInfo": [{"Handle": handle.0, "IP": "10.0.0.7", "Port": 13007}]}),
    );
    let sim = SocketAddr::from(([10, 0, 0, 7], 13007));
    assert_eq!(world.region_by_host(sim).unwrap().handle(), handle);

    // Malformed bodies are logged and ignored
    world.dispatch("EnableSimulator", host(1), &json!({"SimulatorInfo": "nope"}));
    world.dispatch("CoarseLocationUpdate", sim, &json!({"Location": 5}));
    world.dispatch("NoSuchMessage", sim, &json!({}));
    world.dispatch("DisableSimulator", host(4242), &json!({}));
    assert_eq!(world.region_count(), 1);

    world.dispatch("DisableSimulator", sim, &json!({}));
    assert_eq!(world.region_count(), 0);
}

#[test]
fn test_enable_simulator_skips_bad_entries() {
    let mut world = World::default();
    let misaligned = RegionHandle::from_global(BASE + 10, BASE);
    world.dispatch(
        "EnableSimulator",
        host(1),
        &json!({"SimulatorInfo": [
            {"Handle": cell(0, 0).0, "IP": "10.0.0.7", "Port": 13007},
            {"Handle": misaligned.0, "IP": "10.0.0.8", "Port": 13008},
            {"Handle": cell(1, 0).0, "IP": "10.0.0.9", "Port": 13009}
        ]}),
    );

    assert_eq!(world.region_count(), 2);
    assert!(world.region_from_handle(cell(1, 0)).is_some());
}

#[test]
fn test_coarse_locations() {
    let mut world = grid_world(2);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    world.dispatch(
        "CoarseLocationUpdate",
        host(13001),
        &json!({
            "Location": [{"X": 10, "Y": 20, "Z": 5}, {"X": 250, "Y": 250, "Z": 0}],
            "AgentData": [{"AgentID": a.to_string()}, {"AgentID": b.to_string()}]
        }),
    );

    let region = world.region_by_host(host(13001)).unwrap();
    assert_eq!(region.map_avatars().len(), 2);
    assert_eq!(region.map_avatars()[0].position, Vec3::new(10.0, 20.0, 20.0));

    let near = DVec3::new(f64::from(BASE) + 256.0 + 12.0, f64::from(BASE) + 20.0, 20.0);
    let found = world.avatars_near(near, 5.0);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, a);
}

#[test]
fn test_limits_refresh_lazily() {
    let mut world = grid_world(1);
    assert_eq!(world.limits().max_height, 4096.0);

    world.set_grid(Grid::opensim("OSGrid".to_string(), "http://login.osgrid.org/".to_string()));
    assert!(world.limits_need_refresh());
    assert_eq!(world.limits().max_height, 4096.0);

    world.update_regions(Duration::from_millis(1));
    assert!(!world.limits_need_refresh());
    assert_eq!(world.limits().max_height, 10000.0);
}

#[test]
fn test_simulator_features_only_from_agent_region() {
    let mut settings = WorldSettings::default();
    settings.grid = Grid::opensim("Local".to_string(), "http://127.0.0.1:9000/".to_string());
    let mut world = World::new(settings);
    world.add_region(cell(0, 0), host(1), 256, 256).unwrap();
    world.add_region(cell(1, 0), host(2), 256, 256).unwrap();
    world.set_agent_region(cell(0, 0)).unwrap();

    let extras = OpenSimExtras {
        max_prim_scale: Some(128.0),
        ..Default::default()
    };
    assert!(!world.apply_simulator_features(host(2), &extras));
    assert_eq!(world.limits().max_prim_scale, 256.0);

    world.dispatch(
        "SimulatorFeatures",
        host(1),
        &json!({"OpenSimExtras": {"MaxPrimScale": 128.0, "WhisperRange": 5.0}}),
    );
    assert_eq!(world.limits().max_prim_scale, 128.0);
    assert_eq!(world.limits().whisper_distance, 5.0);
}

#[test]
fn test_disconnect_regions() {
    let mut world = grid_world(2);
    world.set_agent_region(cell(0, 0)).unwrap();
    let events = world.subscribe();

    world.disconnect_regions();
    assert_eq!(world.region_count(), 0);
    assert!(world.agent_region().is_none());
    assert!(world.water().is_empty());

    let removed = events
        .try_iter()
        .filter(|e| matches!(e.kind, WorldEventKind::RegionRemoved { .. }))
        .count();
    assert_eq!(removed, 4);
}
