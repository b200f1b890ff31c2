use glam::{DVec2, DVec3};

/// Width of one grid cell, in meters. Region origins are aligned to it.
pub const REGION_WIDTH_METERS: u32 = 256;
pub const REGION_WIDTH_F64: f64 = REGION_WIDTH_METERS as f64;

/// Parse vector from Second Life format: "[r1.0, r0.0, r0.0]" or "r1,0,0"
pub fn parse_sl_vector(value: &str) -> Result<DVec3, String> {
    let coords = parse_sl_components::<f64>(value)
        .map_err(|_| format!("Invalid vector format: {}", value))?;

    match coords.as_slice() {
        [x, y, z, ..] => Ok(DVec3::new(*x, *y, *z)),
        _ => Err(format!("Invalid vector format: {}", value)),
    }
}

/// Parse a two-component unsigned pair: "[r256000, r256000]"
pub fn parse_sl_pair(value: &str) -> Result<(u32, u32), String> {
    let coords = parse_sl_components::<u32>(value)
        .map_err(|_| format!("Invalid pair format: {}", value))?;

    match coords.as_slice() {
        [x, y, ..] => Ok((*x, *y)),
        _ => Err(format!("Invalid pair format: {}", value)),
    }
}

fn parse_sl_components<T: std::str::FromStr>(value: &str) -> Result<Vec<T>, T::Err> {
    let cleaned = value
        .trim()
        .trim_start_matches(['r', '['])
        .trim_end_matches(']')
        .replace('r', "");

    cleaned.split(',').map(|s| s.trim().parse()).collect()
}

/// Format a global position the way the login service and logs print vectors
pub fn format_sl_vector(v: DVec3) -> String {
    format!("[r{}, r{}, r{}]", v.x, v.y, v.z)
}

/// Planar distance from `point` to the axis-aligned rectangle `[min, max]`.
/// Zero when the point is inside.
pub fn distance_xy_to_rect(point: DVec3, min: DVec2, max: DVec2) -> f64 {
    let p = point.truncate();
    let clamped = p.clamp(min, max);
    p.distance(clamped)
}

/// Largest `t` in `[0, 1]` such that `start + t * (end - start)` stays inside the
/// rectangle on x and y. `start` must already be inside.
pub fn clip_factor_xy(start: DVec3, end: DVec3, min: DVec2, max: DVec2) -> f64 {
    let delta = (end - start).truncate();
    let origin = start.truncate();
    let mut t = 1.0_f64;

    for axis in 0..2 {
        let d = delta[axis];
        if d > 0.0 && origin[axis] + d > max[axis] {
            t = t.min((max[axis] - origin[axis]) / d);
        } else if d < 0.0 && origin[axis] + d < min[axis] {
            t = t.min((min[axis] - origin[axis]) / d);
        }
    }

    t.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        let v = parse_sl_vector("[r128.5, r64, r22.25]").unwrap();
        assert_eq!(v, DVec3::new(128.5, 64.0, 22.25));

        let v = parse_sl_vector("r1,0,0").unwrap();
        assert_eq!(v, DVec3::X);

        assert!(parse_sl_vector("[r1, r2]").is_err());
        assert!(parse_sl_vector("garbage").is_err());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_sl_pair("[r256000, r254976]").unwrap(), (256000, 254976));
        assert!(parse_sl_pair("[r-1, r0]").is_err());
    }

    #[test]
    fn test_distance_to_rect() {
        let min = DVec2::new(0.0, 0.0);
        let max = DVec2::new(256.0, 256.0);
        assert_eq!(distance_xy_to_rect(DVec3::new(10.0, 10.0, 500.0), min, max), 0.0);
        assert_eq!(distance_xy_to_rect(DVec3::new(300.0, 100.0, 0.0), min, max), 44.0);
    }

    #[test]
    fn test_clip_factor() {
        let min = DVec2::new(0.0, 0.0);
        let max = DVec2::new(256.0, 256.0);
        let start = DVec3::new(128.0, 128.0, 0.0);

        let t = clip_factor_xy(start, DVec3::new(384.0, 128.0, 0.0), min, max);
        assert!((t - 0.5).abs() < 1e-9);

        let t = clip_factor_xy(start, DVec3::new(200.0, 200.0, 0.0), min, max);
        assert_eq!(t, 1.0);
    }
}
