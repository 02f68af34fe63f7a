use crate::body::Body;
use anyhow::Result;
use rand::distr::{Distribution, Uniform};
use rand::Rng;
use simulation_common::{PopulationConfig, Vec2};

// Re-draws allowed when a sampled direction has zero length.
const MAX_DIRECTION_ATTEMPTS: usize = 32;

/// Uniform over `[lo, hi)`, or the single value `lo` when the range is empty.
fn uniform_f32(lo: f32, hi: f32) -> Result<Uniform<f32>> {
    let dist = if lo < hi { Uniform::new(lo, hi)? } else { Uniform::new_inclusive(lo, lo)? };
    Ok(dist)
}

/// Draws the number of bodies for a run from `[min_bodies, max_bodies)`.
pub fn sample_count<R: Rng + ?Sized>(config: &PopulationConfig, rng: &mut R) -> Result<usize> {
    if config.min_bodies >= config.max_bodies {
        return Ok(config.min_bodies as usize);
    }
    let dist = Uniform::new(config.min_bodies, config.max_bodies)?;
    Ok(dist.sample(rng) as usize)
}

/// Creates the initial body population.
///
/// Positions are uniform over the arena, speed and radius uniform in their
/// configured ranges. Direction components are drawn independently from
/// `[-direction_range, direction_range)`; with `normalize_directions` the
/// result is scaled to unit length (zero-length draws are re-sampled), so
/// `speed` alone sets how fast a body moves.
pub fn populate<R: Rng + ?Sized>(config: &PopulationConfig, arena: Vec2, rng: &mut R) -> Result<Vec<Body>> {
    let count = sample_count(config, rng)?;

    let x_dist = uniform_f32(0.0, arena.x)?;
    let y_dist = uniform_f32(0.0, arena.y)?;
    let dir_dist = uniform_f32(-config.direction_range, config.direction_range)?;
    let speed_dist = uniform_f32(config.speed_min, config.speed_max)?;
    let radius_dist = uniform_f32(config.radius_min, config.radius_max)?;

    let mut bodies = Vec::with_capacity(count);
    let mut redraws = 0usize;
    for _ in 0..count {
        let position = Vec2::new(x_dist.sample(rng), y_dist.sample(rng));

        let mut direction = Vec2::new(dir_dist.sample(rng), dir_dist.sample(rng));
        if config.normalize_directions {
            let mut attempts = 1;
            direction = loop {
                if let Some(unit) = direction.try_normalize() {
                    break unit;
                }
                if attempts >= MAX_DIRECTION_ATTEMPTS {
                    log::warn!("Could not draw a non-zero direction after {} attempts, using +x.", attempts);
                    break Vec2::UNIT_X;
                }
                attempts += 1;
                redraws += 1;
                direction = Vec2::new(dir_dist.sample(rng), dir_dist.sample(rng));
            };
        }

        let speed = speed_dist.sample(rng);
        let radius = radius_dist.sample(rng);
        bodies.push(Body::new(position, direction, speed, radius));
    }

    if redraws > 0 {
        log::debug!("Re-drew {} zero-length initial directions.", redraws);
    }
    log::info!("Populated arena with {} bodies.", bodies.len());
    Ok(bodies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> PopulationConfig {
        PopulationConfig { seed: Some(7), ..PopulationConfig::default() }
    }

    #[test]
    fn samples_stay_in_configured_ranges() {
        let cfg = config();
        let arena = Vec2::new(1024.0, 768.0);
        let mut rng = StdRng::seed_from_u64(7);
        let bodies = populate(&cfg, arena, &mut rng).unwrap();

        assert!(bodies.len() >= 200 && bodies.len() < 300);
        for b in &bodies {
            assert!(b.position.x >= 0.0 && b.position.x < arena.x);
            assert!(b.position.y >= 0.0 && b.position.y < arena.y);
            assert!(b.radius >= 5.0 && b.radius < 10.0);
            assert!(b.speed >= 30.0 && b.speed < 60.0);
            assert!((b.direction.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn same_seed_same_population() {
        let cfg = config();
        let arena = Vec2::new(300.0, 200.0);
        let a = populate(&cfg, arena, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = populate(&cfg, arena, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn raw_directions_keep_their_length() {
        let cfg = PopulationConfig { normalize_directions: false, ..config() };
        let mut rng = StdRng::seed_from_u64(3);
        let bodies = populate(&cfg, Vec2::new(100.0, 100.0), &mut rng).unwrap();
        let range = cfg.direction_range;
        assert!(bodies.iter().all(|b| b.direction.x.abs() <= range && b.direction.y.abs() <= range));
        assert!(bodies.iter().any(|b| (b.direction.length() - 1.0).abs() > 1e-3));
    }

    #[test]
    fn equal_bounds_give_exact_values() {
        let cfg = PopulationConfig {
            min_bodies: 5,
            max_bodies: 5,
            radius_min: 3.0,
            radius_max: 3.0,
            speed_min: 0.0,
            speed_max: 0.0,
            ..config()
        };
        let bodies = populate(&cfg, Vec2::new(50.0, 50.0), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(bodies.len(), 5);
        assert!(bodies.iter().all(|b| b.radius == 3.0 && b.speed == 0.0));
    }
}
