//! Narrow phase: wall reflection and pairwise elastic response.
//!
//! Both checks mutate bodies in place and never allocate. Masses are the
//! body radii, so larger bodies behave as heavier ones.

use crate::body::Body;
use simulation_common::{FrameStats, Vec2};

/// Result of testing one pair of bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    /// Not touching; neither body was modified.
    Separated,
    /// Overlapping; velocities were exchanged along the contact normal.
    Resolved,
    /// Centres coincide so no contact normal exists; neither body was modified.
    Coincident,
}

/// Reflects the body's direction off any wall its extent crosses.
///
/// Each axis is checked on its own and both may flip in one call. The
/// position is not corrected; integration carries the body back inside.
/// Returns true if the direction changed.
#[inline]
pub fn check_bounds(body: &mut Body, arena: Vec2) -> bool {
    let mut reflected = false;

    if body.position.x - body.radius < 0.0 || body.position.x + body.radius > arena.x {
        body.direction = body.direction.reflected(Vec2::UNIT_X);
        reflected = true;
    }
    if body.position.y - body.radius < 0.0 || body.position.y + body.radius > arena.y {
        body.direction = body.direction.reflected(Vec2::UNIT_Y);
        reflected = true;
    }

    reflected
}

/// Resolves an elastic collision between `a` and `b` if they overlap.
///
/// Only the velocity components along the contact normal change; the
/// tangential parts are kept. When the overlap `(ra + rb)^2 - d^2` exceeds
/// `ra^2` the bodies are treated as stuck and `a` alone is pushed back by its
/// radius along the normal.
pub fn check_collision(a: &mut Body, b: &mut Body) -> CollisionOutcome {
    let distance = b.position - a.position;
    let sq_mag = distance.length_squared();
    let radius_sum = a.radius + b.radius;
    let radius_sum_sq = radius_sum * radius_sum;

    if sq_mag > radius_sum_sq {
        return CollisionOutcome::Separated;
    }

    let normal = match distance.try_normalize() {
        Some(n) => n,
        None => {
            log::trace!("Skipping collision between coincident bodies at ({:.3}, {:.3})", a.position.x, a.position.y);
            return CollisionOutcome::Coincident;
        }
    };

    let m1 = a.mass();
    let m2 = b.mass();

    let mut v1 = a.velocity();
    let mut v2 = b.velocity();

    // projections onto the contact normal
    let p1 = v1.dot(normal);
    let p2 = v2.dot(normal);

    let total_mass = m1 + m2;
    let p1_after = ((m1 - m2) * p1 + 2.0 * m2 * p2) / total_mass;
    let p2_after = ((m2 - m1) * p2 + 2.0 * m1 * p1) / total_mass;

    v1 += normal * (p1_after - p1);
    v2 += normal * (p2_after - p2);

    let penetration = radius_sum_sq - sq_mag;
    if penetration > a.radius * a.radius {
        a.position -= normal * a.radius;
    }

    a.set_velocity(v1);
    b.set_velocity(v2);

    CollisionOutcome::Resolved
}

/// Mutable references to two distinct bodies of a slice, `None` when `i == j`.
#[inline]
fn pair_mut(bodies: &mut [Body], i: usize, j: usize) -> Option<(&mut Body, &mut Body)> {
    if i < j {
        let (head, tail) = bodies.split_at_mut(j);
        Some((&mut head[i], &mut tail[0]))
    } else if i > j {
        let (head, tail) = bodies.split_at_mut(i);
        Some((&mut tail[0], &mut head[j]))
    } else {
        None
    }
}

/// Runs the per-cell pass over the bodies listed in `indices`: bounds check
/// for each body, then a collision check against every later body of the
/// same cell (each unordered pair once).
///
/// `indices` must be in bounds for `bodies`. A repeated index is never
/// paired with itself.
pub(crate) fn resolve_cell(bodies: &mut [Body], indices: &[usize], arena: Vec2) -> FrameStats {
    let mut stats = FrameStats::default();

    for (j, &first) in indices.iter().enumerate() {
        if check_bounds(&mut bodies[first], arena) {
            stats.wall_bounces += 1;
        }
        for &second in &indices[j + 1..] {
            let Some((a, b)) = pair_mut(bodies, first, second) else {
                continue;
            };
            match check_collision(a, b) {
                CollisionOutcome::Resolved => stats.collisions += 1,
                CollisionOutcome::Coincident => stats.degenerate_pairs += 1,
                CollisionOutcome::Separated => {}
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARENA: Vec2 = Vec2::new(1024.0, 768.0);

    fn body(x: f32, y: f32, dx: f32, dy: f32, speed: f32, radius: f32) -> Body {
        Body::new(Vec2::new(x, y), Vec2::new(dx, dy), speed, radius)
    }

    fn energy(a: &Body, b: &Body) -> f32 {
        a.kinetic_energy() + b.kinetic_energy()
    }

    #[test]
    fn head_on_equal_masses_swap_velocities() {
        let mut a = body(10.0, 0.0, 1.0, 0.0, 10.0, 5.0);
        let mut b = body(18.0, 0.0, -1.0, 0.0, 10.0, 5.0);

        assert_eq!(check_collision(&mut a, &mut b), CollisionOutcome::Resolved);

        assert!((a.direction - Vec2::new(-1.0, 0.0)).length() < 1e-6);
        assert!((b.direction - Vec2::new(1.0, 0.0)).length() < 1e-6);
        assert!((a.speed - 10.0).abs() < 1e-5);
        assert!((b.speed - 10.0).abs() < 1e-5);
        // overlap 100 - 64 = 36 > 25, so `a` is pushed back by its radius
        assert_eq!(a.position, Vec2::new(5.0, 0.0));
        assert_eq!(b.position, Vec2::new(18.0, 0.0));
    }

    #[test]
    fn shallow_overlap_does_not_move_bodies() {
        let mut a = body(10.0, 0.0, 1.0, 0.0, 10.0, 5.0);
        let mut b = body(19.5, 0.0, -1.0, 0.0, 10.0, 5.0);
        assert_eq!(check_collision(&mut a, &mut b), CollisionOutcome::Resolved);
        assert_eq!(a.position, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn separated_pair_is_untouched() {
        let mut a = body(0.0, 0.0, 0.6, 0.8, 12.0, 3.0);
        let mut b = body(10.0, 0.0, -0.6, 0.8, 7.0, 4.0);
        let (a0, b0) = (a, b);

        assert_eq!(check_collision(&mut a, &mut b), CollisionOutcome::Separated);
        assert_eq!(a.direction.x.to_bits(), a0.direction.x.to_bits());
        assert_eq!(a.direction.y.to_bits(), a0.direction.y.to_bits());
        assert_eq!(a.speed.to_bits(), a0.speed.to_bits());
        assert_eq!(b, b0);
    }

    #[test]
    fn touching_exactly_counts_as_collision() {
        let mut a = body(0.0, 0.0, 1.0, 0.0, 1.0, 1.0);
        let mut b = body(2.0, 0.0, -1.0, 0.0, 1.0, 1.0);
        assert_eq!(check_collision(&mut a, &mut b), CollisionOutcome::Resolved);
    }

    #[test]
    fn coincident_centres_are_skipped() {
        let mut a = body(5.0, 5.0, 1.0, 0.0, 3.0, 2.0);
        let mut b = body(5.0, 5.0, 0.0, 1.0, 4.0, 2.0);
        let (a0, b0) = (a, b);
        assert_eq!(check_collision(&mut a, &mut b), CollisionOutcome::Coincident);
        assert_eq!((a, b), (a0, b0));
    }

    #[test]
    fn unequal_masses_conserve_energy_and_normal_momentum() {
        let normals = [0.0f32, 0.4, 1.3, 2.2, 3.9, 5.5];
        for angle in normals {
            let n = Vec2::new(1.0, 0.0).rotated(angle);
            let t = Vec2::new(-n.y, n.x);
            let center = Vec2::new(100.0, 100.0);

            // approaching along n with some tangential motion
            let va = n * 20.0 + t * 5.0;
            let vb = n * -8.0 - t * 3.0;
            let mut a = Body::new(center, va.normalize_or_zero(), va.length(), 4.0);
            let mut b = Body::new(center + n * 10.0, vb.normalize_or_zero(), vb.length(), 7.0);

            let e0 = energy(&a, &b);
            let m0 = a.mass() * a.velocity().dot(n) + b.mass() * b.velocity().dot(n);
            let ta0 = a.velocity().dot(t);
            let tb0 = b.velocity().dot(t);

            assert_eq!(check_collision(&mut a, &mut b), CollisionOutcome::Resolved);

            let e1 = energy(&a, &b);
            let m1 = a.mass() * a.velocity().dot(n) + b.mass() * b.velocity().dot(n);
            assert!((e0 - e1).abs() / e0 < 1e-4, "energy {} -> {} at angle {}", e0, e1, angle);
            assert!((m0 - m1).abs() < 1e-3, "momentum {} -> {} at angle {}", m0, m1, angle);
            assert!((a.velocity().dot(t) - ta0).abs() < 1e-3);
            assert!((b.velocity().dot(t) - tb0).abs() < 1e-3);
        }
    }

    #[test]
    fn resting_body_hit_head_on_keeps_a_direction() {
        // the mover stops dead; its direction must stay usable
        let mut a = body(10.0, 0.0, 1.0, 0.0, 10.0, 5.0);
        let mut b = body(19.0, 0.0, 1.0, 0.0, 0.0, 5.0);
        check_collision(&mut a, &mut b);
        assert!(a.speed.abs() < 1e-5);
        assert!(a.direction.is_finite());
        assert!((b.speed - 10.0).abs() < 1e-5);
        assert!(a.is_finite() && b.is_finite());
    }

    #[test]
    fn bounds_inside_leaves_direction() {
        let mut b = body(500.0, 400.0, 0.6, -0.8, 10.0, 5.0);
        assert!(!check_bounds(&mut b, ARENA));
        assert_eq!(b.direction, Vec2::new(0.6, -0.8));
    }

    #[test]
    fn bounds_left_edge_flips_x_only() {
        let mut b = body(-2.0, 100.0, -0.6, 0.8, 10.0, 5.0);
        assert!(check_bounds(&mut b, ARENA));
        assert_eq!(b.direction, Vec2::new(0.6, 0.8));
        assert_eq!(b.position, Vec2::new(-2.0, 100.0));
    }

    #[test]
    fn bounds_corner_flips_both_axes() {
        let mut b = body(1020.0, 766.0, 0.6, 0.8, 10.0, 5.0);
        assert!(check_bounds(&mut b, ARENA));
        assert_eq!(b.direction, Vec2::new(-0.6, -0.8));
    }

    #[test]
    fn cell_pass_checks_each_pair_once() {
        let mut bodies = vec![
            body(10.0, 10.0, 1.0, 0.0, 10.0, 5.0),
            body(18.0, 10.0, -1.0, 0.0, 10.0, 5.0),
            body(60.0, 60.0, 0.0, 1.0, 10.0, 5.0),
            body(2.0, 60.0, -1.0, 0.0, 10.0, 5.0),
        ];
        let stats = resolve_cell(&mut bodies, &[0, 1, 2, 3], ARENA);
        assert_eq!(stats.collisions, 1);
        assert_eq!(stats.wall_bounces, 1);
        assert_eq!(bodies[3].direction, Vec2::new(1.0, 0.0));
        assert_eq!(bodies[2].direction, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn pair_mut_handles_either_order() {
        let mut bodies = vec![body(0.0, 0.0, 1.0, 0.0, 1.0, 1.0), body(5.0, 0.0, 1.0, 0.0, 1.0, 2.0)];
        let (a, b) = pair_mut(&mut bodies, 1, 0).unwrap();
        assert_eq!(a.radius, 2.0);
        assert_eq!(b.radius, 1.0);
        assert!(pair_mut(&mut bodies, 1, 1).is_none());
    }

    #[test]
    fn repeated_index_is_not_paired_with_itself() {
        let mut bodies = vec![
            body(10.0, 10.0, 1.0, 0.0, 10.0, 5.0),
            body(18.0, 10.0, -1.0, 0.0, 10.0, 5.0),
        ];
        let stats = resolve_cell(&mut bodies, &[0, 0], ARENA);
        assert_eq!(stats.collisions, 0);
        assert_eq!(stats.degenerate_pairs, 0);
        assert_eq!(bodies[0].direction, Vec2::new(1.0, 0.0));
    }
}
