use crate::vecmath::Vec2;
use std::f32::consts::TAU;

/// Default number of vertices used to approximate a circle.
pub const DEFAULT_SLICES: usize = 16;

/// Approximates a circle by `slices` vertices on its rim, starting straight
/// "up" (`(0, -1)` in screen space) and stepping by `2π / slices`.
///
/// Returns an empty list for `slices == 0`.
pub fn circle_fan(center: Vec2, radius: f32, slices: usize) -> Vec<Vec2> {
    if slices == 0 {
        return Vec::new();
    }
    let step = TAU / slices as f32;
    let up = Vec2::new(0.0, -1.0);
    (0..slices)
        .map(|i| center + up.rotated(step * i as f32) * radius)
        .collect()
}
