use serde::{Deserialize, Serialize};
use crate::vecmath::Vec2;

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Arena & Grid
    pub world_width: f32,
    pub world_height: f32,
    pub grid_rows: u32,
    pub grid_columns: u32,

    // Time
    pub dt: f32, // Fixed frame delta in seconds, 0 when frames are timed by a wall clock

    // Engine
    pub parallel_collisions: bool,
}

impl SimParams {
    pub fn arena(&self) -> Vec2 {
        Vec2::new(self.world_width, self.world_height)
    }
}
