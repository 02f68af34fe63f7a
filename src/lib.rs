//! Bounded 2D arena of circular bodies with wall bounces and pairwise
//! elastic collisions, narrowed down each frame by a uniform spatial grid.

pub mod body;
pub mod collision;
pub mod grid;
pub mod output;
pub mod population;
pub mod render;
pub mod simulation;
pub mod timing;

pub use body::Body;
pub use collision::{check_bounds, check_collision, CollisionOutcome};
pub use grid::{Cell, SpatialGrid};
pub use render::{FrameView, RenderSink, SnapshotRecorder};
pub use simulation::Simulation;
pub use timing::{FixedClock, FrameClock, RollingAverage, WallClock};
