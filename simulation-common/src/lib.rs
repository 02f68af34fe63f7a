pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod tessellate;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, ArenaConfig, GridConfig, PopulationConfig, TimingConfig, TimingMode, EngineConfig, OutputConfig};
pub use sim_params::SimParams;
pub use snapshot::{BodySample, FrameStats, Snapshot, SnapshotFormat, load_snapshots, read_snapshots};
pub use tessellate::{circle_fan, DEFAULT_SLICES};
pub use vecmath::Vec2;
