use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::SimParams;
use std::path::Path;

/// Upper bound on `rows * columns`; every cell is allocated up front.
pub const MAX_GRID_CELLS: u32 = 1 << 24;

// Size of the bounded arena the bodies move in
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig { width: 1024.0, height: 768.0 }
    }
}

// Uniform spatial grid laid over the arena
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct GridConfig {
    pub rows: u32,
    pub columns: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig { rows: 8, columns: 8 }
    }
}

// Ranges the initial body population is sampled from
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PopulationConfig {
    pub min_bodies: u32,
    pub max_bodies: u32, // Exclusive upper bound
    pub radius_min: f32,
    pub radius_max: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    /// Each direction component is drawn from `[-direction_range, direction_range)`.
    pub direction_range: f32,
    /// Normalize sampled directions so `speed` alone carries the magnitude.
    pub normalize_directions: bool,
    pub seed: Option<u64>, // None = seed from OS entropy
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            min_bodies: 200,
            max_bodies: 300,
            radius_min: 5.0,
            radius_max: 10.0,
            speed_min: 30.0,
            speed_max: 60.0,
            direction_range: 5.0 / 3.0,
            normalize_directions: true,
            seed: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    /// Constant `fixed_dt` every frame; reproducible.
    Fixed,
    /// Deltas measured from a monotonic wall clock.
    Realtime,
}

// Frame pacing and run length
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TimingConfig {
    pub mode: TimingMode,
    pub fixed_dt: f32, // Seconds per frame in fixed mode
    pub total_frames: u64,
    pub record_interval_frames: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            mode: TimingMode::Fixed,
            fixed_dt: 1.0 / 60.0,
            total_frames: 3600,
            record_interval_frames: 1,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolve independent grid cells on the rayon pool.
    pub parallel_collisions: bool,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_snapshots: bool,
    pub save_final_positions: bool,
    pub save_positions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: String::from("ball_collision"),
            save_snapshots: true,
            save_final_positions: false,
            save_positions_in_snapshot: true,
            format: None,
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SimulationConfig {
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let arena = &self.arena;
        if !(arena.width > 0.0 && arena.height > 0.0) {
            anyhow::bail!("arena width and height must be positive (got {}x{}).", arena.width, arena.height);
        }
        if self.grid.rows == 0 || self.grid.columns == 0 {
            anyhow::bail!("grid rows and columns must be greater than 0.");
        }
        match self.grid.rows.checked_mul(self.grid.columns) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => anyhow::bail!(
                "grid of {}x{} cells exceeds the limit of {} cells.",
                self.grid.rows, self.grid.columns, MAX_GRID_CELLS
            ),
        }

        let pop = &self.population;
        if pop.min_bodies > pop.max_bodies {
            anyhow::bail!("min_bodies ({}) exceeds max_bodies ({}).", pop.min_bodies, pop.max_bodies);
        }
        if !(pop.radius_min > 0.0) || pop.radius_min > pop.radius_max {
            anyhow::bail!("radius range [{}, {}) must be positive and ordered.", pop.radius_min, pop.radius_max);
        }
        if pop.speed_min < 0.0 || pop.speed_min > pop.speed_max {
            anyhow::bail!("speed range [{}, {}) must be non-negative and ordered.", pop.speed_min, pop.speed_max);
        }
        if !(pop.direction_range > 0.0) {
            anyhow::bail!("direction_range must be positive.");
        }

        let timing = &self.timing;
        if timing.mode == TimingMode::Fixed && !(timing.fixed_dt > 0.0 && timing.fixed_dt.is_finite()) {
            anyhow::bail!("fixed_dt must be a positive number of seconds.");
        }
        if timing.record_interval_frames == 0 {
            anyhow::bail!("record_interval_frames must be at least 1.");
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let world_width = self.arena.width;
        let world_height = self.arena.height;
        let grid_rows = self.grid.rows;
        let grid_columns = self.grid.columns;

        SimParams {
            world_width,
            world_height,
            grid_rows,
            grid_columns,
            dt: match self.timing.mode {
                TimingMode::Fixed => self.timing.fixed_dt,
                TimingMode::Realtime => 0.0,
            },
            parallel_collisions: self.engine.parallel_collisions,
        }
    }
}
