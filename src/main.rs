use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use log::{info, warn, debug};

use ball_collision_engine::output::{resolve_format, save_final_positions, save_snapshots, snapshot_path};
use ball_collision_engine::{FixedClock, FrameClock, FrameView, RenderSink, RollingAverage, Simulation, SnapshotRecorder, WallClock};
use simulation_common::{SimulationConfig, TimingMode};

/// Headless stand-in for a display: forwards frames to the recorder and
/// reports a smoothed frame rate now and then.
struct ConsoleMonitor {
    recorder: SnapshotRecorder,
    fps: RollingAverage,
    last_present: Instant,
    last_report: Instant,
    total_frames: u64,
}

impl ConsoleMonitor {
    const REPORT_INTERVAL_SECS: f64 = 5.0;

    fn new(recorder: SnapshotRecorder, total_frames: u64) -> Self {
        let now = Instant::now();
        ConsoleMonitor {
            recorder,
            fps: RollingAverage::default(),
            last_present: now,
            last_report: now,
            total_frames,
        }
    }
}

impl RenderSink for ConsoleMonitor {
    fn present(&mut self, view: &FrameView<'_>) -> Result<()> {
        let now = Instant::now();
        let frame_secs = now.duration_since(self.last_present).as_secs_f32();
        self.last_present = now;
        if view.frame > 0 {
            self.fps.push(1.0 / frame_secs);
        }

        if now.duration_since(self.last_report).as_secs_f64() >= Self::REPORT_INTERVAL_SECS {
            info!(
                "Frame [{}/{}] ({:.2} s simulated) | Bodies: {} | Collisions: {} | Bounces: {} | FPS: {:.1}",
                view.frame,
                self.total_frames,
                view.time,
                view.bodies.len(),
                view.stats.collisions,
                view.stats.wall_bounces,
                self.fps.average()
            );
            self.last_report = now;
        }

        self.recorder.present(view)
    }

    fn finish(&mut self, view: &FrameView<'_>) -> Result<()> {
        self.recorder.finish(view)
    }
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Ball Collision Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| String::from("config.toml"));
    let config = if Path::new(&config_path).exists() {
        SimulationConfig::load(&config_path)?
    } else {
        warn!("Config file '{}' not found, using built-in defaults.", config_path);
        SimulationConfig::default()
    };

    info!("Using {} Rayon threads (parallel collisions: {}).", rayon::current_num_threads(), config.engine.parallel_collisions);

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(config)?;
    info!("Simulation initialized with {} bodies.", sim.current_body_count());
    debug!("Grid: {}x{} cells of {:?}", sim.grid().rows(), sim.grid().columns(), sim.grid().cell_size());

    let timing = sim.config().timing.clone();
    let output = sim.config().output.clone();

    let mut clock: Box<dyn FrameClock> = match timing.mode {
        TimingMode::Fixed => Box::new(FixedClock::new(sim.params().dt)),
        TimingMode::Realtime => Box::new(WallClock::new()),
    };
    let recorder = SnapshotRecorder::new(timing.record_interval_frames, output.save_positions_in_snapshot);
    let mut monitor = ConsoleMonitor::new(recorder, timing.total_frames);

    // --- Frame Loop ---
    info!("Running {} frames ({:?} timing)...", timing.total_frames, timing.mode);
    let start_time = Instant::now();
    let total_frames = timing.total_frames;
    let frames = sim
        .run(clock.as_mut(), &mut monitor, |view| view.frame >= total_frames)
        .with_context(|| format!("Simulation frame {} failed", sim.frame() + 1))?;

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished {} frames in {:.3} seconds ({:.1} frames per second).",
        frames,
        total_duration.as_secs_f64(),
        frames as f64 / total_duration.as_secs_f64().max(1e-9)
    );

    // --- Save Recorded Data ---
    if output.save_snapshots {
        let format = resolve_format(output.format.as_deref());
        let path = snapshot_path(&output.base_filename, format);
        let snapshots = monitor.recorder.into_snapshots();
        save_snapshots(&path, &snapshots, format)?;
    } else {
        info!("Skipping saving snapshots as per config (save_snapshots is false).");
    }

    // Save final positions if requested (separate from full snapshots)
    if output.save_final_positions {
        let filename = format!("{}_final_positions.csv", output.base_filename);
        save_final_positions(Path::new(&filename), &sim.get_results())?;
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
