use crate::body::Body;
use crate::collision::resolve_cell;
use crate::grid::SpatialGrid;
use crate::population::populate;
use crate::render::{FrameView, RenderSink};
use crate::timing::FrameClock;
use anyhow::Result;
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use simulation_common::{FrameStats, SimParams, SimulationConfig};

/// Owns the bodies and the grid and advances them one frame at a time.
///
/// Each frame runs strictly in order: reset grid, bin every body, resolve
/// collisions cell by cell, integrate. No state other than the bodies
/// themselves survives from one frame to the next.
pub struct Simulation {
    /// The simulation configuration the run was built from.
    config: SimulationConfig,
    params: SimParams,
    /// Sole owner of every body; the grid refers to them by index.
    bodies: Vec<Body>,
    grid: SpatialGrid,
    /// Number of completed frames.
    frame: u64,
    /// Simulated seconds since the start.
    time: f32,
    last_stats: FrameStats,
}

impl Simulation {
    /// Creates a simulation with a randomly populated arena.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.population.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let bodies = populate(&config.population, config.get_sim_params().arena(), &mut rng)?;
        Self::with_bodies(config, bodies)
    }

    /// Creates a simulation over an explicit body collection.
    pub fn with_bodies(config: SimulationConfig, bodies: Vec<Body>) -> Result<Self> {
        let params = config.get_sim_params();
        let grid = SpatialGrid::from_params(&params)?;
        if let Some(i) = bodies.iter().position(|b| !(b.radius > 0.0)) {
            anyhow::bail!("Body {} has non-positive radius {}.", i, bodies[i].radius);
        }
        debug!("Simulation Parameters: {:#?}", params);

        Ok(Self {
            config,
            params,
            bodies,
            grid,
            frame: 0,
            time: 0.0,
            last_stats: FrameStats::default(),
        })
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> Result<FrameStats> {
        if !(dt >= 0.0 && dt.is_finite()) {
            anyhow::bail!("Frame delta must be a finite, non-negative number of seconds (got {}).", dt);
        }

        // --- 1. Rebuild Spatial Grid ---
        let mut stats = self.bin_bodies();

        // --- 2. Per-Cell Collision Pass ---
        let collision_stats = if self.params.parallel_collisions {
            self.resolve_cells_parallel()
        } else {
            self.resolve_cells()
        };
        stats.merge(&collision_stats);

        // --- 3. Integrate Motion ---
        self.integrate(dt);

        self.frame += 1;
        self.time += dt;
        self.last_stats = stats;

        trace!(
            "Frame {} (dt {:.4} s): {} binned, {} cells, {} collisions, {} bounces",
            self.frame, dt, stats.binned_bodies, stats.non_empty_cells, stats.collisions, stats.wall_bounces
        );
        Ok(stats)
    }

    /// Clears the grid and inserts every body by index.
    fn bin_bodies(&mut self) -> FrameStats {
        self.grid.reset();

        let mut stats = FrameStats::default();
        for (index, body) in self.bodies.iter().enumerate() {
            if self.grid.insert(index, body.position).is_some() {
                stats.binned_bodies += 1;
            }
        }
        stats.non_empty_cells = self.grid.non_empty_cells().count() as u32;

        let dropped = self.bodies.len() as u32 - stats.binned_bodies;
        if dropped > 0 {
            trace!("{} bodies outside the grid skip collision checks this frame", dropped);
        }
        stats
    }

    fn resolve_cells(&mut self) -> FrameStats {
        let arena = self.params.arena();
        let mut stats = FrameStats::default();
        for (_, cell) in self.grid.non_empty_cells() {
            stats.merge(&resolve_cell(&mut self.bodies, cell.bodies(), arena));
        }
        stats
    }

    /// Same result as `resolve_cells`: every body sits in at most one cell,
    /// so cells are resolved on private copies and written back afterwards.
    fn resolve_cells_parallel(&mut self) -> FrameStats {
        let arena = self.params.arena();
        let bodies = &self.bodies;
        let cells: Vec<&[usize]> = self.grid.non_empty_cells().map(|(_, cell)| cell.bodies()).collect();

        // Parallel calculation on copies of each cell's bodies.
        let resolved: Vec<(&[usize], Vec<Body>, FrameStats)> = cells
            .par_iter()
            .map(|&indices| {
                let mut local: Vec<Body> = indices.iter().map(|&i| bodies[i]).collect();
                let local_indices: Vec<usize> = (0..local.len()).collect();
                let stats = resolve_cell(&mut local, &local_indices, arena);
                (indices, local, stats)
            })
            .collect();

        // Serial write-back.
        let mut stats = FrameStats::default();
        for (indices, local, cell_stats) in resolved {
            for (&i, body) in indices.iter().zip(local) {
                self.bodies[i] = body;
            }
            stats.merge(&cell_stats);
        }
        stats
    }

    fn integrate(&mut self, dt: f32) {
        let mut corrupted = 0usize;
        for body in &mut self.bodies {
            body.advance(dt);
            if !body.is_finite() {
                corrupted += 1;
            }
        }
        if corrupted > 0 {
            warn!("{} bodies have non-finite state after frame {}.", corrupted, self.frame + 1);
        }
    }

    /// Runs frames until `should_stop` returns true.
    ///
    /// The initial state is presented before the first step and `finish` is
    /// called on the sink with the final state. Returns the number of frames
    /// stepped.
    pub fn run<C, S, F>(&mut self, clock: &mut C, sink: &mut S, mut should_stop: F) -> Result<u64>
    where
        C: FrameClock + ?Sized,
        S: RenderSink + ?Sized,
        F: FnMut(&FrameView<'_>) -> bool,
    {
        info!("Starting frame loop with {} bodies.", self.bodies.len());
        let first_frame = self.frame;
        sink.present(&self.view())?;

        while !should_stop(&self.view()) {
            let dt = clock.next_delta();
            self.step(dt)?;
            sink.present(&self.view())?;
        }

        sink.finish(&self.view())?;
        Ok(self.frame - first_frame)
    }

    /// Read-only view of the current state for rendering.
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            frame: self.frame,
            time: self.time,
            stats: self.last_stats,
            bodies: &self.bodies,
        }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Provides access to the simulation parameters.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Provides access to the original simulation configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn current_body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Final `(x, y, radius)` of every body.
    pub fn get_results(&self) -> Vec<(f32, f32, f32)> {
        self.bodies.iter().map(|b| (b.position.x, b.position.y, b.radius)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SnapshotRecorder;
    use crate::timing::FixedClock;
    use anyhow::Context;
    use simulation_common::Vec2;

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.population.seed = Some(42);
        config.population.min_bodies = 50;
        config.population.max_bodies = 60;
        config
    }

    #[test]
    fn rejects_bad_delta() {
        let mut sim = Simulation::new(config()).unwrap();
        assert!(sim.step(-0.1).is_err());
        assert!(sim.step(f32::NAN).is_err());
        assert!(sim.step(0.0).is_ok());
    }

    #[test]
    fn rejects_non_positive_radius() {
        let bodies = vec![Body::new(Vec2::new(1.0, 1.0), Vec2::UNIT_X, 1.0, 0.0)];
        assert!(Simulation::with_bodies(config(), bodies).is_err());
    }

    #[test]
    fn single_body_integrates_in_a_straight_line() {
        let bodies = vec![Body::new(Vec2::new(100.0, 100.0), Vec2::new(0.6, 0.8), 10.0, 5.0)];
        let mut sim = Simulation::with_bodies(config(), bodies).unwrap();
        let stats = sim.step(0.5).unwrap();
        assert_eq!(stats.binned_bodies, 1);
        assert_eq!(stats.non_empty_cells, 1);
        assert!((sim.bodies()[0].position - Vec2::new(103.0, 104.0)).length() < 1e-4);
        assert_eq!(sim.frame(), 1);
        assert_eq!(sim.time(), 0.5);
    }

    #[test]
    fn unbinned_body_still_moves_but_is_not_bounced() {
        // above the arena: row -1, dropped from the grid
        let bodies = vec![Body::new(Vec2::new(100.0, -50.0), Vec2::new(0.0, -1.0), 10.0, 5.0)];
        let mut sim = Simulation::with_bodies(config(), bodies).unwrap();
        let stats = sim.step(1.0).unwrap();
        assert_eq!(stats.binned_bodies, 0);
        assert_eq!(stats.wall_bounces, 0);
        assert_eq!(sim.bodies()[0].position, Vec2::new(100.0, -60.0));
    }

    #[test]
    fn parallel_pass_matches_sequential() {
        let mut sequential = Simulation::new(config()).unwrap();
        let mut parallel_config = config();
        parallel_config.engine.parallel_collisions = true;
        let mut parallel = Simulation::new(parallel_config).unwrap();
        assert_eq!(sequential.bodies(), parallel.bodies());

        for _ in 0..120 {
            let a = sequential.step(1.0 / 60.0).unwrap();
            let b = parallel.step(1.0 / 60.0).unwrap();
            assert_eq!(a, b);
        }
        assert_eq!(sequential.bodies(), parallel.bodies());
    }

    #[test]
    fn run_stops_on_predicate_and_presents_every_frame() {
        let mut sim = Simulation::new(config()).unwrap();
        let mut clock = FixedClock::new(0.01);
        let mut recorder = SnapshotRecorder::new(1, true);
        let frames = sim.run(&mut clock, &mut recorder, |view| view.frame >= 10).unwrap();

        assert_eq!(frames, 10);
        let snapshots = recorder.snapshots();
        assert_eq!(snapshots.len(), 11); // initial state + 10 frames
        assert_eq!(snapshots.last().map(|s| s.frame), Some(10));
        assert_eq!(snapshots[0].bodies.len(), sim.current_body_count());
    }

    struct FailingSink {
        fail_at: u64,
    }

    impl RenderSink for FailingSink {
        fn present(&mut self, view: &FrameView<'_>) -> Result<()> {
            if view.frame == self.fail_at {
                anyhow::bail!("sink closed at frame {}", view.frame);
            }
            Ok(())
        }
    }

    #[test]
    fn run_returns_sink_error_with_its_cause() {
        let mut sim = Simulation::new(config()).unwrap();
        let mut clock = FixedClock::new(0.01);
        let mut sink = FailingSink { fail_at: 3 };
        let err = sim
            .run(&mut clock, &mut sink, |view| view.frame >= 10)
            .context("Simulation frame failed")
            .unwrap_err();

        assert_eq!(sim.frame(), 3);
        assert_eq!(err.to_string(), "Simulation frame failed");
        assert_eq!(err.root_cause().to_string(), "sink closed at frame 3");
    }
}
