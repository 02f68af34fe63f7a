use crate::body::Body;
use anyhow::Result;
use simulation_common::{FrameStats, Snapshot, Vec2};

/// Read-only view of one finished frame, handed to the rendering sink.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub frame: u64,
    /// Simulated seconds since the start of the run.
    pub time: f32,
    pub stats: FrameStats,
    pub bodies: &'a [Body],
}

impl<'a> FrameView<'a> {
    /// `(position, radius)` of every body, in collection order.
    pub fn samples(&self) -> impl Iterator<Item = (Vec2, f32)> + 'a {
        self.bodies.iter().map(|b| (b.position, b.radius))
    }

    pub fn kinetic_energy(&self) -> f32 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    pub fn to_snapshot(&self, include_bodies: bool) -> Snapshot {
        Snapshot {
            frame: self.frame,
            time: self.time,
            total_body_count: self.bodies.len() as u32,
            stats: self.stats,
            kinetic_energy: self.kinetic_energy(),
            bodies: if include_bodies {
                self.bodies.iter().map(Body::sample).collect()
            } else {
                Vec::new()
            },
        }
    }
}

/// Consumer of finished frames (display, recording, ...).
pub trait RenderSink {
    /// Called once per frame after integration.
    fn present(&mut self, view: &FrameView<'_>) -> Result<()>;

    /// Called once when the frame loop stops, with the last presented state.
    fn finish(&mut self, _view: &FrameView<'_>) -> Result<()> {
        Ok(())
    }
}

/// Keeps a `Snapshot` every `interval` frames, plus the final frame.
#[derive(Debug)]
pub struct SnapshotRecorder {
    interval: u64,
    include_bodies: bool,
    snapshots: Vec<Snapshot>,
}

impl SnapshotRecorder {
    pub fn new(interval: u64, include_bodies: bool) -> Self {
        SnapshotRecorder { interval: interval.max(1), include_bodies, snapshots: Vec::new() }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }

    fn record(&mut self, view: &FrameView<'_>) {
        log::debug!("Recording snapshot at frame {} ({:.3} s)", view.frame, view.time);
        self.snapshots.push(view.to_snapshot(self.include_bodies));
    }
}

impl RenderSink for SnapshotRecorder {
    fn present(&mut self, view: &FrameView<'_>) -> Result<()> {
        if view.frame % self.interval == 0 {
            self.record(view);
        }
        Ok(())
    }

    fn finish(&mut self, view: &FrameView<'_>) -> Result<()> {
        let already = self.snapshots.last().map_or(false, |s| s.frame == view.frame);
        if !already {
            self.record(view);
        }
        Ok(())
    }
}

impl<S: RenderSink + ?Sized> RenderSink for &mut S {
    fn present(&mut self, view: &FrameView<'_>) -> Result<()> {
        (**self).present(view)
    }

    fn finish(&mut self, view: &FrameView<'_>) -> Result<()> {
        (**self).finish(view)
    }
}
