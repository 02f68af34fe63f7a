use std::collections::VecDeque;
use std::time::Instant;

/// Supplies the elapsed time of each frame in seconds.
pub trait FrameClock {
    fn next_delta(&mut self) -> f32;
}

/// Deltas measured between successive calls on a monotonic clock.
#[derive(Debug)]
pub struct WallClock {
    last: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        WallClock { last: Instant::now() }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for WallClock {
    fn next_delta(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last);
        self.last = now;
        delta.as_secs_f32()
    }
}

/// The same delta every frame, for reproducible headless runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    dt: f32,
}

impl FixedClock {
    pub fn new(dt: f32) -> Self {
        FixedClock { dt }
    }
}

impl FrameClock for FixedClock {
    fn next_delta(&mut self) -> f32 {
        self.dt
    }
}

/// Mean of the last `window` samples. Used to smooth the displayed FPS.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    window: usize,
    samples: VecDeque<f32>,
    sum: f64,
}

impl RollingAverage {
    pub const DEFAULT_WINDOW: usize = 100;

    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        RollingAverage { window, samples: VecDeque::with_capacity(window), sum: 0.0 }
    }

    pub fn push(&mut self, sample: f32) {
        if !sample.is_finite() {
            return;
        }
        if self.samples.len() == self.window {
            if let Some(old) = self.samples.pop_front() {
                self.sum -= old as f64;
            }
        }
        self.samples.push_back(sample);
        self.sum += sample as f64;
    }

    /// Average of the retained samples, 0 before the first push.
    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            (self.sum / self.samples.len() as f64) as f32
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_repeats() {
        let mut clock = FixedClock::new(0.25);
        assert_eq!(clock.next_delta(), 0.25);
        assert_eq!(clock.next_delta(), 0.25);
    }

    #[test]
    fn wall_clock_is_non_negative() {
        let mut clock = WallClock::new();
        let a = clock.next_delta();
        let b = clock.next_delta();
        assert!(a >= 0.0 && b >= 0.0);
    }

    #[test]
    fn rolling_average_drops_oldest() {
        let mut avg = RollingAverage::new(3);
        assert_eq!(avg.average(), 0.0);
        avg.push(10.0);
        avg.push(20.0);
        assert_eq!(avg.average(), 15.0);
        avg.push(30.0);
        avg.push(40.0);
        assert_eq!(avg.len(), 3);
        assert_eq!(avg.average(), 30.0);
    }

    #[test]
    fn rolling_average_ignores_infinite_rate() {
        // a zero-length frame yields 1/0
        let mut avg = RollingAverage::new(4);
        avg.push(60.0);
        avg.push(f32::INFINITY);
        assert_eq!(avg.average(), 60.0);
    }
}
