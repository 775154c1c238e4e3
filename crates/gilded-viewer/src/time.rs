use std::time::{Duration, Instant};

/// Per-frame timing handed to the scene.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Seconds since the clock started, accumulated from clamped deltas.
    pub elapsed: f32,
    pub frame: u64,
}

/// Animation clock for the viewer.
///
/// Deltas are clamped so a stalled window (dragging, minimizing, a debugger)
/// does not make the scene jump.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f32,
    frame: u64,
    max_dt: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            frame: 0,
            max_dt: Duration::from_millis(100),
        }
    }

    /// Restarts delta measurement, e.g. after the window was hidden.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let time = self.advance(now.saturating_duration_since(self.last));
        self.last = now;
        time
    }

    fn advance(&mut self, dt: Duration) -> FrameTime {
        let dt = dt.min(self.max_dt).as_secs_f32();
        self.elapsed += dt;
        self.frame = self.frame.wrapping_add(1);
        FrameTime {
            dt,
            elapsed: self.elapsed,
            frame: self.frame,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn long_stalls_are_clamped() {
        let mut clock = FrameClock::new();
        let time = clock.advance(Duration::from_secs(5));
        assert_relative_eq!(time.dt, 0.1, epsilon = 1e-6);
        assert_eq!(time.frame, 1);

        let time = clock.advance(Duration::from_millis(20));
        assert_relative_eq!(time.elapsed, 0.12, epsilon = 1e-6);
        assert_eq!(time.frame, 2);
    }
}
