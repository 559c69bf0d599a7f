use std::time::Duration;

pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(50);
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);
pub const MAX_FRAME_DELAY: Duration = Duration::from_secs(10);

/// Decides when the next generation is due, independent of the draw rate.
#[derive(Clone, Copy, Debug)]
pub struct FrameTimer {
    delay: Duration,
    since_last_update: Duration,
}

impl FrameTimer {
    pub fn new(delay: Duration) -> Self {
        let delay = delay.max(MIN_FRAME_DELAY);
        // Start due so the first frame steps immediately.
        Self {
            delay,
            since_last_update: delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Accumulates `elapsed` and returns true when a generation should run.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        self.since_last_update += elapsed;
        if self.since_last_update >= self.delay {
            self.since_last_update = Duration::ZERO;
            true
        } else {
            false
        }
    }

    /// Scales the delay by `factor`, keeping it within [`MIN_FRAME_DELAY`] and
    /// [`MAX_FRAME_DELAY`].
    pub fn scale(&mut self, factor: f32) {
        // `max` discards a NaN factor and `min` caps infinite products.
        let scaled = (self.delay.as_secs_f32() * factor.max(0.))
            .min(MAX_FRAME_DELAY.as_secs_f32());
        self.delay = Duration::from_secs_f32(scaled).clamp(MIN_FRAME_DELAY, MAX_FRAME_DELAY);
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_DELAY)
    }
}
