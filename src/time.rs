//! Frame timing.
//!
//! [`FrameClock`] feeds the `elapsed_time` uniform and counts frames. Particle
//! rotation is deliberately *not* scaled by delta time: it advances a fixed
//! step per frame, so pausing the clock also freezes the smoke.

use std::time::{Duration, Instant};

/// Elapsed time, delta time and frame counter for the render loop.
#[derive(Debug)]
pub struct FrameClock {
    /// When the clock was created.
    start: Instant,
    /// When the last frame occurred.
    last_frame: Instant,
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    paused: bool,
    /// Total time spent paused, excluded from `elapsed`.
    pause_elapsed: Duration,
    paused_at: Option<Instant>,
}

impl FrameClock {
    /// Create a new clock starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            paused: false,
            pause_elapsed: Duration::ZERO,
            paused_at: None,
        }
    }

    /// Update timing values. Call once per frame.
    ///
    /// Returns `(elapsed_time, delta_time)` for convenience.
    pub fn update(&mut self) -> (f32, f32) {
        let now = Instant::now();

        if self.paused {
            self.delta_secs = 0.0;
            return (self.elapsed_secs, self.delta_secs);
        }

        self.delta_secs = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.elapsed_secs = (now.duration_since(self.start) - self.pause_elapsed).as_secs_f32();
        self.frame_count += 1;

        (self.elapsed_secs, self.delta_secs)
    }

    /// Total elapsed time in seconds, excluding pauses.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    /// Time since last frame in seconds.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Frames advanced since start (paused frames don't count).
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop time from advancing.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.paused_at = Some(Instant::now());
        }
    }

    /// Resume after [`pause`](Self::pause).
    pub fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            let now = Instant::now();
            self.pause_elapsed += now.duration_since(at);
            self.last_frame = now;
        }
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
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
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert!(!clock.is_paused());
        assert_eq!(clock.elapsed(), 0.0);
    }

    #[test]
    fn test_clock_update() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let (elapsed, delta) = clock.update();

        assert!(elapsed > 0.0);
        assert!(delta > 0.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_clock_pause() {
        let mut clock = FrameClock::new();
        clock.update();

        clock.pause();
        assert!(clock.is_paused());

        let elapsed_before = clock.elapsed();
        thread::sleep(Duration::from_millis(10));
        clock.update();

        // Elapsed should not increase while paused
        assert_eq!(clock.elapsed(), elapsed_before);
        assert_eq!(clock.delta(), 0.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_resume_excludes_paused_time() {
        let mut clock = FrameClock::new();
        clock.pause();
        thread::sleep(Duration::from_millis(50));
        clock.toggle_pause();
        assert!(!clock.is_paused());

        let (elapsed, _) = clock.update();
        assert!(elapsed < 0.045, "paused time leaked into elapsed: {elapsed}");
    }
}
