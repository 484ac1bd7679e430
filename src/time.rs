//! Frame timing.
//!
//! A [`FrameClock`] yields one delta per frame. Interactive runs measure wall
//! time; exports use a fixed `1 / fps` delta so the same settings always
//! produce the same frames.
//!
//! # Example
//!
//! ```ignore
//! use morphdust::time::FrameClock;
//!
//! let mut clock = FrameClock::fixed(30.0);
//! let dt = clock.tick();
//! assert_eq!(dt, 1.0 / 30.0);
//! ```

use std::time::Instant;

/// Largest delta a realtime clock reports; longer stalls are clamped.
pub const MAX_REALTIME_DELTA: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockMode {
    /// Measured wall-clock deltas, clamped to [`MAX_REALTIME_DELTA`].
    Realtime,
    /// A constant delta of `1 / fps`.
    Fixed { fps: f32 },
}

#[derive(Debug)]
pub struct FrameClock {
    mode: ClockMode,
    last_frame: Instant,
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    paused: bool,
    time_scale: f32,
}

impl FrameClock {
    pub fn realtime() -> Self {
        Self::with_mode(ClockMode::Realtime)
    }

    /// A clock advancing by exactly `1 / fps` per tick. Non-positive `fps` becomes 30.
    pub fn fixed(fps: f32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        Self::with_mode(ClockMode::Fixed { fps })
    }

    fn with_mode(mode: ClockMode) -> Self {
        Self {
            mode,
            last_frame: Instant::now(),
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            paused: false,
            time_scale: 1.0,
        }
    }

    /// Advance one frame and return its delta in seconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let raw = match self.mode {
            ClockMode::Realtime => now
                .duration_since(self.last_frame)
                .as_secs_f32()
                .min(MAX_REALTIME_DELTA),
            ClockMode::Fixed { fps } => 1.0 / fps,
        };
        self.last_frame = now;

        self.delta_secs = if self.paused { 0.0 } else { raw * self.time_scale };
        self.elapsed_secs += self.delta_secs;
        self.frame_count += 1;
        self.delta_secs
    }

    #[inline]
    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        matches!(self.mode, ClockMode::Fixed { .. })
    }

    /// Sum of all deltas so far.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.last_frame = Instant::now();
        }
    }

    /// Set time scale multiplier; negative values clamp to zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn reset(&mut self) {
        *self = Self::with_mode(self.mode);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::realtime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fixed_delta() {
        let mut clock = FrameClock::fixed(30.0);
        thread::sleep(Duration::from_millis(20));
        let dt = clock.tick();
        assert_eq!(dt, 1.0 / 30.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_fixed_rejects_bad_fps() {
        assert_eq!(FrameClock::fixed(0.0).mode(), ClockMode::Fixed { fps: 30.0 });
        assert_eq!(FrameClock::fixed(f32::NAN).mode(), ClockMode::Fixed { fps: 30.0 });
    }

    #[test]
    fn test_realtime_clamped() {
        let mut clock = FrameClock::realtime();
        thread::sleep(Duration::from_millis(150));
        let dt = clock.tick();
        assert!(dt <= MAX_REALTIME_DELTA);
        assert!(dt > 0.0);
    }

    #[test]
    fn test_pause() {
        let mut clock = FrameClock::fixed(60.0);
        clock.tick();
        clock.pause();
        let before = clock.elapsed();
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.elapsed(), before);
        clock.resume();
        assert!(clock.tick() > 0.0);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = FrameClock::fixed(10.0);
        clock.set_time_scale(2.0);
        assert!((clock.tick() - 0.2).abs() < 1e-6);
        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
        clock.reset();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.elapsed(), 0.0);
        assert!(clock.is_fixed());
    }
}
