//! Time sources and the per-session stream clock.
//!
//! Frame timestamps are milliseconds on a monotonic timeline (`f64`), measured
//! from the clock's own origin. Sources pace themselves through a `Clock` so
//! tests can substitute `ManualClock` and run without sleeping.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source with the ability to wait.
pub trait Clock: Send + Sync {
    /// Milliseconds since the clock's origin.
    fn now_ms(&self) -> f64;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `Instant`.
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Test clock. `sleep` advances time instantly and records the request.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Mutex<f64>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut now) = self.now_ms.lock() {
            *now += duration.as_secs_f64() * 1000.0;
        }
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|sleeps| sleeps.clone())
            .unwrap_or_default()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now_ms.lock().map(|now| *now).unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
    }
}

/// Frame counter for one stream session.
///
/// Reset at every session boundary (source started, channel switched) and
/// ticked once per rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StreamClock {
    start_time: Option<f64>,
    frame_count: u64,
}

impl StreamClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Count a rendered frame at `now_ms` and return the FPS estimate.
    ///
    /// The first frame of a session anchors `start_time`, so its elapsed time
    /// is zero and the estimate is 0.
    pub fn tick(&mut self, now_ms: f64) -> f64 {
        let start = *self.start_time.get_or_insert(now_ms);
        self.frame_count += 1;
        let elapsed_s = (now_ms - start) / 1000.0;
        let fps = self.frame_count as f64 / elapsed_s;
        if fps.is_finite() && fps >= 0.0 {
            fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_reports_zero_fps() {
        let mut clock = StreamClock::new();
        assert_eq!(clock.tick(1234.0), 0.0);
        assert_eq!(clock.start_time(), Some(1234.0));
        assert_eq!(clock.frame_count(), 1);
    }

    #[test]
    fn fps_is_frames_over_elapsed_seconds() {
        let mut clock = StreamClock::new();
        clock.tick(0.0);
        clock.tick(500.0);
        let fps = clock.tick(1000.0);
        assert!((fps - 3.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_start_and_count() {
        let mut clock = StreamClock::new();
        clock.tick(10.0);
        clock.tick(20.0);
        clock.reset();
        assert_eq!(clock.start_time(), None);
        assert_eq!(clock.frame_count(), 0);
    }

    #[test]
    fn backwards_time_never_yields_negative_fps() {
        let mut clock = StreamClock::new();
        clock.tick(1000.0);
        assert_eq!(clock.tick(500.0), 0.0);
    }

    #[test]
    fn manual_clock_records_sleeps() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(200));
        clock.sleep(Duration::from_millis(50));
        assert_eq!(clock.now_ms(), 250.0);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(200), Duration::from_millis(50)]
        );
    }
}
