//! Frame pacing and the frame-time callback clock.

use std::thread;
use std::time::{Duration, Instant};

/// Menu refresh while the core is paused behind it, slightly under 60 Hz.
const MENU_FPS: f64 = 60.5;

/// Everything the target interval depends on, sampled once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingInput {
    pub menu_paused: bool,
    pub slowmotion: bool,
    pub slowmotion_ratio: f32,
    pub fast_forward: bool,
    pub fastforward_ratio: f32,
    pub core_throttle: bool,
    pub fps: f64,
}

/// Target per-frame interval, `None` for an unthrottled frame.
pub fn target_interval(p: &PacingInput) -> Option<Duration> {
    let usec = if p.menu_paused {
        1_000_000.0 / MENU_FPS
    } else if p.fps <= 0.0 {
        return None;
    } else if p.slowmotion {
        f64::from(p.slowmotion_ratio) * 1_000_000.0 / p.fps
    } else if p.fast_forward {
        if p.fastforward_ratio <= 1.0 {
            return None;
        }
        1_000_000.0 / (p.fps * f64::from(p.fastforward_ratio))
    } else if p.core_throttle {
        1_000_000.0 / p.fps
    } else {
        return None;
    };
    Some(Duration::from_micros(usec.round() as u64))
}

/// Sleeps toward `last_target + interval`. A late frame resets the target to
/// now instead of catching up, so drift stays bounded.
#[derive(Debug, Default)]
pub struct FrameLimiter {
    last_target: Option<Instant>,
}

impl FrameLimiter {
    /// How long to sleep at `now`; updates the target either way.
    pub fn plan(&mut self, now: Instant, interval: Option<Duration>) -> Option<Duration> {
        let Some(interval) = interval else {
            self.last_target = None;
            return None;
        };
        let target = self.last_target.unwrap_or(now) + interval;
        if target > now {
            self.last_target = Some(target);
            Some(target - now)
        } else {
            self.last_target = Some(now);
            None
        }
    }

    pub fn limit(&mut self, interval: Option<Duration>) {
        if let Some(sleep) = self.plan(Instant::now(), interval) {
            thread::sleep(sleep);
        }
    }

    pub fn reset(&mut self) {
        self.last_target = None;
    }
}

/// Clock behind `SET_FRAME_TIME_CALLBACK`.
#[derive(Debug, Default)]
pub struct FrameTimer {
    last: Option<Instant>,
}

impl FrameTimer {
    /// Delta in microseconds to report at `now`.
    ///
    /// The reference value is reported on the first call and while the frame
    /// rate is locked (paused or fast-forwarding). Slow motion stretches the
    /// measured delta by its ratio.
    pub fn delta(
        &mut self,
        now: Instant,
        reference: i64,
        locked: bool,
        slowmotion_ratio: Option<f32>,
    ) -> i64 {
        let measured = self
            .last
            .map(|last| now.saturating_duration_since(last).as_micros() as i64);
        self.last = Some(now);

        let mut delta = match measured {
            Some(delta) if !locked => delta,
            _ => reference,
        };
        if !locked && let Some(ratio) = slowmotion_ratio.filter(|r| *r > 0.0) {
            delta = (delta as f64 / f64::from(ratio)) as i64;
        }
        delta
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
