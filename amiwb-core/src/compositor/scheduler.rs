//! Frame scheduling (spec.md SS4.C "Frame scheduling", SS5 "The frame timer
//! is one-shot and re-armed").
//!
//! A single monotonic `timerfd`, registered in the dispatcher's `poll` set
//! alongside the X connection fd -- the same FD-multiplexing role `nix` (a
//! pack-standard crate for this, shared with `DJMcNab-glazier`'s backend)
//! plays throughout this engine instead of a bare `libc` timer_create call.

use std::time::{Duration, Instant};

use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use nix::sys::time::TimeSpec;
use tracing::trace;

use crate::config::RenderMode;

/// Hard cap on target frame rate (spec.md SS4.C "target rate configurable
/// (default 120 Hz, cap 240)").
pub const MAX_FPS: u32 = 240;

pub struct Scheduler {
    timer: TimerFd,
    frame_interval: Duration,
    mode: RenderMode,
    scheduled: bool,
    last_frame: Option<Instant>,
}

impl Scheduler {
    pub fn new(fps: u32, mode: RenderMode) -> nix::Result<Self> {
        let fps = fps.clamp(1, MAX_FPS);
        let timer = TimerFd::new(ClockId::CLOCK_MONOTONIC, TimerFlags::TFD_NONBLOCK)?;
        Ok(Self {
            timer,
            frame_interval: Duration::from_secs_f64(1.0 / fps as f64),
            mode,
            scheduled: false,
            last_frame: None,
        })
    }

    /// The raw fd to add to the dispatcher's `poll`/`select` set.
    pub fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.timer.as_fd().as_raw_fd()
    }

    /// Called when new damage has arrived. In on-demand mode, arms the
    /// timer for the remainder of the current frame interval if no frame is
    /// already scheduled; in continuous mode this is a no-op since the
    /// timer is always running (spec.md SS4.C "On-demand" / "Continuous").
    pub fn on_damage(&mut self) {
        if self.mode == RenderMode::Continuous || self.scheduled {
            return;
        }
        let elapsed = self.last_frame.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
        let delay = self.frame_interval.saturating_sub(elapsed).max(Duration::from_micros(100));
        self.arm(delay);
    }

    /// Called after every completed frame render. Re-arms unconditionally
    /// in continuous mode; in on-demand mode only clears the scheduled
    /// flag, waiting for the next `on_damage`.
    pub fn on_frame_rendered(&mut self) {
        self.last_frame = Some(Instant::now());
        self.scheduled = false;
        if self.mode == RenderMode::Continuous {
            self.arm(self.frame_interval);
        }
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
        if mode == RenderMode::Continuous {
            self.arm(self.frame_interval);
        }
    }

    fn arm(&mut self, delay: Duration) {
        let spec = TimeSpec::from_duration(delay);
        let _ = self.timer.set(Expiration::OneShot(spec), TimerSetTimeFlags::empty());
        self.scheduled = true;
        trace!("scheduler: armed for {:?}", delay);
    }

    /// Drains the timer's expiration count; called once the dispatcher sees
    /// the timer fd readable.
    pub fn consume_expiration(&mut self) {
        let _ = self.timer.wait();
    }
}
