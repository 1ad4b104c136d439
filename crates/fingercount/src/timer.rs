//! Stage timings and frame rate logging.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use itertools::Itertools;

/// Accumulates the durations of a repeated operation, like one stage of the per-frame pipeline.
///
/// Formatting a timer with `{}` prints the number of recorded runs, their mean and their maximum
/// duration, and starts a new measurement window.
pub struct Timer {
    name: &'static str,
    window: Mutex<Window>,
}

#[derive(Default)]
struct Window {
    runs: u32,
    total: Duration,
    max: Duration,
}

impl Window {
    fn record(&mut self, duration: Duration) {
        self.runs += 1;
        self.total += duration;
        self.max = self.max.max(duration);
    }

    fn mean(&self) -> Duration {
        match self.runs {
            0 => Duration::ZERO,
            runs => self.total / runs,
        }
    }
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            window: Mutex::new(Window::default()),
        }
    }

    /// Runs `op` and records how long it took.
    pub fn time<T>(&self, op: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        op()
    }

    /// Starts timing. The measurement ends when the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    fn window(&self) -> std::sync::MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let window = std::mem::take(&mut *self.window());
        write!(
            f,
            "{}: {}x{:.1}ms (max {:.1}ms)",
            self.name,
            window.runs,
            window.mean().as_secs_f32() * 1000.0,
            window.max.as_secs_f32() * 1000.0,
        )
    }
}

/// Records the elapsed time into its [`Timer`] when dropped.
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.window().record(self.start.elapsed());
    }
}

/// Counts frames and logs the frame rate about once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            since: Instant::now(),
        }
    }

    /// Counts a frame.
    pub fn tick(&mut self) {
        self.tick_with(std::iter::empty::<&Timer>());
    }

    /// Counts a frame. When the frame rate is logged, `stages` are logged along with it.
    ///
    /// `stages` is only consumed when a log line is written, so [`Timer`]s passed here keep
    /// accumulating in between.
    pub fn tick_with<D, I>(&mut self, stages: I)
    where
        D: fmt::Display,
        I: IntoIterator<Item = D>,
    {
        self.frames += 1;
        if self.since.elapsed() < Duration::from_secs(1) {
            return;
        }

        let mut stages = stages.into_iter().peekable();
        if stages.peek().is_some() {
            log::debug!(
                "{}: {} FPS ({})",
                self.name,
                self.frames,
                stages.format(", ")
            );
        } else {
            log::debug!("{}: {} FPS", self.name, self.frames);
        }

        self.frames = 0;
        self.since = Instant::now();
    }
}
