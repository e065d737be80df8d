//! Scope timing for the driver and field setup.

use std::time::{Duration, Instant};

/// Logs how long a scope took when dropped, and the step rate if any steps
/// were counted with [`Timed::step`].
///
/// ```ignore
/// let mut t = Timed::info("simulation");
/// for _ in 0..600 {
///     sim.tick(..);
///     t.step();
/// }
/// // logs "simulation: 1.234s (600 steps, 486.2 steps/s)"
/// ```
pub struct Timed {
    name: &'static str,
    start: Instant,
    level: log::Level,
    steps: u64,
}

impl Timed {
    pub fn info(name: &'static str) -> Self {
        Self::at(name, log::Level::Info)
    }

    pub fn debug(name: &'static str) -> Self {
        Self::at(name, log::Level::Debug)
    }

    fn at(name: &'static str, level: log::Level) -> Self {
        log::trace!("{}...", name);
        Self {
            name,
            start: Instant::now(),
            level,
            steps: 0,
        }
    }

    /// Counts one committed simulation step towards the reported rate.
    #[inline]
    pub fn step(&mut self) {
        self.steps += 1;
    }

    fn summary(&self, elapsed: Duration) -> String {
        if self.steps == 0 {
            return format!("{}: {:.3?}", self.name, elapsed);
        }
        let seconds = elapsed.as_secs_f64();
        let rate = if seconds > 0.0 {
            self.steps as f64 / seconds
        } else {
            f64::INFINITY
        };
        format!(
            "{}: {:.3?} ({} steps, {:.1} steps/s)",
            self.name, elapsed, self.steps, rate
        )
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        log::log!(self.level, "{}", self.summary(self.start.elapsed()));
    }
}
