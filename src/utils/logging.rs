use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces the start and end of a tick phase.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            log::trace!("end {} ({} µs)", self.label, self.start.elapsed().as_micros());
        }
    }
}

/// Warns when a tick took longer than the simulated time it advanced.
pub fn warn_if_tick_budget_exceeded(duration: Duration, delta_t: f64) {
    if duration.as_secs_f64() > delta_t {
        warn!(
            "tick took {:.2} ms, longer than its {:.2} ms step",
            duration.as_secs_f64() * 1000.0,
            delta_t * 1000.0
        );
    }
}
