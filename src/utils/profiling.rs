use std::time::{Duration, Instant};

/// Per-phase wall clock durations of the most recent tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickProfile {
    pub external_forces: Duration,
    pub broad_phase: Duration,
    pub narrow_phase: Duration,
    pub response: Duration,
    pub constraints: Duration,
    pub integration: Duration,
    pub refresh: Duration,
    pub total: Duration,

    pub part_count: usize,
    pub candidate_pairs: usize,
    pub colission_count: usize,
}

impl TickProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        let total_us = self.total.as_micros() as f64;
        if total_us < 1.0 {
            return;
        }
        let share = |d: Duration| d.as_micros() as f64 / total_us * 100.0;
        log::debug!(
            "tick {:.3} ms: {} parts, {} candidate pairs, {} colissions",
            self.total.as_secs_f64() * 1000.0,
            self.part_count,
            self.candidate_pairs,
            self.colission_count
        );
        log::debug!(
            "  forces {:.1}% broad {:.1}% narrow {:.1}% response {:.1}% constraints {:.1}% integrate {:.1}% refresh {:.1}%",
            share(self.external_forces),
            share(self.broad_phase),
            share(self.narrow_phase),
            share(self.response),
            share(self.constraints),
            share(self.integration),
            share(self.refresh),
        );
    }
}

/// Adds the lifetime of the guard to `output`.
pub struct PhaseTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
