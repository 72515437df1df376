//! Host-side timing of stages, compiled in with the `metrics` feature.
//!
//! Timings measure how long it took to record the commands, not how long
//! the GPU spent executing them.

#[cfg(feature = "metrics")]
use std::time::Instant;

/// Logs the time elapsed between its creation and drop.
#[derive(Debug)]
pub struct PerfCounter {
    #[cfg(feature = "metrics")]
    label: &'static str,

    #[cfg(feature = "metrics")]
    started_at: Instant,
}

impl PerfCounter {
    #[cfg(feature = "metrics")]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            started_at: Instant::now(),
        }
    }

    #[cfg(not(feature = "metrics"))]
    pub fn new(_label: &'static str) -> Self {
        Self {}
    }
}

#[cfg(feature = "metrics")]
impl Drop for PerfCounter {
    fn drop(&mut self) {
        log::trace!(
            "{}: {}",
            self.label,
            humantime::format_duration(self.started_at.elapsed())
        );
    }
}

/// Runs `f`, logging how long it took.
pub fn measure<T>(label: &'static str, f: impl FnOnce() -> T) -> T {
    let _counter = PerfCounter::new(label);

    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_returns_result() {
        assert_eq!(4, measure("test", || 2 + 2));
    }
}
