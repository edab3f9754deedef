use std::time::Instant;

/// Simple start/stop/elapsed stopwatch, mirroring the timing helper used by
/// the build and search pipelines to populate `BuildStats`/`RetrieverStats`.
pub struct Timer {
    start: Option<Instant>,
    elapsed: std::time::Duration,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: None,
            elapsed: std::time::Duration::ZERO,
        }
    }

    pub fn start(&mut self) {
        if self.start.is_none() {
            self.start = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(start) = self.start.take() {
            self.elapsed += start.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.elapsed = std::time::Duration::ZERO;
    }

    pub fn running(&self) -> bool {
        self.start.is_some()
    }

    pub fn elapsed_ms(&self) -> f64 {
        let extra = self.start.map(|s| s.elapsed()).unwrap_or_default();
        (self.elapsed + extra).as_secs_f64() * 1000.0
    }
}
