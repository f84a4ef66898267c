use tokio::time::Instant;

/// Process-level metrics reported by the `/status` endpoint.
#[derive(Debug, Clone, Copy)]
pub struct AppMetrics {
    /// The time the application started.
    pub start_time: Instant,
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self { start_time: Instant::now() }
    }
}

impl AppMetrics {
    /// Seconds since start.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
