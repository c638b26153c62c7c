use std::time::Duration;

/// Configuration for the Orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on processors per job (default: 4)
    pub max_processors: usize,
    /// Create attempts per worker before provisioning fails (default: 3)
    pub provision_attempts: u32,
    /// Pause between two create attempts (default: 1s)
    pub provision_backoff: Duration,
    /// How long a created worker may take to report ready (default: 30s)
    pub readiness_timeout: Duration,
    pub readiness_poll_interval: Duration,
    /// How long aggregators may take to confirm their bus subscriptions (default: 30s)
    pub subscription_timeout: Duration,
    /// Extra wait after every subscription is confirmed, before dispatch (default: 200ms)
    pub settle_delay: Duration,
    /// Upper bound on the dispatch phase of a job (default: 600s)
    pub job_timeout: Duration,
    /// Queue status polling interval (default: 500ms)
    pub poll_interval: Duration,
    /// Consecutive failed status queries tolerated before the job fails (default: 5)
    pub max_status_failures: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_processors: 4,
            provision_attempts: 3,
            provision_backoff: Duration::from_secs(1),
            readiness_timeout: Duration::from_secs(30),
            readiness_poll_interval: Duration::from_millis(250),
            subscription_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(200),
            job_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_millis(500),
            max_status_failures: 5,
        }
    }
}
