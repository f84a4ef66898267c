//! Periodic re-evaluation of alerts, one independent loop per priority tier.
//!
//! `high` and `mid` run on fixed intervals. `low` re-arms a single-shot
//! timer for the next local midnight after every run, so it follows
//! daylight-saving changes instead of drifting. Every tier runs once
//! immediately on start.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use tokio::{sync::Mutex, task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::alert_manager::AlertManager;
use crate::{clock::until_next_local_midnight, config::SchedulerConfig, models::AlertPriority};

/// Runs one evaluation pass for a tier.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TierRunner: Send + Sync {
    /// Evaluates every enabled alert of `tier`. Failures are logged by the
    /// implementation.
    async fn run_tier(&self, tier: AlertPriority);
}

#[async_trait]
impl TierRunner for AlertManager {
    async fn run_tier(&self, tier: AlertPriority) {
        if let Err(e) = self.process_tier(tier).await {
            tracing::error!(%tier, error = %e, "Tier tick failed.");
        }
    }
}

/// When a tier fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Every(Duration),
    LocalMidnight,
}

struct Running {
    token: CancellationToken,
    tasks: JoinSet<()>,
}

/// Owns the three tier loops.
pub struct AlertScheduler {
    runner: Arc<dyn TierRunner>,
    config: SchedulerConfig,
    running: Mutex<Option<Running>>,
}

impl AlertScheduler {
    /// Creates a stopped scheduler.
    pub fn new(runner: Arc<dyn TierRunner>, config: SchedulerConfig) -> Self {
        Self { runner, config, running: Mutex::new(None) }
    }

    fn cadence(&self, tier: AlertPriority) -> Cadence {
        match tier {
            AlertPriority::High => Cadence::Every(self.config.high_interval_secs),
            AlertPriority::Mid => Cadence::Every(self.config.mid_interval_secs),
            AlertPriority::Low => Cadence::LocalMidnight,
        }
    }

    /// Spawns the tier loops. Returns `false` if the scheduler was already
    /// running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::warn!("Alert scheduler already running.");
            return false;
        }

        let token = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for tier in AlertPriority::ALL {
            tasks.spawn(run_tier_loop(
                Arc::clone(&self.runner),
                tier,
                self.cadence(tier),
                token.clone(),
            ));
        }
        *running = Some(Running { token, tasks });

        tracing::info!(
            high_secs = self.config.high_interval_secs.as_secs(),
            mid_secs = self.config.mid_interval_secs.as_secs(),
            "Alert scheduler started, low tier runs daily at local midnight."
        );
        true
    }

    /// Cancels pending timers and waits for in-flight passes to finish.
    /// Stopping a stopped scheduler does nothing.
    pub async fn stop(&self) {
        let Some(mut running) = self.running.lock().await.take() else {
            return;
        };
        running.token.cancel();
        while let Some(result) = running.tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Scheduler task ended abnormally.");
            }
        }
        tracing::info!("Alert scheduler stopped.");
    }

    /// Whether the tier loops are running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

/// Waits for the next firing of `cadence`. Returns `false` on cancellation.
async fn wait_next(
    cadence: Cadence,
    interval: &mut Option<tokio::time::Interval>,
    token: &CancellationToken,
) -> bool {
    let delay = async {
        match (cadence, interval.as_mut()) {
            (Cadence::Every(_), Some(interval)) => {
                interval.tick().await;
            }
            _ => tokio::time::sleep(until_next_local_midnight(Utc::now())).await,
        }
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = delay => true,
    }
}

async fn run_tier_loop(
    runner: Arc<dyn TierRunner>,
    tier: AlertPriority,
    cadence: Cadence,
    token: CancellationToken,
) {
    let mut interval = match cadence {
        Cadence::Every(period) => {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(interval)
        }
        Cadence::LocalMidnight => None,
    };

    // The pass itself is not raced against cancellation: a started pass
    // always completes.
    runner.run_tier(tier).await;
    while wait_next(cadence, &mut interval, &token).await {
        tracing::debug!(%tier, "Running scheduled tier pass.");
        runner.run_tier(tier).await;
    }
    tracing::debug!(%tier, "Tier loop shut down.");
}

#[cfg(test)]
mod tests {
    use dashmap::DashMap;

    use super::*;

    #[derive(Default)]
    struct CountingRunner {
        runs: DashMap<AlertPriority, usize>,
    }

    impl CountingRunner {
        fn count(&self, tier: AlertPriority) -> usize {
            self.runs.get(&tier).map(|c| *c).unwrap_or_default()
        }
    }

    #[async_trait]
    impl TierRunner for CountingRunner {
        async fn run_tier(&self, tier: AlertPriority) {
            *self.runs.entry(tier).or_default() += 1;
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            high_interval_secs: Duration::from_secs(30),
            mid_interval_secs: Duration::from_secs(300),
        }
    }

    /// Lets spawned tasks run until they block on their timers.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_tier_runs_immediately_on_start() {
        let runner = Arc::new(CountingRunner::default());
        let scheduler = AlertScheduler::new(runner.clone(), config());

        assert!(scheduler.start().await);
        settle().await;

        for tier in AlertPriority::ALL {
            assert_eq!(runner.count(tier), 1, "{tier} should have run once");
        }
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiers_follow_their_intervals() {
        let runner = Arc::new(CountingRunner::default());
        let scheduler = AlertScheduler::new(runner.clone(), config());
        scheduler.start().await;
        settle().await;

        for _ in 0..10 {
            tokio::time::advance(Duration::from_secs(30)).await;
            settle().await;
        }

        // t=0 plus ticks at 30s..300s.
        assert_eq!(runner.count(AlertPriority::High), 11);
        assert_eq!(runner.count(AlertPriority::Mid), 2);
        assert_eq!(runner.count(AlertPriority::Low), 1);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_tier_fires_within_a_day() {
        let runner = Arc::new(CountingRunner::default());
        let scheduler = AlertScheduler::new(runner.clone(), config());
        scheduler.start().await;
        settle().await;

        tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 60)).await;
        settle().await;

        assert!(runner.count(AlertPriority::Low) >= 2);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timers_and_is_idempotent() {
        let runner = Arc::new(CountingRunner::default());
        let scheduler = AlertScheduler::new(runner.clone(), config());
        scheduler.start().await;
        settle().await;
        assert!(!scheduler.start().await);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
        scheduler.stop().await;

        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(runner.count(AlertPriority::High), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let mut runner = MockTierRunner::new();
        runner.expect_run_tier().times(6).return_const(());
        let scheduler = AlertScheduler::new(Arc::new(runner), config());

        scheduler.start().await;
        settle().await;
        scheduler.stop().await;

        assert!(scheduler.start().await);
        settle().await;
        scheduler.stop().await;
    }
}
