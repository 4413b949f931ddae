//! Fixed-rate scheduling.
//!
//! One timer task per (action, fixed-rate trigger) pair. The first run
//! happens one interval after start; missed ticks are skipped rather than
//! replayed. A run that fails is logged and the timer keeps going.

use crate::transport::Transport;
use portage_core::{
    ActionRegistry, ConfigurationError, Endpoint, Request, SharedEndpoint, Trigger, TriggerKind,
};
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

/// Fixed-rate endpoints waiting to be started.
pub struct Scheduler {
    jobs: Vec<(SharedEndpoint, Duration)>,
}

impl Scheduler {
    /// Build an endpoint for every fixed-rate trigger in `registry`.
    pub fn build(
        transport: &Transport,
        registry: &ActionRegistry,
    ) -> Result<Self, ConfigurationError> {
        let jobs = transport
            .build_kind(registry, TriggerKind::FixedRate)?
            .into_iter()
            .filter_map(|endpoint| {
                let interval = match &endpoint.route().trigger {
                    Trigger::FixedRate(rate) => rate.interval,
                    _ => return None,
                };
                if interval.is_zero() {
                    tracing::warn!(
                        action = %endpoint.route().action,
                        "zero fixed-rate interval; not scheduled"
                    );
                    return None;
                }
                Some((endpoint, interval))
            })
            .collect();
        Ok(Self { jobs })
    }

    /// Number of timers.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether there is nothing to schedule.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Spawn one task per timer on the current runtime.
    pub fn start(self) -> SchedulerHandle {
        let tasks = self
            .jobs
            .into_iter()
            .map(|(endpoint, period)| tokio::spawn(run(endpoint, period)))
            .collect::<Vec<_>>();
        tracing::info!(timers = tasks.len(), "scheduler started");
        SchedulerHandle { tasks }
    }
}

async fn run(endpoint: SharedEndpoint, period: Duration) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticks.tick().await;
        let response = endpoint.call(Request::default()).await;
        if response.is_success() {
            tracing::debug!(action = %endpoint.route().action, "scheduled run finished");
        } else {
            tracing::warn!(
                action = %endpoint.route().action,
                status = %response.status,
                "scheduled run failed"
            );
        }
    }
}

/// Running timers. Dropping the handle leaves them running.
#[derive(Debug)]
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Number of running timers.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no timers are running.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every timer and wait for the tasks to wind down.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // Aborted tasks report cancellation; nothing to surface.
            let _ = task.await;
        }
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_core::{Action, CallError, FixedRateTrigger, Invocation, StaticFinder};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[tokio::test]
    async fn runs_at_fixed_rate_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let tick = Action::builder("tick", move |_: Invocation| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CallError>(())
            }
        })
        .trigger(Trigger::FixedRate(FixedRateTrigger {
            interval: Duration::from_millis(20),
        }))
        .build()
        .unwrap();
        let registry = ActionRegistry::from_finder(&StaticFinder::new().with(tick)).unwrap();

        let scheduler = Scheduler::build(&Transport::schedule().unwrap(), &registry).unwrap();
        assert_eq!(scheduler.len(), 1);
        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(130)).await;
        handle.shutdown().await;

        let observed = runs.load(Ordering::SeqCst);
        assert!(observed >= 2, "only {observed} runs");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), observed);
    }
}
