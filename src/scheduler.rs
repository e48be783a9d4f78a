use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Notify, watch};
use tokio::task;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::charger::{ChargerComponent, ChargerSnapshot};

/// Shortest period a charger is cycled with
const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Time between the start of two cycles, raised to at least 1 ms
    pub period: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
        }
    }
}

/// Control surface of a charger running on its own task
pub struct ChargerHandle {
    id: String,
    enabled: Arc<AtomicBool>,
    snapshots: watch::Receiver<ChargerSnapshot>,
    shutdown: Arc<Notify>,
    task: task::JoinHandle<Option<ChargerComponent>>,
}

/// Moves the charger onto a background task running one cycle per period.
///
/// Cycles never overlap: each one runs on the blocking pool and is awaited
/// before the next tick is taken.
pub fn spawn(component: ChargerComponent, options: SchedulerOptions) -> ChargerHandle {
    let id = component.id().to_string();
    let enabled = Arc::new(AtomicBool::new(component.is_enabled()));
    let snapshots = component.subscribe();
    let shutdown = Arc::new(Notify::new());
    let period = options.period.max(MIN_PERIOD);

    let task = task::spawn(cycle_task(
        component,
        period,
        enabled.clone(),
        shutdown.clone(),
    ));

    ChargerHandle {
        id,
        enabled,
        snapshots,
        shutdown,
        task,
    }
}

async fn cycle_task(
    mut component: ChargerComponent,
    period: Duration,
    enabled: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> Option<ChargerComponent> {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(charger = %component.id(), ?period, "Starting charger cycle task");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!(charger = %component.id(), "Shutting down charger cycle task");
                break;
            }
            _ = interval.tick() => {
                let enabled = enabled.load(Ordering::SeqCst);
                let id = component.id().to_string();
                let cycle = task::spawn_blocking(move || {
                    component.set_enabled(enabled);
                    component.tick();
                    component
                });
                component = match cycle.await {
                    Ok(component) => component,
                    Err(e) => {
                        error!(charger = %id, "Charger cycle aborted: {:?}", e);
                        return None;
                    }
                };
            }
        }
    }

    Some(component)
}

impl ChargerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Takes effect at the start of the next cycle
    pub fn set_enabled(&self, enabled: bool) {
        info!(charger = %self.id, enabled, "Charger enable requested");
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> ChargerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChargerSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the task after the cycle in flight and hands the charger back.
    /// `None` if a cycle panicked.
    pub async fn shutdown(self) -> Option<ChargerComponent> {
        self.shutdown.notify_one();
        match self.task.await {
            Ok(component) => component,
            Err(e) => {
                error!(charger = %self.id, "Charger cycle task failed: {:?}", e);
                None
            }
        }
    }
}
