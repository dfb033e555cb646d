//! Probe scheduler: one timer task per enabled check.
//!
//! Reconciles against the store on demand and on a safety interval, so
//! config changes take effect without restart. Per-check try-locks make runs
//! non-re-entrant: a fire that overlaps a still-running probe is dropped,
//! never queued.

use bekci_engine::RuleEngine;
use bekci_probe::ProbeConfig;
use bekci_storage::{CheckResultRow, Store};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// First fire of a newly scheduled check, to spread probes after startup.
const STAGGER: Duration = Duration::from_secs(5);
const MIN_INTERVAL: Duration = Duration::from_secs(10);
const SAFETY_RELOAD: Duration = Duration::from_secs(60);
const RUN_NOW_CAPACITY: usize = 100;

pub struct Scheduler {
    core: Arc<Core>,
    run_now_tx: mpsc::Sender<String>,
    run_now_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

struct Core {
    store: Arc<Store>,
    engine: Arc<RuleEngine>,
    // Bookkeeping only: held across map mutations, never across store calls
    // or probe execution.
    inner: Mutex<Inner>,
    shutdown: CancellationToken,
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, JoinHandle<()>>,
    intervals: HashMap<String, Duration>,
    locks: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

fn clamp_interval(interval_s: i64) -> Duration {
    Duration::from_secs(interval_s.max(0) as u64).max(MIN_INTERVAL)
}

impl Scheduler {
    pub fn new(store: Arc<Store>, engine: Arc<RuleEngine>) -> Self {
        let (run_now_tx, run_now_rx) = mpsc::channel(RUN_NOW_CAPACITY);
        Self {
            core: Arc::new(Core {
                store,
                engine,
                inner: Mutex::new(Inner::default()),
                shutdown: CancellationToken::new(),
            }),
            run_now_tx,
            run_now_rx: Mutex::new(Some(run_now_rx)),
        }
    }

    /// Load the enabled-check set, schedule everything, and start the
    /// safety-reload and run-now loops.
    pub async fn start(&self) {
        self.core.clone().reload().await;

        let core = self.core.clone();
        tokio::spawn(async move {
            let mut tick = interval(SAFETY_RELOAD);
            tick.tick().await; // immediate tick; the initial load just ran
            loop {
                tokio::select! {
                    _ = core.shutdown.cancelled() => return,
                    _ = tick.tick() => core.clone().reload().await,
                }
            }
        });

        let rx = self.run_now_rx.lock().unwrap().take();
        if let Some(mut rx) = rx {
            let core = self.core.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = core.shutdown.cancelled() => return,
                        msg = rx.recv() => match msg {
                            Some(check_id) => core.clone().spawn_run(check_id),
                            None => return,
                        }
                    }
                }
            });
        }

        tracing::info!("Scheduler started");
    }

    /// Cancel all timers and in-flight probes.
    pub fn stop(&self) {
        self.core.shutdown.cancel();
        let mut inner = self.core.inner.lock().unwrap();
        for (_, handle) in inner.tasks.drain() {
            handle.abort();
        }
        inner.intervals.clear();
        inner.locks.clear();
        tracing::info!("Scheduler stopped");
    }

    /// Queue an immediate run. Best-effort: drops with a warning when the
    /// queue is full.
    pub fn run_now(&self, check_id: &str) {
        if self.run_now_tx.try_send(check_id.to_string()).is_err() {
            tracing::warn!(check_id, "RunNow: event channel full, dropping");
        }
    }

    /// Re-read the enabled-check set and reconcile the timer table.
    pub async fn reload(&self) {
        self.core.clone().reload().await;
    }

    /// Run one check now, guarded by its try-lock.
    pub async fn run_check(&self, check_id: &str) {
        self.core.run_check(check_id).await;
    }

    #[cfg(test)]
    fn scheduled_interval(&self, check_id: &str) -> Option<Duration> {
        self.core
            .inner
            .lock()
            .unwrap()
            .intervals
            .get(check_id)
            .copied()
    }

    #[cfg(test)]
    fn scheduled_count(&self) -> usize {
        self.core.inner.lock().unwrap().tasks.len()
    }
}

impl Core {
    async fn reload(self: Arc<Self>) {
        let checks = match self.store.list_all_enabled_checks().await {
            Ok(checks) => checks,
            Err(e) => {
                tracing::error!(error = %e, "Scheduler: failed to load checks");
                return;
            }
        };

        let mut inner = self.inner.lock().unwrap();

        let active: HashMap<String, Duration> = checks
            .iter()
            .map(|c| (c.id.clone(), clamp_interval(c.interval_s)))
            .collect();

        // Drop checks that are no longer active.
        let gone: Vec<String> = inner
            .tasks
            .keys()
            .filter(|id| !active.contains_key(*id))
            .cloned()
            .collect();
        for id in gone {
            if let Some(handle) = inner.tasks.remove(&id) {
                handle.abort();
            }
            inner.intervals.remove(&id);
            inner.locks.remove(&id);
            tracing::debug!(check_id = %id, "Scheduler: removed check");
        }

        // Schedule new checks; reschedule when the interval changed.
        for (id, interval) in active {
            match inner.intervals.get(&id).copied() {
                None => {
                    let handle = self.clone().spawn_check_task(id.clone(), interval);
                    inner.tasks.insert(id.clone(), handle);
                    inner.intervals.insert(id.clone(), interval);
                    inner
                        .locks
                        .entry(id.clone())
                        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())));
                    tracing::debug!(check_id = %id, ?interval, "Scheduler: scheduled check");
                }
                Some(current) if current != interval => {
                    if let Some(handle) = inner.tasks.remove(&id) {
                        handle.abort();
                    }
                    let handle = self.clone().spawn_check_task(id.clone(), interval);
                    inner.tasks.insert(id.clone(), handle);
                    inner.intervals.insert(id.clone(), interval);
                    tracing::info!(
                        check_id = %id,
                        old = ?current,
                        new = ?interval,
                        "Scheduler: interval changed, rescheduled"
                    );
                }
                Some(_) => {}
            }
        }
    }

    fn spawn_check_task(self: Arc<Self>, check_id: String, period: Duration) -> JoinHandle<()> {
        let core = self;
        tokio::spawn(async move {
            tokio::select! {
                _ = core.shutdown.cancelled() => return,
                _ = sleep(STAGGER) => {}
            }

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = core.shutdown.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                // Runs are detached from the timer: removing a check stops
                // its timer without interrupting an in-flight probe, and a
                // fire that overlaps a running probe is dropped by the
                // try-lock, never queued.
                core.clone().spawn_run(check_id.clone());
            }
        })
    }

    /// Run a check on its own task, cancelled only by shutdown.
    fn spawn_run(self: Arc<Self>, check_id: String) {
        let core = self;
        tokio::spawn(async move {
            tokio::select! {
                _ = core.shutdown.cancelled() => {}
                _ = core.run_check(&check_id) => {}
            }
        });
    }

    /// Run one check, guarded by its try-lock. Overlapping fires return
    /// immediately.
    async fn run_check(&self, check_id: &str) {
        let lock = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .locks
                .entry(check_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let Ok(_guard) = lock.try_lock() else {
            return; // already running
        };

        let check = match self.store.get_check(check_id).await {
            Ok(Some(check)) => check,
            Ok(None) => {
                tracing::debug!(check_id, "Scheduler: check not found");
                return;
            }
            Err(e) => {
                tracing::error!(check_id, error = %e, "Scheduler: failed to load check");
                return;
            }
        };
        let target = match self.store.get_target(&check.target_id).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                tracing::debug!(target_id = %check.target_id, "Scheduler: target not found");
                return;
            }
            Err(e) => {
                tracing::error!(check_id, error = %e, "Scheduler: failed to load target");
                return;
            }
        };

        let config = ProbeConfig::from_json(&check.config);
        let result = bekci_probe::run(&check.kind, &target.host, &config).await;

        let metrics = serde_json::to_string(&result.metrics).unwrap_or_else(|e| {
            tracing::error!(check_id, error = %e, "Scheduler: failed to serialize metrics");
            "{}".to_string()
        });

        let row = CheckResultRow {
            id: 0,
            check_id: check_id.to_string(),
            status: result.status.to_string(),
            response_ms: result.response_ms,
            message: result.message.clone(),
            metrics,
            checked_at: Utc::now(),
        };
        match self.store.save_result(&row).await {
            Ok(_) => {
                let engine = self.engine.clone();
                let id = check_id.to_string();
                tokio::spawn(async move {
                    engine.evaluate(&id).await;
                });
            }
            Err(e) => {
                tracing::error!(check_id, error = %e, "Scheduler: failed to save result");
            }
        }

        tracing::debug!(
            check_id,
            kind = %check.kind,
            status = %result.status,
            response_ms = result.response_ms,
            "Check completed"
        );
    }
}
