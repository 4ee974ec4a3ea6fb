// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facilities for running background tasks
//!
//! A background task is activated periodically and whenever some other part
//! of the program asks for it (e.g. right after enqueueing work for it).
//! Activations are serialized per task, and each reports a JSON status
//! value that the Driver retains for observability.

pub mod tasks;

use chrono::DateTime;
use chrono::Utc;
use futures::future::BoxFuture;
use rackd_db::OpContext;
use slog::{debug, o};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::watch;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

/// An operation activated both periodically and on demand
pub trait BackgroundTask: Send + Sync {
    fn activate<'a>(
        &'a mut self,
        opctx: &'a OpContext,
    ) -> BoxFuture<'a, serde_json::Value>;
}

struct Task {
    status: watch::Receiver<TaskStatus>,
    tokio_task: tokio::task::JoinHandle<()>,
    notify: Arc<Notify>,
}

/// Drives the execution of background tasks
///
/// Tasks are aborted when the Driver is dropped; dropping it is how the
/// program shuts background work down.
pub struct Driver {
    tasks: BTreeMap<TaskHandle, Task>,
}

/// Identifies a background task registered with a [`Driver`]
#[derive(Clone, Debug, Ord, PartialOrd, PartialEq, Eq)]
pub struct TaskHandle(String);

impl Driver {
    pub fn new() -> Driver {
        Driver { tasks: BTreeMap::new() }
    }

    /// Starts a task that runs `imp` every `period` and on every
    /// [`Driver::activate`] call.
    pub fn register(
        &mut self,
        name: &str,
        period: Duration,
        imp: Box<dyn BackgroundTask>,
        opctx: OpContext,
    ) -> TaskHandle {
        let (status_tx, status_rx) =
            watch::channel(TaskStatus { current: None, last: None });
        let notify = Arc::new(Notify::new());

        let opctx = OpContext {
            log: opctx.log.new(o!("background_task" => name.to_string())),
        };
        let task_exec =
            TaskExec::new(period, imp, Arc::clone(&notify), opctx, status_tx);
        let tokio_task = tokio::task::spawn(task_exec.run());

        let task = Task { status: status_rx, tokio_task, notify };
        if self.tasks.insert(TaskHandle(name.to_string()), task).is_some() {
            panic!("started two background tasks called {:?}", name);
        }

        TaskHandle(name.to_string())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskHandle> {
        self.tasks.keys()
    }

    /// Activates the task immediately (in addition to its periodic
    /// schedule). If an activation is already running, another one follows
    /// it.
    pub fn activate(&self, task: &TaskHandle) {
        self.task(task).notify.notify_one();
    }

    pub fn status(&self, task: &TaskHandle) -> TaskStatus {
        self.task(task).status.borrow().clone()
    }

    fn task(&self, task: &TaskHandle) -> &Task {
        // A TaskHandle can only come from register(), so a miss means it
        // came from a different Driver instance.
        self.tasks.get(task).unwrap_or_else(|| {
            panic!("no such background task: {:?}", task)
        })
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        for (_, t) in &self.tasks {
            t.tokio_task.abort();
        }
    }
}

struct TaskExec {
    period: Duration,
    imp: Box<dyn BackgroundTask>,
    notify: Arc<Notify>,
    opctx: OpContext,
    status_tx: watch::Sender<TaskStatus>,
    iteration: u64,
}

impl TaskExec {
    fn new(
        period: Duration,
        imp: Box<dyn BackgroundTask>,
        notify: Arc<Notify>,
        opctx: OpContext,
        status_tx: watch::Sender<TaskStatus>,
    ) -> TaskExec {
        TaskExec { period, imp, notify, opctx, status_tx, iteration: 0 }
    }

    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.activate(ActivationReason::Timeout).await;
                },

                _ = self.notify.notified() => {
                    self.activate(ActivationReason::Signaled).await;
                }
            }
        }
    }

    async fn activate(&mut self, reason: ActivationReason) {
        self.iteration += 1;
        let iteration = self.iteration;
        let start_time = Utc::now();
        let start_instant = Instant::now();

        debug!(
            &self.opctx.log,
            "activating";
            "reason" => ?reason,
            "iteration" => iteration
        );

        self.status_tx.send_modify(|status| {
            assert!(status.current.is_none());
            status.current = Some(LastStart {
                start_time,
                start_instant,
                reason,
                iteration,
            });
        });

        let value = self.imp.activate(&self.opctx).await;

        let elapsed = start_instant.elapsed();

        self.status_tx.send_modify(|status| {
            assert!(status.current.is_some());
            let current = status.current.as_ref().unwrap();
            assert_eq!(current.iteration, iteration);
            *status = TaskStatus {
                current: None,
                last: Some(LastResult {
                    iteration,
                    start_time: current.start_time,
                    elapsed,
                    value,
                }),
            };
        });

        debug!(
            &self.opctx.log,
            "activation complete";
            "elapsed" => ?elapsed,
            "iteration" => iteration,
        );
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ActivationReason {
    Signaled,
    Timeout,
}

#[derive(Clone, Debug)]
pub struct TaskStatus {
    /// running right now, if any
    pub current: Option<LastStart>,
    /// most recently completed activation, if any
    pub last: Option<LastResult>,
}

#[derive(Clone, Debug)]
pub struct LastStart {
    pub start_time: DateTime<Utc>,
    pub start_instant: Instant,
    pub reason: ActivationReason,
    pub iteration: u64,
}

#[derive(Clone, Debug)]
pub struct LastResult {
    pub iteration: u64,
    pub start_time: DateTime<Utc>,
    pub elapsed: Duration,
    /// status value the task reported
    pub value: serde_json::Value,
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Reports how many times it has been activated.
    struct ReportingTask {
        counter: Arc<AtomicU64>,
    }

    impl BackgroundTask for ReportingTask {
        fn activate<'a>(
            &'a mut self,
            _: &'a OpContext,
        ) -> BoxFuture<'a, serde_json::Value> {
            async {
                let count = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                json!({ "count": count })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_driver_activation() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut driver = Driver::new();
        let handle = driver.register(
            "reporting",
            // Long period: only explicit activations (plus the interval's
            // immediate first tick) should fire during the test.
            Duration::from_secs(300),
            Box::new(ReportingTask { counter: Arc::clone(&counter) }),
            OpContext::for_tests(),
        );

        // Wait for the startup activation.
        wait_for_count(&counter, 1).await;

        driver.activate(&handle);
        wait_for_count(&counter, 2).await;
        // The status write lands just after the task body finishes.
        let last = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(last) = driver.status(&handle).last {
                    if last.iteration == 2 {
                        return last;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("status was not reported in time");
        assert_eq!(last.value, json!({ "count": 2 }));

        // Dropping the driver stops the task.
        drop(driver);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    async fn wait_for_count(counter: &AtomicU64, expected: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while counter.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("task did not activate in time");
    }
}
