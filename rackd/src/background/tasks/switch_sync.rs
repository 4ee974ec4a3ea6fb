// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background task reconciling switch state with the networking journal
//!
//! Each activation drains the journal: resolve the pending batch, apply it
//! through the switch driver, commit exactly that batch, and repeat until
//! the journal is empty.  Entries are only deleted after the driver
//! reports success, so a crash at any point leaves them queued and the
//! next activation (here or after restart) re-applies them; the driver
//! contract makes re-application safe.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use slog::{error, warn};

use rackd_db::datastore::PendingAction;
use rackd_db::types::DbUuid;
use rackd_db::{DataStore, OpContext};

use crate::background::BackgroundTask;
use crate::config::ReconcilerConfig;
use crate::drivers::SwitchDriver;

pub struct SwitchSync {
    datastore: Arc<DataStore>,
    driver: Arc<dyn SwitchDriver>,
    failure_backoff: Duration,
    max_backoff: Duration,
    consecutive_failures: u32,
    next_attempt: Option<Instant>,
}

impl SwitchSync {
    pub fn new(
        datastore: Arc<DataStore>,
        driver: Arc<dyn SwitchDriver>,
        config: &ReconcilerConfig,
    ) -> SwitchSync {
        SwitchSync {
            datastore,
            driver,
            failure_backoff: config.failure_backoff(),
            max_backoff: config.max_backoff(),
            consecutive_failures: 0,
            next_attempt: None,
        }
    }

    /// Records a failed attempt and computes when to try again: the
    /// configured backoff, doubling per consecutive failure, capped.
    fn note_failure(&mut self) -> Duration {
        self.consecutive_failures += 1;
        let factor = 1u32 << (self.consecutive_failures - 1).min(16);
        let delay = std::cmp::min(
            self.failure_backoff.saturating_mul(factor),
            self.max_backoff,
        );
        self.next_attempt = Some(Instant::now() + delay);
        delay
    }

    fn failure_status(
        &mut self,
        opctx: &OpContext,
        message: String,
    ) -> serde_json::Value {
        let delay = self.note_failure();
        error!(opctx.log, "networking apply failed";
            "error" => &message,
            "consecutive_failures" => self.consecutive_failures,
            "retry_in_ms" => delay.as_millis() as u64);
        json!({
            "state": "retry_pending",
            "error": message,
            "consecutive_failures": self.consecutive_failures,
            "retry_in_ms": delay.as_millis() as u64,
        })
    }

    /// Translates a resolved batch into the port map the driver applies.
    ///
    /// A nic with no port contributes nothing: there is no hardware to
    /// program. Its entry is still committed with its batch so the journal
    /// converges; the desired state stays on the nic row.
    fn port_map(
        opctx: &OpContext,
        batch: &[PendingAction],
    ) -> BTreeMap<String, Option<String>> {
        let mut map = BTreeMap::new();
        for entry in batch {
            match &entry.port_name {
                Some(port) => {
                    map.insert(port.clone(), entry.new_provider_id.clone());
                }
                None => {
                    warn!(opctx.log,
                        "nic is not on a port; networking change cannot be \
                         realized";
                        "nic" => &entry.nic_label,
                        "network_id" => ?entry.new_provider_id);
                }
            }
        }
        map
    }
}

impl BackgroundTask for SwitchSync {
    fn activate<'a>(
        &'a mut self,
        opctx: &'a OpContext,
    ) -> BoxFuture<'a, serde_json::Value> {
        async move {
            if let Some(deadline) = self.next_attempt {
                if Instant::now() < deadline {
                    return json!({
                        "state": "backoff",
                        "consecutive_failures": self.consecutive_failures,
                    });
                }
            }

            let mut applied_entries = 0usize;
            let mut applied_batches = 0usize;

            loop {
                let datastore = Arc::clone(&self.datastore);
                let batch_opctx = opctx.clone();
                let batch = match tokio::task::spawn_blocking(move || {
                    datastore.networking_pending_batch(&batch_opctx)
                })
                .await
                {
                    Ok(Ok(batch)) => batch,
                    Ok(Err(e)) => {
                        return self.failure_status(
                            opctx,
                            format!("reading pending batch: {}", e),
                        );
                    }
                    Err(e) => {
                        return self.failure_status(
                            opctx,
                            format!("pending batch task panicked: {}", e),
                        );
                    }
                };

                if batch.is_empty() {
                    self.consecutive_failures = 0;
                    self.next_attempt = None;
                    return json!({
                        "state": "idle",
                        "applied_batches": applied_batches,
                        "applied_entries": applied_entries,
                    });
                }

                let map = Self::port_map(opctx, &batch);
                if !map.is_empty() {
                    let driver = Arc::clone(&self.driver);
                    let to_apply = map.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        driver.apply_networking(&to_apply)
                    })
                    .await;
                    match result {
                        Ok(Ok(())) => (),
                        Ok(Err(e)) => {
                            return self
                                .failure_status(opctx, e.to_string());
                        }
                        Err(e) => {
                            return self.failure_status(
                                opctx,
                                format!("apply task panicked: {}", e),
                            );
                        }
                    }
                }

                // The driver succeeded (or there was nothing to program);
                // retire exactly this batch.
                let ids: Vec<DbUuid> =
                    batch.iter().map(|entry| entry.id).collect();
                let datastore = Arc::clone(&self.datastore);
                let commit_opctx = opctx.clone();
                let committed = tokio::task::spawn_blocking(move || {
                    datastore.networking_commit_batch(&commit_opctx, &ids)
                })
                .await;
                match committed {
                    Ok(Ok(())) => (),
                    Ok(Err(e)) => {
                        return self.failure_status(
                            opctx,
                            format!("committing batch: {}", e),
                        );
                    }
                    Err(e) => {
                        return self.failure_status(
                            opctx,
                            format!("commit task panicked: {}", e),
                        );
                    }
                }

                applied_entries += batch.len();
                applied_batches += 1;
                // Entries enqueued while we were applying are picked up by
                // the next pass of the loop.
            }
        }
        .boxed()
    }
}
