// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware driver contracts and registries
//!
//! Two kinds of hardware sit under rackd: managed switches, driven through
//! [`SwitchDriver`], and per-node out-of-band management controllers,
//! driven through [`ObmDriver`].  Drivers are identified by a static type
//! tag; the tags recorded on switch and node rows are resolved against the
//! registries here.

use std::collections::BTreeMap;
use std::sync::Arc;

use rackd_common::Error;
use rackd_db::NetworkIdAllocator;
use slog::Logger;

use crate::config::RackdConfig;

pub mod ipmi;
pub mod mock;
pub mod vlan;

#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("switch rejected networking update: {0}")]
    Rejected(String),
    #[error("switch unreachable: {0}")]
    Unreachable(String),
}

/// A switch driver realizes desired networking on the managed switches.
///
/// The allocator half (via [`NetworkIdAllocator`]) issues the identifiers
/// the driver knows how to realize; `apply_networking` takes a map from
/// port label to desired identifier (None meaning "no network") and must
/// leave the hardware matching it.  The call must be idempotent: after a
/// failure the reconciler re-applies the same map, possibly extended.
pub trait SwitchDriver: NetworkIdAllocator {
    fn tag(&self) -> &'static str;

    fn apply_networking(
        &self,
        map: &BTreeMap<String, Option<String>>,
    ) -> Result<(), SwitchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ObmError {
    #[error("failed to run {command}")]
    Exec {
        command: String,
        #[source]
        err: std::io::Error,
    },
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("console i/o: {0}")]
    Console(#[from] std::io::Error),
    #[error("no console session for node {0}")]
    NoConsole(String),
}

/// The OBM coordinates of one node, as recorded at registration.
pub struct ObmTarget<'a> {
    pub node: &'a str,
    pub host: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

/// Out-of-band management: power control and serial consoles.
///
/// Console output is spooled by the driver; `console_show` returns
/// everything captured so far.
pub trait ObmDriver: Send + Sync {
    fn tag(&self) -> &'static str;

    fn power_cycle(&self, target: &ObmTarget<'_>) -> Result<(), ObmError>;
    fn power_off(&self, target: &ObmTarget<'_>) -> Result<(), ObmError>;

    fn console_start(&self, target: &ObmTarget<'_>) -> Result<(), ObmError>;
    fn console_stop(&self, target: &ObmTarget<'_>) -> Result<(), ObmError>;
    fn console_show(
        &self,
        target: &ObmTarget<'_>,
    ) -> Result<String, ObmError>;
    fn console_delete(&self, target: &ObmTarget<'_>) -> Result<(), ObmError>;
}

/// Registry of OBM drivers, keyed by type tag.
#[derive(Default)]
pub struct ObmRegistry {
    drivers: BTreeMap<&'static str, Arc<dyn ObmDriver>>,
}

impl ObmRegistry {
    pub fn new() -> ObmRegistry {
        ObmRegistry::default()
    }

    pub fn register(&mut self, driver: Arc<dyn ObmDriver>) {
        let tag = driver.tag();
        if self.drivers.insert(tag, driver).is_some() {
            panic!("registered two OBM drivers with tag {:?}", tag);
        }
    }

    /// Resolves a type tag, e.g. from a node row or a registration request.
    pub fn lookup(&self, tag: &str) -> Result<Arc<dyn ObmDriver>, Error> {
        self.drivers.get(tag).map(Arc::clone).ok_or_else(|| {
            Error::invalid_value(
                "obm_type",
                &format!("unknown OBM driver {:?}", tag),
            )
        })
    }
}

/// Builds the configured switch driver.
pub fn switch_driver_from_config(
    config: &RackdConfig,
    log: &Logger,
) -> Result<Arc<dyn SwitchDriver>, Error> {
    match config.switch.driver.as_str() {
        vlan::VLAN_STUB_TAG => Ok(Arc::new(vlan::VlanStubSwitch::new(
            vlan::VlanPool::parse(&config.vlan.ranges)?,
            log,
        ))),
        mock::MOCK_TAG => Ok(Arc::new(mock::MockSwitch::new(
            vlan::VlanPool::parse(&config.vlan.ranges)?,
        ))),
        other => Err(Error::invalid_value(
            "switch.driver",
            &format!("unknown switch driver {:?}", other),
        )),
    }
}
