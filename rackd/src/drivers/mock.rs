// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory drivers for tests
//!
//! [`MockSwitch`] records every map it is asked to apply and can be told to
//! fail, which is how reconciler retry behavior is exercised.  [`MockObm`]
//! records power operations and keeps consoles in memory.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use diesel::SqliteConnection;
use rackd_common::Error;
use rackd_db::NetworkIdAllocator;

use super::vlan::VlanPool;
use super::{ObmDriver, ObmError, ObmTarget, SwitchDriver, SwitchError};

pub const MOCK_TAG: &str = "mock";

pub struct MockSwitch {
    pool: VlanPool,
    fail: AtomicBool,
    applied: Mutex<Vec<BTreeMap<String, Option<String>>>>,
}

impl MockSwitch {
    pub fn new(pool: VlanPool) -> MockSwitch {
        MockSwitch {
            pool,
            fail: AtomicBool::new(false),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Makes every subsequent `apply_networking` fail (or succeed again).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every map successfully applied, in order.
    pub fn applied(&self) -> Vec<BTreeMap<String, Option<String>>> {
        self.applied.lock().unwrap().clone()
    }

    /// The most recently applied map, if any.
    pub fn last_applied(&self) -> Option<BTreeMap<String, Option<String>>> {
        self.applied.lock().unwrap().last().cloned()
    }
}

impl NetworkIdAllocator for MockSwitch {
    fn allocate_id(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<String>, Error> {
        self.pool.allocate_from(conn)
    }

    fn free_id(
        &self,
        _conn: &mut SqliteConnection,
        _id: &str,
    ) -> Result<(), Error> {
        Ok(())
    }
}

impl SwitchDriver for MockSwitch {
    fn tag(&self) -> &'static str {
        MOCK_TAG
    }

    fn apply_networking(
        &self,
        map: &BTreeMap<String, Option<String>>,
    ) -> Result<(), SwitchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SwitchError::Unreachable(
                "mock switch told to fail".to_string(),
            ));
        }
        self.applied.lock().unwrap().push(map.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockObm {
    ops: Mutex<Vec<String>>,
    consoles: Mutex<BTreeMap<String, String>>,
}

impl MockObm {
    pub fn new() -> MockObm {
        MockObm::default()
    }

    /// Operations performed, as "op node" strings.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: &str, node: &str) {
        self.ops.lock().unwrap().push(format!("{} {}", op, node));
    }
}

impl ObmDriver for MockObm {
    fn tag(&self) -> &'static str {
        MOCK_TAG
    }

    fn power_cycle(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        self.record("power_cycle", target.node);
        Ok(())
    }

    fn power_off(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        self.record("power_off", target.node);
        Ok(())
    }

    fn console_start(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        self.record("console_start", target.node);
        self.consoles
            .lock()
            .unwrap()
            .entry(target.node.to_string())
            .or_insert_with(|| format!("console of {}\n", target.node));
        Ok(())
    }

    fn console_stop(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        self.record("console_stop", target.node);
        Ok(())
    }

    fn console_show(
        &self,
        target: &ObmTarget<'_>,
    ) -> Result<String, ObmError> {
        self.consoles
            .lock()
            .unwrap()
            .get(target.node)
            .cloned()
            .ok_or_else(|| ObmError::NoConsole(target.node.to_string()))
    }

    fn console_delete(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        self.record("console_delete", target.node);
        self.consoles.lock().unwrap().remove(target.node);
        Ok(())
    }
}
