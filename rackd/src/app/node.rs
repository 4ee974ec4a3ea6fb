// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node operations, including out-of-band management passthrough

use rackd_common::{
    CreateResult, DeleteResult, Error, ListResultVec, LookupResult,
};
use rackd_db::models::{Nic, Node, ObmCredentials};

use super::Controller;
use crate::drivers::ObmTarget;

impl Controller {
    /// Registers a node. The OBM type must name a registered driver.
    pub fn node_register(
        &self,
        name: &str,
        obm: &ObmCredentials,
    ) -> CreateResult<Node> {
        let opctx = self.opctx("node_register");
        self.obm_registry.lookup(&obm.obm_type)?;
        self.datastore.node_register(&opctx, name, obm)
    }

    pub fn node_delete(&self, name: &str) -> DeleteResult {
        let opctx = self.opctx("node_delete");
        self.datastore.node_delete(&opctx, name)
    }

    pub fn node_lookup(&self, name: &str) -> LookupResult<Node> {
        let opctx = self.opctx("node_lookup");
        self.datastore.node_lookup(&opctx, name)
    }

    pub fn node_list(&self) -> ListResultVec<Node> {
        let opctx = self.opctx("node_list");
        self.datastore.node_list(&opctx)
    }

    pub fn node_list_free(&self) -> ListResultVec<Node> {
        let opctx = self.opctx("node_list_free");
        self.datastore.node_list_free(&opctx)
    }

    pub fn nic_register(
        &self,
        node: &str,
        nic: &str,
        mac_addr: &str,
    ) -> CreateResult<Nic> {
        let opctx = self.opctx("nic_register");
        self.datastore.nic_register(&opctx, node, nic, mac_addr)
    }

    pub fn nic_delete(&self, node: &str, nic: &str) -> DeleteResult {
        let opctx = self.opctx("nic_delete");
        self.datastore.nic_delete(&opctx, node, nic)
    }

    pub fn node_power_cycle(&self, name: &str) -> Result<(), Error> {
        self.obm_op("node_power_cycle", name, |driver, target| {
            driver.power_cycle(target)
        })
    }

    pub fn node_power_off(&self, name: &str) -> Result<(), Error> {
        self.obm_op("node_power_off", name, |driver, target| {
            driver.power_off(target)
        })
    }

    pub fn node_console_start(&self, name: &str) -> Result<(), Error> {
        self.obm_op("node_console_start", name, |driver, target| {
            driver.console_start(target)
        })
    }

    pub fn node_console_stop(&self, name: &str) -> Result<(), Error> {
        self.obm_op("node_console_stop", name, |driver, target| {
            driver.console_stop(target)
        })
    }

    pub fn node_console_show(&self, name: &str) -> Result<String, Error> {
        let opctx = self.opctx("node_console_show");
        let node = self.datastore.node_lookup(&opctx, name)?;
        let driver = self.obm_registry.lookup(&node.obm_type)?;
        let target = ObmTarget {
            node: &node.name,
            host: &node.obm_host,
            user: &node.obm_user,
            password: &node.obm_password,
        };
        driver.console_show(&target).map_err(|e| {
            Error::unavail(&format!(
                "console of node {:?}: {}",
                name, e
            ))
        })
    }

    pub fn node_console_delete(&self, name: &str) -> Result<(), Error> {
        self.obm_op("node_console_delete", name, |driver, target| {
            driver.console_delete(target)
        })
    }

    fn obm_op(
        &self,
        operation: &'static str,
        name: &str,
        op: impl FnOnce(
            &dyn crate::drivers::ObmDriver,
            &ObmTarget<'_>,
        ) -> Result<(), crate::drivers::ObmError>,
    ) -> Result<(), Error> {
        let opctx = self.opctx(operation);
        let node = self.datastore.node_lookup(&opctx, name)?;
        let driver = self.obm_registry.lookup(&node.obm_type)?;
        let target = ObmTarget {
            node: &node.name,
            host: &node.obm_host,
            user: &node.obm_user,
            password: &node.obm_password,
        };
        op(&*driver, &target).map_err(|e| {
            Error::unavail(&format!("{} of node {:?}: {}", operation, name, e))
        })
    }
}
