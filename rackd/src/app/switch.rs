// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch and port operations

use rackd_common::{
    CreateResult, DeleteResult, Error, ListResultVec, UpdateResult,
};
use rackd_db::models::{Nic, Port, Switch};

use super::Controller;

impl Controller {
    /// Registers a switch.  A deployment runs a single switch driver, so
    /// the requested driver tag must be the configured one.
    pub fn switch_register(
        &self,
        name: &str,
        driver: &str,
    ) -> CreateResult<Switch> {
        let opctx = self.opctx("switch_register");
        if driver != self.switch_driver.tag() {
            return Err(Error::invalid_value(
                "driver",
                &format!(
                    "unknown switch driver {:?} (this deployment runs {:?})",
                    driver,
                    self.switch_driver.tag()
                ),
            ));
        }
        self.datastore.switch_register(&opctx, name, driver)
    }

    pub fn switch_delete(&self, name: &str) -> DeleteResult {
        let opctx = self.opctx("switch_delete");
        self.datastore.switch_delete(&opctx, name)
    }

    pub fn switch_list(&self) -> ListResultVec<Switch> {
        let opctx = self.opctx("switch_list");
        self.datastore.switch_list(&opctx)
    }

    pub fn port_register(
        &self,
        switch: &str,
        port: &str,
    ) -> CreateResult<Port> {
        let opctx = self.opctx("port_register");
        self.datastore.port_register(&opctx, switch, port)
    }

    pub fn port_delete(&self, switch: &str, port: &str) -> DeleteResult {
        let opctx = self.opctx("port_delete");
        self.datastore.port_delete(&opctx, switch, port)
    }

    pub fn port_connect_nic(
        &self,
        switch: &str,
        port: &str,
        node: &str,
        nic: &str,
    ) -> UpdateResult<Nic> {
        let opctx = self.opctx("port_connect_nic");
        self.datastore.port_connect_nic(&opctx, switch, port, node, nic)
    }

    pub fn port_detach_nic(
        &self,
        switch: &str,
        port: &str,
    ) -> UpdateResult<Nic> {
        let opctx = self.opctx("port_detach_nic");
        self.datastore.port_detach_nic(&opctx, switch, port)
    }
}
