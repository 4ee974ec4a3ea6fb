// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nic/network attachment
//!
//! These operations record the desired state and journal a pending change;
//! the switch_sync task realizes it on the hardware.  We kick the task
//! after each successful mutation so changes usually land well before the
//! next periodic activation.

use rackd_common::{Error, UpdateResult};
use rackd_db::models::Nic;

use super::Controller;

impl Controller {
    pub fn nic_connect_network(
        &self,
        node: &str,
        nic: &str,
        network: &str,
    ) -> UpdateResult<Nic> {
        let opctx = self.opctx("nic_connect_network");
        let updated =
            self.datastore.nic_connect_network(&opctx, node, nic, network)?;
        self.driver.activate(&self.switch_sync);
        Ok(updated)
    }

    pub fn nic_detach_network(
        &self,
        node: &str,
        nic: &str,
    ) -> UpdateResult<Nic> {
        let opctx = self.opctx("nic_detach_network");
        let updated = self.datastore.nic_detach_network(&opctx, node, nic)?;
        self.driver.activate(&self.switch_sync);
        Ok(updated)
    }

    /// Number of journaled changes not yet realized on the switch.
    pub fn networking_queue_depth(&self) -> Result<usize, Error> {
        let opctx = self.opctx("networking_queue_depth");
        self.datastore.networking_queue_depth(&opctx)
    }
}
