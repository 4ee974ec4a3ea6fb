// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Headnode operations

use rackd_common::{
    CreateResult, DeleteResult, ListResultVec, LookupResult, UpdateResult,
};
use rackd_db::models::{Headnode, Hnic};

use super::Controller;

impl Controller {
    pub fn headnode_create(
        &self,
        project: &str,
        name: &str,
    ) -> CreateResult<Headnode> {
        let opctx = self.opctx("headnode_create");
        self.datastore.headnode_create(&opctx, project, name)
    }

    pub fn headnode_delete(&self, name: &str) -> DeleteResult {
        let opctx = self.opctx("headnode_delete");
        self.datastore.headnode_delete(&opctx, name)
    }

    pub fn headnode_start(&self, name: &str) -> UpdateResult<Headnode> {
        let opctx = self.opctx("headnode_start");
        self.datastore.headnode_start(&opctx, name)
    }

    pub fn headnode_stop(&self, name: &str) -> UpdateResult<Headnode> {
        let opctx = self.opctx("headnode_stop");
        self.datastore.headnode_stop(&opctx, name)
    }

    pub fn headnode_lookup(&self, name: &str) -> LookupResult<Headnode> {
        let opctx = self.opctx("headnode_lookup");
        self.datastore.headnode_lookup(&opctx, name)
    }

    pub fn hnic_create(
        &self,
        headnode: &str,
        hnic: &str,
    ) -> CreateResult<Hnic> {
        let opctx = self.opctx("hnic_create");
        self.datastore.hnic_create(&opctx, headnode, hnic)
    }

    pub fn hnic_delete(&self, headnode: &str, hnic: &str) -> DeleteResult {
        let opctx = self.opctx("hnic_delete");
        self.datastore.hnic_delete(&opctx, headnode, hnic)
    }

    pub fn hnic_connect_network(
        &self,
        headnode: &str,
        hnic: &str,
        network: &str,
    ) -> UpdateResult<Hnic> {
        let opctx = self.opctx("hnic_connect_network");
        self.datastore.hnic_connect_network(&opctx, headnode, hnic, network)
    }

    pub fn hnic_detach_network(
        &self,
        headnode: &str,
        hnic: &str,
    ) -> UpdateResult<Hnic> {
        let opctx = self.opctx("hnic_detach_network");
        self.datastore.hnic_detach_network(&opctx, headnode, hnic)
    }

    pub fn hnic_list(&self, headnode: &str) -> ListResultVec<Hnic> {
        let opctx = self.opctx("hnic_list");
        self.datastore.hnic_list(&opctx, headnode)
    }
}
