// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project operations

use rackd_common::{
    CreateResult, DeleteResult, ListResultVec, UpdateResult,
};
use rackd_db::models::{Network, Node, Project};

use super::Controller;

impl Controller {
    pub fn project_create(&self, name: &str) -> CreateResult<Project> {
        let opctx = self.opctx("project_create");
        self.datastore.project_create(&opctx, name)
    }

    pub fn project_delete(&self, name: &str) -> DeleteResult {
        let opctx = self.opctx("project_delete");
        self.datastore.project_delete(&opctx, name)
    }

    pub fn project_list(&self) -> ListResultVec<Project> {
        let opctx = self.opctx("project_list");
        self.datastore.project_list(&opctx)
    }

    pub fn project_connect_node(
        &self,
        project: &str,
        node: &str,
    ) -> UpdateResult<Node> {
        let opctx = self.opctx("project_connect_node");
        self.datastore.project_connect_node(&opctx, project, node)
    }

    pub fn project_detach_node(
        &self,
        project: &str,
        node: &str,
    ) -> UpdateResult<Node> {
        let opctx = self.opctx("project_detach_node");
        self.datastore.project_detach_node(&opctx, project, node)
    }

    pub fn project_nodes_list(
        &self,
        project: &str,
    ) -> ListResultVec<Node> {
        let opctx = self.opctx("project_nodes_list");
        self.datastore.project_nodes_list(&opctx, project)
    }

    pub fn project_networks_list(
        &self,
        project: &str,
    ) -> ListResultVec<Network> {
        let opctx = self.opctx("project_networks_list");
        self.datastore.project_networks_list(&opctx, project)
    }
}
