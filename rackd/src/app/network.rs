// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network operations
//!
//! The configured switch driver doubles as the network ID allocator, so
//! allocator-issued identifiers always come from (and return to) the pool
//! the hardware actually supports.

use rackd_common::{CreateResult, DeleteResult, ListResultVec, LookupResult};
use rackd_db::allocator::NetworkIdSource;
use rackd_db::datastore::{NetworkAccess, NetworkOwner};
use rackd_db::models::Network;

use super::Controller;

impl Controller {
    /// Creates a network on behalf of a project.  The project owns the
    /// network, only it may attach nodes, and the identifier is drawn from
    /// the switch driver's pool.
    pub fn network_create_for_project(
        &self,
        project: &str,
        name: &str,
    ) -> CreateResult<Network> {
        let opctx = self.opctx("network_create_for_project");
        self.datastore.network_create(
            &opctx,
            name,
            NetworkOwner::Project(project),
            NetworkAccess::Project(project),
            NetworkIdSource::Allocate(&*self.switch_driver),
        )
    }

    /// Creates an administrator-owned network.  Access may be granted to a
    /// single project or to everyone, and the identifier may be assigned
    /// directly instead of allocated.
    pub fn network_create_admin(
        &self,
        name: &str,
        access: Option<&str>,
        provider_id: Option<&str>,
    ) -> CreateResult<Network> {
        let opctx = self.opctx("network_create_admin");
        let access = match access {
            Some(project) => NetworkAccess::Project(project),
            None => NetworkAccess::Public,
        };
        let id_source = match provider_id {
            Some(id) => NetworkIdSource::Assign(id),
            None => NetworkIdSource::Allocate(&*self.switch_driver),
        };
        self.datastore.network_create(
            &opctx,
            name,
            NetworkOwner::Admin,
            access,
            id_source,
        )
    }

    pub fn network_delete(&self, name: &str) -> DeleteResult {
        let opctx = self.opctx("network_delete");
        self.datastore.network_delete(&opctx, name, &*self.switch_driver)
    }

    pub fn network_lookup(&self, name: &str) -> LookupResult<Network> {
        let opctx = self.opctx("network_lookup");
        self.datastore.network_lookup(&opctx, name)
    }

    pub fn network_list(&self) -> ListResultVec<Network> {
        let opctx = self.opctx("network_list");
        self.datastore.network_list(&opctx)
    }
}
