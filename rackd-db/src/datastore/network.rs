// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods on networks

use diesel::prelude::*;
use slog::info;

use rackd_common::{
    CreateResult, DeleteResult, Error, ListResultVec, LookupResult,
    ResourceType,
};

use super::{network_by_name, project_by_name, DataStore};
use crate::allocator::{NetworkIdAllocator, NetworkIdSource};
use crate::context::OpContext;
use crate::error::{public_error_from_diesel_create, TxnError};
use crate::models::Network;
use crate::schema::{hnic, network, networking_action, nic, node};
use crate::types::DbUuid;

/// Who is creating a network.
pub enum NetworkOwner<'a> {
    Admin,
    Project(&'a str),
}

/// Which project may attach nodes to a network.
pub enum NetworkAccess<'a> {
    /// any project may attach
    Public,
    Project(&'a str),
}

impl DataStore {
    /// Creates a network.
    ///
    /// Project-created networks must name their creator as the access
    /// project and must draw their provider identifier from the allocator;
    /// admin-created networks may grant access to any single project (or
    /// everyone) and may assign an identifier directly.  Allocation runs
    /// inside the same transaction that inserts the row, so exhaustion or a
    /// crash cannot leak an identifier.
    pub fn network_create(
        &self,
        opctx: &OpContext,
        name: &str,
        owner: NetworkOwner<'_>,
        access: NetworkAccess<'_>,
        id_source: NetworkIdSource<'_>,
    ) -> CreateResult<Network> {
        rackd_common::validate_label(name)?;
        if let NetworkOwner::Project(creator) = &owner {
            match &access {
                NetworkAccess::Project(p) if p == creator => (),
                _ => {
                    return Err(Error::invalid_request(
                        "a project may only create networks for itself",
                    ));
                }
            }
            if let NetworkIdSource::Assign(_) = id_source {
                return Err(Error::invalid_request(
                    "only an administrator may assign a network ID",
                ));
            }
        }

        let mut conn = self.conn();
        let created = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let owner_id = match owner {
                    NetworkOwner::Admin => None,
                    NetworkOwner::Project(p) => {
                        Some(project_by_name(tx, p)?.id)
                    }
                };
                let access_id = match access {
                    NetworkAccess::Public => None,
                    NetworkAccess::Project(p) => {
                        Some(project_by_name(tx, p)?.id)
                    }
                };
                let (allocated, provider_id) = match id_source {
                    NetworkIdSource::Allocate(allocator) => {
                        let id = allocator.allocate_id(tx)?.ok_or_else(
                            || {
                                Error::insufficient_capacity(
                                    "no network IDs available",
                                )
                            },
                        )?;
                        (true, id)
                    }
                    NetworkIdSource::Assign(id) => (false, id.to_owned()),
                };
                let created = Network::new(
                    name,
                    owner_id,
                    access_id,
                    allocated,
                    &provider_id,
                );
                diesel::insert_into(network::table)
                    .values(&created)
                    .execute(tx)
                    .map_err(|e| {
                        public_error_from_diesel_create(
                            e,
                            ResourceType::Network,
                            name,
                        )
                    })?;
                Ok(created)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "created network";
            "network" => name,
            "provider_id" => &created.provider_id,
            "allocated" => created.allocated);
        Ok(created)
    }

    /// Deletes a network and returns its identifier to the allocator if it
    /// was allocator-issued.
    ///
    /// Blocked while any nic or hnic is attached, while any pending journal
    /// entry still targets the network, and (for project-owned networks)
    /// while the owning project has networking changes pending anywhere.
    pub fn network_delete(
        &self,
        opctx: &OpContext,
        name: &str,
        allocator: &dyn NetworkIdAllocator,
    ) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let net = network_by_name(tx, name)?;
            let nics: i64 = nic::table
                .filter(nic::network_id.eq(net.id))
                .count()
                .get_result(tx)?;
            if nics > 0 {
                return Err(Error::blocked(
                    "network is still connected to nodes",
                )
                .into());
            }
            let hnics: i64 = hnic::table
                .filter(hnic::network_id.eq(net.id))
                .count()
                .get_result(tx)?;
            if hnics > 0 {
                return Err(Error::blocked(
                    "network is still connected to headnodes",
                )
                .into());
            }
            let pending: i64 = networking_action::table
                .filter(networking_action::new_network_id.eq(net.id))
                .count()
                .get_result(tx)?;
            if pending > 0 {
                return Err(Error::blocked(
                    "networking changes targeting this network are still \
                     pending",
                )
                .into());
            }
            if let Some(owner_id) = net.owner_project_id {
                // Pending work anywhere in the owning project may still
                // assume the network exists.
                let node_ids: Vec<DbUuid> = node::table
                    .filter(node::project_id.eq(owner_id))
                    .select(node::id)
                    .load(tx)?;
                let nic_ids: Vec<DbUuid> = nic::table
                    .filter(nic::node_id.eq_any(&node_ids))
                    .select(nic::id)
                    .load(tx)?;
                let project_pending: i64 = networking_action::table
                    .filter(networking_action::nic_id.eq_any(&nic_ids))
                    .count()
                    .get_result(tx)?;
                if project_pending > 0 {
                    return Err(Error::blocked(
                        "owning project has networking changes still pending",
                    )
                    .into());
                }
            }
            diesel::delete(network::table.filter(network::id.eq(net.id)))
                .execute(tx)?;
            if net.allocated {
                allocator.free_id(tx, &net.provider_id)?;
            }
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted network"; "network" => name);
        Ok(())
    }

    pub fn network_lookup(
        &self,
        _opctx: &OpContext,
        name: &str,
    ) -> LookupResult<Network> {
        let mut conn = self.conn();
        network_by_name(&mut conn, name)
    }

    pub fn network_list(&self, _opctx: &OpContext) -> ListResultVec<Network> {
        let mut conn = self.conn();
        network::table
            .order(network::name.asc())
            .load::<Network>(&mut *conn)
            .map_err(|e| {
                Error::internal_error(&format!("listing networks: {}", e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::datastore;
    use super::{NetworkAccess, NetworkOwner};
    use crate::allocator::{NetworkIdAllocator, NetworkIdSource};
    use crate::context::OpContext;
    use diesel::SqliteConnection;
    use rackd_common::Error;

    /// Allocator that always hands out the same identifier, or nothing.
    struct FixedAllocator(Option<&'static str>);

    impl NetworkIdAllocator for FixedAllocator {
        fn allocate_id(
            &self,
            _conn: &mut SqliteConnection,
        ) -> Result<Option<String>, Error> {
            Ok(self.0.map(str::to_owned))
        }

        fn free_id(
            &self,
            _conn: &mut SqliteConnection,
            _id: &str,
        ) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn project_network_rules() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        let alloc = FixedAllocator(Some("101"));

        let net = ds
            .network_create(
                &opctx,
                "acme-net",
                NetworkOwner::Project("acme"),
                NetworkAccess::Project("acme"),
                NetworkIdSource::Allocate(&alloc),
            )
            .unwrap();
        assert!(net.allocated);
        assert_eq!(net.provider_id, "101");

        // A project cannot create a public network or assign its own ID.
        let err = ds
            .network_create(
                &opctx,
                "acme-pub",
                NetworkOwner::Project("acme"),
                NetworkAccess::Public,
                NetworkIdSource::Allocate(&alloc),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
        let err = ds
            .network_create(
                &opctx,
                "acme-assigned",
                NetworkOwner::Project("acme"),
                NetworkAccess::Project("acme"),
                NetworkIdSource::Assign("999"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));

        // A project with networks cannot be deleted.
        let err = ds.project_delete(&opctx, "acme").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));
        ds.network_delete(&opctx, "acme-net", &alloc).unwrap();
        ds.project_delete(&opctx, "acme").unwrap();
    }

    #[test]
    fn admin_networks_and_exhaustion() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        let net = ds
            .network_create(
                &opctx,
                "mgmt",
                NetworkOwner::Admin,
                NetworkAccess::Public,
                NetworkIdSource::Assign("3500"),
            )
            .unwrap();
        assert!(!net.allocated);
        assert_eq!(net.provider_id, "3500");

        let exhausted = FixedAllocator(None);
        let err = ds
            .network_create(
                &opctx,
                "overflow",
                NetworkOwner::Admin,
                NetworkAccess::Public,
                NetworkIdSource::Allocate(&exhausted),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientCapacity { .. }));

        let err = ds
            .network_create(
                &opctx,
                "mgmt",
                NetworkOwner::Admin,
                NetworkAccess::Public,
                NetworkIdSource::Assign("3501"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));
    }
}
