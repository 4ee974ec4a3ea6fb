// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods on headnodes and their hnics
//!
//! A headnode starts out dirty (editable).  Starting it freezes the VM
//! definition: hnic create/delete and network connect/detach all fail with
//! IllegalState from then on.

use diesel::prelude::*;
use slog::info;

use rackd_common::{
    CreateResult, DeleteResult, Error, ListResultVec, LookupResult,
    ResourceType, UpdateResult,
};

use super::{
    headnode_by_name, hnic_on_headnode, network_by_name, project_by_name,
    DataStore,
};
use crate::context::OpContext;
use crate::error::{public_error_from_diesel_create, TxnError};
use crate::models::{Headnode, Hnic};
use crate::schema::{headnode, hnic};
use crate::types::DbUuid;

impl DataStore {
    /// Creates a headnode for a project. Each project may have at most one.
    pub fn headnode_create(
        &self,
        opctx: &OpContext,
        project_name: &str,
        name: &str,
    ) -> CreateResult<Headnode> {
        rackd_common::validate_label(name)?;
        let mut conn = self.conn();
        let created = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let p = project_by_name(tx, project_name)?;
                let existing: i64 = headnode::table
                    .filter(headnode::project_id.eq(p.id))
                    .count()
                    .get_result(tx)?;
                if existing > 0 {
                    return Err(Error::already_exists(
                        ResourceType::Headnode,
                        &format!(
                            "project \"{}\" already has a headnode",
                            project_name
                        ),
                    )
                    .into());
                }
                let created = Headnode::new(p.id, name);
                diesel::insert_into(headnode::table)
                    .values(&created)
                    .execute(tx)
                    .map_err(|e| {
                        public_error_from_diesel_create(
                            e,
                            ResourceType::Headnode,
                            name,
                        )
                    })?;
                Ok(created)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "created headnode";
            "project" => project_name, "headnode" => name);
        Ok(created)
    }

    /// Deletes a headnode and all of its hnics.
    pub fn headnode_delete(
        &self,
        opctx: &OpContext,
        name: &str,
    ) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let hn = headnode_by_name(tx, name)?;
            diesel::delete(hnic::table.filter(hnic::headnode_id.eq(hn.id)))
                .execute(tx)?;
            diesel::delete(headnode::table.filter(headnode::id.eq(hn.id)))
                .execute(tx)?;
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted headnode"; "headnode" => name);
        Ok(())
    }

    /// Marks a headnode started, freezing its definition.
    pub fn headnode_start(
        &self,
        opctx: &OpContext,
        name: &str,
    ) -> UpdateResult<Headnode> {
        let mut conn = self.conn();
        let hn = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let mut hn = headnode_by_name(tx, name)?;
                if hn.dirty {
                    diesel::update(
                        headnode::table.filter(headnode::id.eq(hn.id)),
                    )
                    .set(headnode::dirty.eq(false))
                    .execute(tx)?;
                    hn.dirty = false;
                }
                Ok(hn)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "started headnode"; "headnode" => name);
        Ok(hn)
    }

    /// Powers a headnode off. The definition stays frozen.
    pub fn headnode_stop(
        &self,
        opctx: &OpContext,
        name: &str,
    ) -> UpdateResult<Headnode> {
        let mut conn = self.conn();
        let hn = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let hn = headnode_by_name(tx, name)?;
                if hn.dirty {
                    return Err(Error::illegal_state(
                        "headnode has never been started",
                    )
                    .into());
                }
                Ok(hn)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "stopped headnode"; "headnode" => name);
        Ok(hn)
    }

    pub fn headnode_lookup(
        &self,
        _opctx: &OpContext,
        name: &str,
    ) -> LookupResult<Headnode> {
        let mut conn = self.conn();
        headnode_by_name(&mut conn, name)
    }

    pub fn hnic_create(
        &self,
        opctx: &OpContext,
        headnode_name: &str,
        hnic_name: &str,
    ) -> CreateResult<Hnic> {
        rackd_common::validate_label(hnic_name)?;
        let mut conn = self.conn();
        let created = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let hn = headnode_by_name(tx, headnode_name)?;
                if !hn.dirty {
                    return Err(frozen().into());
                }
                let created = Hnic::new(hn.id, hnic_name);
                diesel::insert_into(hnic::table)
                    .values(&created)
                    .execute(tx)
                    .map_err(|e| {
                        public_error_from_diesel_create(
                            e,
                            ResourceType::Hnic,
                            hnic_name,
                        )
                    })?;
                Ok(created)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "created hnic";
            "headnode" => headnode_name, "hnic" => hnic_name);
        Ok(created)
    }

    pub fn hnic_delete(
        &self,
        opctx: &OpContext,
        headnode_name: &str,
        hnic_name: &str,
    ) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let hn = headnode_by_name(tx, headnode_name)?;
            let target = hnic_on_headnode(tx, &hn, hnic_name)?;
            if !hn.dirty {
                return Err(frozen().into());
            }
            diesel::delete(hnic::table.filter(hnic::id.eq(target.id)))
                .execute(tx)?;
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted hnic";
            "headnode" => headnode_name, "hnic" => hnic_name);
        Ok(())
    }

    /// Attaches an hnic to a network. Unlike nic attachment this is not
    /// journaled; it is realized when the headnode VM is defined.
    pub fn hnic_connect_network(
        &self,
        opctx: &OpContext,
        headnode_name: &str,
        hnic_name: &str,
        network_name: &str,
    ) -> UpdateResult<Hnic> {
        let mut conn = self.conn();
        let updated = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let hn = headnode_by_name(tx, headnode_name)?;
                let mut target = hnic_on_headnode(tx, &hn, hnic_name)?;
                let net = network_by_name(tx, network_name)?;
                if !hn.dirty {
                    return Err(frozen().into());
                }
                if let Some(access_id) = net.access_project_id {
                    if access_id != hn.project_id {
                        return Err(Error::project_mismatch(
                            "headnode and network are in different projects",
                        )
                        .into());
                    }
                }
                if target.network_id.is_some() {
                    return Err(Error::already_exists(
                        ResourceType::Hnic,
                        &format!(
                            "hnic \"{}\" is already attached to a network",
                            hnic_name
                        ),
                    )
                    .into());
                }
                diesel::update(hnic::table.filter(hnic::id.eq(target.id)))
                    .set(hnic::network_id.eq(Some(net.id)))
                    .execute(tx)?;
                target.network_id = Some(net.id);
                Ok(target)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "connected hnic to network";
            "headnode" => headnode_name, "hnic" => hnic_name,
            "network" => network_name);
        Ok(updated)
    }

    pub fn hnic_detach_network(
        &self,
        opctx: &OpContext,
        headnode_name: &str,
        hnic_name: &str,
    ) -> UpdateResult<Hnic> {
        let mut conn = self.conn();
        let updated = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let hn = headnode_by_name(tx, headnode_name)?;
                let mut target = hnic_on_headnode(tx, &hn, hnic_name)?;
                if !hn.dirty {
                    return Err(frozen().into());
                }
                if target.network_id.is_none() {
                    return Err(Error::not_found_in_owner(
                        ResourceType::Network,
                        "attached network",
                        ResourceType::Hnic,
                        hnic_name,
                    )
                    .into());
                }
                diesel::update(hnic::table.filter(hnic::id.eq(target.id)))
                    .set(hnic::network_id.eq(None::<DbUuid>))
                    .execute(tx)?;
                target.network_id = None;
                Ok(target)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "detached hnic from network";
            "headnode" => headnode_name, "hnic" => hnic_name);
        Ok(updated)
    }

    pub fn hnic_list(
        &self,
        _opctx: &OpContext,
        headnode_name: &str,
    ) -> ListResultVec<Hnic> {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let hn = headnode_by_name(tx, headnode_name)?;
            let hnics = hnic::table
                .filter(hnic::headnode_id.eq(hn.id))
                .order(hnic::name.asc())
                .load::<Hnic>(tx)?;
            Ok(hnics)
        })
        .map_err(Error::from)
    }
}

fn frozen() -> Error {
    Error::illegal_state("headnode has been started and can no longer be \
         modified")
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::datastore;
    use super::super::{NetworkAccess, NetworkOwner};
    use crate::allocator::NetworkIdSource;
    use crate::context::OpContext;
    use rackd_common::Error;

    #[test]
    fn one_headnode_per_project() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        ds.headnode_create(&opctx, "acme", "hn0").unwrap();
        let err = ds.headnode_create(&opctx, "acme", "hn1").unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        let err = ds.project_delete(&opctx, "acme").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));
        ds.headnode_delete(&opctx, "hn0").unwrap();
        ds.project_delete(&opctx, "acme").unwrap();
    }

    #[test]
    fn start_freezes_definition() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        ds.headnode_create(&opctx, "acme", "hn0").unwrap();
        ds.hnic_create(&opctx, "hn0", "hnic0").unwrap();

        // Stopping a never-started headnode is illegal.
        let err = ds.headnode_stop(&opctx, "hn0").unwrap_err();
        assert!(matches!(err, Error::IllegalState { .. }));

        let hn = ds.headnode_start(&opctx, "hn0").unwrap();
        assert!(!hn.dirty);
        ds.headnode_stop(&opctx, "hn0").unwrap();

        let err = ds.hnic_create(&opctx, "hn0", "hnic1").unwrap_err();
        assert!(matches!(err, Error::IllegalState { .. }));
        let err = ds.hnic_delete(&opctx, "hn0", "hnic0").unwrap_err();
        assert!(matches!(err, Error::IllegalState { .. }));

        // Deleting the headnode itself still works, and cascades.
        ds.headnode_delete(&opctx, "hn0").unwrap();
        ds.project_delete(&opctx, "acme").unwrap();
    }

    #[test]
    fn hnic_network_attachment() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        ds.project_create(&opctx, "initech").unwrap();
        ds.headnode_create(&opctx, "acme", "hn0").unwrap();
        ds.hnic_create(&opctx, "hn0", "hnic0").unwrap();
        ds.network_create(
            &opctx,
            "theirs",
            NetworkOwner::Admin,
            NetworkAccess::Project("initech"),
            NetworkIdSource::Assign("200"),
        )
        .unwrap();
        ds.network_create(
            &opctx,
            "ours",
            NetworkOwner::Admin,
            NetworkAccess::Project("acme"),
            NetworkIdSource::Assign("201"),
        )
        .unwrap();

        let err = ds
            .hnic_connect_network(&opctx, "hn0", "hnic0", "theirs")
            .unwrap_err();
        assert!(matches!(err, Error::ProjectMismatch { .. }));

        let hnic = ds
            .hnic_connect_network(&opctx, "hn0", "hnic0", "ours")
            .unwrap();
        assert!(hnic.network_id.is_some());
        let err = ds
            .hnic_connect_network(&opctx, "hn0", "hnic0", "ours")
            .unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        let hnic =
            ds.hnic_detach_network(&opctx, "hn0", "hnic0").unwrap();
        assert!(hnic.network_id.is_none());
        let err =
            ds.hnic_detach_network(&opctx, "hn0", "hnic0").unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { .. }));
    }
}
