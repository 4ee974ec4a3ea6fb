// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods on nodes and their nics

use std::str::FromStr;

use diesel::prelude::*;
use macaddr::MacAddr6;
use slog::info;

use rackd_common::{
    CreateResult, DeleteResult, Error, ListResultVec, LookupResult,
    ResourceType,
};

use super::{nic_on_node, node_by_name, DataStore};
use crate::context::OpContext;
use crate::error::{public_error_from_diesel_create, TxnError};
use crate::models::{Nic, Node, ObmCredentials};
use crate::schema::{networking_action, nic, node};

impl DataStore {
    /// Registers a node along with its out-of-band management coordinates.
    ///
    /// The OBM type tag is validated against the driver registry by the
    /// caller; the store records it as given.
    pub fn node_register(
        &self,
        opctx: &OpContext,
        name: &str,
        obm: &ObmCredentials,
    ) -> CreateResult<Node> {
        rackd_common::validate_label(name)?;
        let new_node = Node::new(name, obm);
        let mut conn = self.conn();
        diesel::insert_into(node::table)
            .values(&new_node)
            .execute(&mut *conn)
            .map_err(|e| {
                public_error_from_diesel_create(e, ResourceType::Node, name)
            })?;
        info!(opctx.log, "registered node";
            "node" => name, "obm_type" => &obm.obm_type);
        Ok(new_node)
    }

    /// Deletes a node. Blocked while the node is owned by a project or
    /// still has nics.
    pub fn node_delete(&self, opctx: &OpContext, name: &str) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let n = node_by_name(tx, name)?;
            if n.project_id.is_some() {
                return Err(
                    Error::blocked("node is owned by a project").into()
                );
            }
            let nics: i64 = nic::table
                .filter(nic::node_id.eq(n.id))
                .count()
                .get_result(tx)?;
            if nics > 0 {
                return Err(Error::blocked("node still has nics").into());
            }
            diesel::delete(node::table.filter(node::id.eq(n.id)))
                .execute(tx)?;
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted node"; "node" => name);
        Ok(())
    }

    pub fn node_lookup(
        &self,
        _opctx: &OpContext,
        name: &str,
    ) -> LookupResult<Node> {
        let mut conn = self.conn();
        node_by_name(&mut conn, name)
    }

    pub fn node_list(&self, _opctx: &OpContext) -> ListResultVec<Node> {
        let mut conn = self.conn();
        node::table
            .order(node::name.asc())
            .load::<Node>(&mut *conn)
            .map_err(|e| {
                Error::internal_error(&format!("listing nodes: {}", e))
            })
    }

    /// Lists nodes not owned by any project.
    pub fn node_list_free(&self, _opctx: &OpContext) -> ListResultVec<Node> {
        let mut conn = self.conn();
        node::table
            .filter(node::project_id.is_null())
            .order(node::name.asc())
            .load::<Node>(&mut *conn)
            .map_err(|e| {
                Error::internal_error(&format!("listing free nodes: {}", e))
            })
    }

    /// Registers a nic on a node. The MAC address is validated and stored
    /// in canonical (lowercase, colon-separated) form.
    pub fn nic_register(
        &self,
        opctx: &OpContext,
        node_name: &str,
        nic_name: &str,
        mac_addr: &str,
    ) -> CreateResult<Nic> {
        rackd_common::validate_label(nic_name)?;
        let mac = MacAddr6::from_str(mac_addr).map_err(|e| {
            Error::invalid_value(
                "mac_addr",
                &format!("{:?} is not a valid MAC address: {}", mac_addr, e),
            )
        })?;
        let mac = mac.to_string().to_lowercase();
        let mut conn = self.conn();
        let new_nic = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let n = node_by_name(tx, node_name)?;
                let new_nic = Nic::new(n.id, nic_name, &mac);
                diesel::insert_into(nic::table)
                    .values(&new_nic)
                    .execute(tx)
                    .map_err(|e| {
                        public_error_from_diesel_create(
                            e,
                            ResourceType::Nic,
                            nic_name,
                        )
                    })?;
                Ok(new_nic)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "registered nic";
            "node" => node_name, "nic" => nic_name, "mac_addr" => &mac);
        Ok(new_nic)
    }

    /// Deletes a nic. Blocked while the nic is attached to a network or has
    /// a pending networking change.
    pub fn nic_delete(
        &self,
        opctx: &OpContext,
        node_name: &str,
        nic_name: &str,
    ) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let n = node_by_name(tx, node_name)?;
            let target = nic_on_node(tx, &n, nic_name)?;
            if target.network_id.is_some() {
                return Err(
                    Error::blocked("nic is attached to a network").into()
                );
            }
            let pending: i64 = networking_action::table
                .filter(networking_action::nic_id.eq(target.id))
                .count()
                .get_result(tx)?;
            if pending > 0 {
                return Err(Error::blocked(
                    "nic has a networking change still pending",
                )
                .into());
            }
            diesel::delete(nic::table.filter(nic::id.eq(target.id)))
                .execute(tx)?;
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted nic"; "node" => node_name, "nic" => nic_name);
        Ok(())
    }

    pub fn nic_lookup(
        &self,
        _opctx: &OpContext,
        node_name: &str,
        nic_name: &str,
    ) -> LookupResult<Nic> {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let n = node_by_name(tx, node_name)?;
            Ok(nic_on_node(tx, &n, nic_name)?)
        })
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::datastore;
    use crate::context::OpContext;
    use crate::models::ObmCredentials;
    use rackd_common::Error;

    fn obm() -> ObmCredentials {
        ObmCredentials {
            obm_type: "mock".to_string(),
            host: "10.0.0.2".to_string(),
            user: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn register_and_delete() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.node_register(&opctx, "n1", &obm()).unwrap();
        let err = ds.node_register(&opctx, "n1", &obm()).unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        assert_eq!(ds.node_list_free(&opctx).unwrap().len(), 1);
        ds.node_delete(&opctx, "n1").unwrap();
        assert_eq!(ds.node_list_free(&opctx).unwrap().len(), 0);
    }

    #[test]
    fn owned_node_cannot_be_deleted() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        ds.node_register(&opctx, "n1", &obm()).unwrap();
        ds.project_connect_node(&opctx, "acme", "n1").unwrap();
        let err = ds.node_delete(&opctx, "n1").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));
    }

    #[test]
    fn nic_registration() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.node_register(&opctx, "n1", &obm()).unwrap();

        let nic = ds
            .nic_register(&opctx, "n1", "eth0", "DE:AD:BE:EF:20:14")
            .unwrap();
        assert_eq!(nic.mac_addr, "de:ad:be:ef:20:14");

        let err = ds
            .nic_register(&opctx, "n1", "eth1", "not-a-mac")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        let err = ds
            .nic_register(&opctx, "n1", "eth0", "de:ad:be:ef:20:15")
            .unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        // The node cannot be deleted until its nics are gone.
        let err = ds.node_delete(&opctx, "n1").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));
        ds.nic_delete(&opctx, "n1", "eth0").unwrap();
        ds.node_delete(&opctx, "n1").unwrap();
    }
}
