// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods on switches and their ports

use diesel::prelude::*;
use slog::info;

use rackd_common::{
    CreateResult, DeleteResult, Error, ListResultVec, LookupType,
    ResourceType, UpdateResult,
};

use super::{nic_on_node, node_by_name, port_on_switch, switch_by_name};
use super::DataStore;
use crate::context::OpContext;
use crate::error::{public_error_from_diesel_create, TxnError};
use crate::models::{Nic, Port, Switch};
use crate::schema::{nic, port, switch};
use crate::types::DbUuid;

impl DataStore {
    /// Registers a switch. The driver tag is validated against the switch
    /// driver registry by the caller.
    pub fn switch_register(
        &self,
        opctx: &OpContext,
        name: &str,
        driver: &str,
    ) -> CreateResult<Switch> {
        rackd_common::validate_label(name)?;
        let new_switch = Switch::new(name, driver);
        let mut conn = self.conn();
        diesel::insert_into(switch::table)
            .values(&new_switch)
            .execute(&mut *conn)
            .map_err(|e| {
                public_error_from_diesel_create(e, ResourceType::Switch, name)
            })?;
        info!(opctx.log, "registered switch";
            "switch" => name, "driver" => driver);
        Ok(new_switch)
    }

    /// Deletes a switch. Blocked while it still has ports.
    pub fn switch_delete(
        &self,
        opctx: &OpContext,
        name: &str,
    ) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let s = switch_by_name(tx, name)?;
            let ports: i64 = port::table
                .filter(port::switch_id.eq(s.id))
                .count()
                .get_result(tx)?;
            if ports > 0 {
                return Err(Error::blocked("switch still has ports").into());
            }
            diesel::delete(switch::table.filter(switch::id.eq(s.id)))
                .execute(tx)?;
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted switch"; "switch" => name);
        Ok(())
    }

    pub fn switch_list(&self, _opctx: &OpContext) -> ListResultVec<Switch> {
        let mut conn = self.conn();
        switch::table
            .order(switch::name.asc())
            .load::<Switch>(&mut *conn)
            .map_err(|e| {
                Error::internal_error(&format!("listing switches: {}", e))
            })
    }

    pub fn port_register(
        &self,
        opctx: &OpContext,
        switch_name: &str,
        port_name: &str,
    ) -> CreateResult<Port> {
        rackd_common::validate_label(port_name)?;
        let mut conn = self.conn();
        let new_port = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let s = switch_by_name(tx, switch_name)?;
                let new_port = Port::new(s.id, port_name);
                diesel::insert_into(port::table)
                    .values(&new_port)
                    .execute(tx)
                    .map_err(|e| {
                        public_error_from_diesel_create(
                            e,
                            ResourceType::Port,
                            port_name,
                        )
                    })?;
                Ok(new_port)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "registered port";
            "switch" => switch_name, "port" => port_name);
        Ok(new_port)
    }

    /// Deletes a port. Blocked while a nic is connected to it.
    pub fn port_delete(
        &self,
        opctx: &OpContext,
        switch_name: &str,
        port_name: &str,
    ) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let s = switch_by_name(tx, switch_name)?;
            let p = port_on_switch(tx, &s, port_name)?;
            let connected: i64 = nic::table
                .filter(nic::port_id.eq(p.id))
                .count()
                .get_result(tx)?;
            if connected > 0 {
                return Err(
                    Error::blocked("port is connected to a nic").into()
                );
            }
            diesel::delete(port::table.filter(port::id.eq(p.id)))
                .execute(tx)?;
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted port";
            "switch" => switch_name, "port" => port_name);
        Ok(())
    }

    /// Records that a cable connects a port to a nic. Both sides must be
    /// unoccupied.
    pub fn port_connect_nic(
        &self,
        opctx: &OpContext,
        switch_name: &str,
        port_name: &str,
        node_name: &str,
        nic_name: &str,
    ) -> UpdateResult<Nic> {
        let mut conn = self.conn();
        let updated = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let s = switch_by_name(tx, switch_name)?;
                let p = port_on_switch(tx, &s, port_name)?;
                let n = node_by_name(tx, node_name)?;
                let mut target = nic_on_node(tx, &n, nic_name)?;
                if target.port_id.is_some() {
                    return Err(Error::already_exists(
                        ResourceType::Nic,
                        nic_name,
                    )
                    .into());
                }
                let occupied: i64 = nic::table
                    .filter(nic::port_id.eq(p.id))
                    .count()
                    .get_result(tx)?;
                if occupied > 0 {
                    return Err(Error::already_exists(
                        ResourceType::Port,
                        port_name,
                    )
                    .into());
                }
                diesel::update(nic::table.filter(nic::id.eq(target.id)))
                    .set(nic::port_id.eq(Some(p.id)))
                    .execute(tx)?;
                target.port_id = Some(p.id);
                Ok(target)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "connected port to nic";
            "switch" => switch_name, "port" => port_name,
            "node" => node_name, "nic" => nic_name);
        Ok(updated)
    }

    /// Removes the recorded cabling of a port.
    pub fn port_detach_nic(
        &self,
        opctx: &OpContext,
        switch_name: &str,
        port_name: &str,
    ) -> UpdateResult<Nic> {
        let mut conn = self.conn();
        let updated = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let s = switch_by_name(tx, switch_name)?;
                let p = port_on_switch(tx, &s, port_name)?;
                let attached = nic::table
                    .filter(nic::port_id.eq(p.id))
                    .first::<Nic>(tx)
                    .optional()?;
                let mut target = attached.ok_or_else(|| {
                    LookupType::ByCompositeName(format!(
                        "nic connected to port \"{}\"",
                        port_name
                    ))
                    .into_not_found(ResourceType::Nic)
                })?;
                diesel::update(nic::table.filter(nic::id.eq(target.id)))
                    .set(nic::port_id.eq(None::<DbUuid>))
                    .execute(tx)?;
                target.port_id = None;
                Ok(target)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "detached port from nic";
            "switch" => switch_name, "port" => port_name);
        Ok(updated)
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
            host: "10.0.0.3".to_string(),
            user: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn switch_and_port_lifecycle() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.switch_register(&opctx, "sw0", "vlan-stub").unwrap();
        ds.port_register(&opctx, "sw0", "gi1/0/1").unwrap();

        // Port names are per-switch, so the same name elsewhere is fine.
        ds.switch_register(&opctx, "sw1", "vlan-stub").unwrap();
        ds.port_register(&opctx, "sw1", "gi1/0/1").unwrap();
        let err = ds.port_register(&opctx, "sw0", "gi1/0/1").unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        let err = ds.switch_delete(&opctx, "sw0").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));
        ds.port_delete(&opctx, "sw0", "gi1/0/1").unwrap();
        ds.switch_delete(&opctx, "sw0").unwrap();
    }

    #[test]
    fn cabling() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.switch_register(&opctx, "sw0", "vlan-stub").unwrap();
        ds.port_register(&opctx, "sw0", "gi1/0/1").unwrap();
        ds.port_register(&opctx, "sw0", "gi1/0/2").unwrap();
        ds.node_register(&opctx, "n1", &obm()).unwrap();
        ds.nic_register(&opctx, "n1", "eth0", "de:ad:be:ef:00:01").unwrap();
        ds.nic_register(&opctx, "n1", "eth1", "de:ad:be:ef:00:02").unwrap();

        ds.port_connect_nic(&opctx, "sw0", "gi1/0/1", "n1", "eth0").unwrap();

        // Both sides of the pairing are exclusive.
        let err = ds
            .port_connect_nic(&opctx, "sw0", "gi1/0/2", "n1", "eth0")
            .unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));
        let err = ds
            .port_connect_nic(&opctx, "sw0", "gi1/0/1", "n1", "eth1")
            .unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        // An occupied port cannot be deleted.
        let err = ds.port_delete(&opctx, "sw0", "gi1/0/1").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));

        let nic = ds.port_detach_nic(&opctx, "sw0", "gi1/0/1").unwrap();
        assert!(nic.port_id.is_none());
        let err = ds.port_detach_nic(&opctx, "sw0", "gi1/0/1").unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { .. }));
    }
}
