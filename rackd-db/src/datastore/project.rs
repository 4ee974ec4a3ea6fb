// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods on projects

use diesel::prelude::*;
use slog::info;

use rackd_common::{
    CreateResult, DeleteResult, Error, ListResultVec, ResourceType,
    UpdateResult,
};

use super::{node_by_name, project_by_name, DataStore};
use crate::context::OpContext;
use crate::error::{public_error_from_diesel_create, TxnError};
use crate::models::{Network, Node, Project};
use crate::schema::{headnode, network, networking_action, nic, node, project};

impl DataStore {
    pub fn project_create(
        &self,
        opctx: &OpContext,
        name: &str,
    ) -> CreateResult<Project> {
        rackd_common::validate_label(name)?;
        let new_project = Project::new(name);
        let mut conn = self.conn();
        diesel::insert_into(project::table)
            .values(&new_project)
            .execute(&mut *conn)
            .map_err(|e| {
                public_error_from_diesel_create(e, ResourceType::Project, name)
            })?;
        info!(opctx.log, "created project";
            "project" => name, "id" => %new_project.id);
        Ok(new_project)
    }

    /// Deletes a project. Blocked while the project still owns nodes, has
    /// created networks, or has a headnode.
    pub fn project_delete(
        &self,
        opctx: &OpContext,
        name: &str,
    ) -> DeleteResult {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let p = project_by_name(tx, name)?;
            let nodes: i64 = node::table
                .filter(node::project_id.eq(p.id))
                .count()
                .get_result(tx)?;
            if nodes > 0 {
                return Err(Error::blocked("project still has nodes").into());
            }
            let networks: i64 = network::table
                .filter(network::owner_project_id.eq(p.id))
                .count()
                .get_result(tx)?;
            if networks > 0 {
                return Err(
                    Error::blocked("project still has networks").into()
                );
            }
            let headnodes: i64 = headnode::table
                .filter(headnode::project_id.eq(p.id))
                .count()
                .get_result(tx)?;
            if headnodes > 0 {
                return Err(
                    Error::blocked("project still has a headnode").into()
                );
            }
            diesel::delete(project::table.filter(project::id.eq(p.id)))
                .execute(tx)?;
            Ok(())
        })
        .map_err(Error::from)?;
        info!(opctx.log, "deleted project"; "project" => name);
        Ok(())
    }

    pub fn project_list(&self, _opctx: &OpContext) -> ListResultVec<Project> {
        let mut conn = self.conn();
        project::table
            .order(project::name.asc())
            .load::<Project>(&mut *conn)
            .map_err(|e| {
                Error::internal_error(&format!("listing projects: {}", e))
            })
    }

    /// Allocates a free node to a project.
    pub fn project_connect_node(
        &self,
        opctx: &OpContext,
        project_name: &str,
        node_name: &str,
    ) -> UpdateResult<Node> {
        let mut conn = self.conn();
        let node = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let p = project_by_name(tx, project_name)?;
                let mut n = node_by_name(tx, node_name)?;
                match n.project_id {
                    Some(id) if id == p.id => {
                        return Err(Error::already_exists(
                            ResourceType::Node,
                            node_name,
                        )
                        .into());
                    }
                    Some(_) => {
                        return Err(Error::blocked(
                            "node is owned by another project",
                        )
                        .into());
                    }
                    None => (),
                }
                diesel::update(node::table.filter(node::id.eq(n.id)))
                    .set(node::project_id.eq(Some(p.id)))
                    .execute(tx)?;
                n.project_id = Some(p.id);
                Ok(n)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "connected node to project";
            "project" => project_name, "node" => node_name);
        Ok(node)
    }

    /// Releases a node back to the free pool. Blocked while any of the
    /// node's nics is attached to a network or has pending networking
    /// changes.
    pub fn project_detach_node(
        &self,
        opctx: &OpContext,
        project_name: &str,
        node_name: &str,
    ) -> UpdateResult<Node> {
        let mut conn = self.conn();
        let node = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let p = project_by_name(tx, project_name)?;
                let mut n = node_by_name(tx, node_name)?;
                if n.project_id != Some(p.id) {
                    return Err(Error::not_found_in_owner(
                        ResourceType::Node,
                        node_name,
                        ResourceType::Project,
                        project_name,
                    )
                    .into());
                }
                let attached: i64 = nic::table
                    .filter(nic::node_id.eq(n.id))
                    .filter(nic::network_id.is_not_null())
                    .count()
                    .get_result(tx)?;
                if attached > 0 {
                    return Err(Error::blocked(
                        "node is attached to a network",
                    )
                    .into());
                }
                let nic_ids: Vec<crate::types::DbUuid> = nic::table
                    .filter(nic::node_id.eq(n.id))
                    .select(nic::id)
                    .load(tx)?;
                let pending: i64 = networking_action::table
                    .filter(networking_action::nic_id.eq_any(&nic_ids))
                    .count()
                    .get_result(tx)?;
                if pending > 0 {
                    return Err(Error::blocked(
                        "node has networking changes still pending",
                    )
                    .into());
                }
                diesel::update(node::table.filter(node::id.eq(n.id)))
                    .set(node::project_id.eq(None::<crate::types::DbUuid>))
                    .execute(tx)?;
                n.project_id = None;
                Ok(n)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "detached node from project";
            "project" => project_name, "node" => node_name);
        Ok(node)
    }

    pub fn project_nodes_list(
        &self,
        _opctx: &OpContext,
        project_name: &str,
    ) -> ListResultVec<Node> {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let p = project_by_name(tx, project_name)?;
            let nodes = node::table
                .filter(node::project_id.eq(p.id))
                .order(node::name.asc())
                .load::<Node>(tx)?;
            Ok(nodes)
        })
        .map_err(Error::from)
    }

    /// Lists the networks a project created or was granted access to.
    pub fn project_networks_list(
        &self,
        _opctx: &OpContext,
        project_name: &str,
    ) -> ListResultVec<Network> {
        let mut conn = self.conn();
        conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let p = project_by_name(tx, project_name)?;
            let networks = network::table
                .filter(
                    network::owner_project_id
                        .eq(p.id)
                        .or(network::access_project_id.eq(p.id)),
                )
                .order(network::name.asc())
                .load::<Network>(tx)?;
            Ok(networks)
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
            host: "10.0.0.1".to_string(),
            user: "root".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn create_list_delete() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        ds.project_create(&opctx, "initech").unwrap();
        let names: Vec<String> = ds
            .project_list(&opctx)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["acme", "initech"]);

        let err = ds.project_create(&opctx, "acme").unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        ds.project_delete(&opctx, "acme").unwrap();
        let err = ds.project_delete(&opctx, "acme").unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { .. }));
    }

    #[test]
    fn connect_and_detach_node() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        ds.project_create(&opctx, "initech").unwrap();
        ds.node_register(&opctx, "n1", &obm()).unwrap();

        let node = ds.project_connect_node(&opctx, "acme", "n1").unwrap();
        assert!(node.project_id.is_some());

        // Owned nodes cannot be grabbed by another project.
        let err =
            ds.project_connect_node(&opctx, "initech", "n1").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));
        // Re-connecting to the same project is a duplicate.
        let err = ds.project_connect_node(&opctx, "acme", "n1").unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists { .. }));

        // A project with nodes cannot be deleted.
        let err = ds.project_delete(&opctx, "acme").unwrap_err();
        assert!(matches!(err, Error::Blocked { .. }));

        let node = ds.project_detach_node(&opctx, "acme", "n1").unwrap();
        assert!(node.project_id.is_none());
        ds.project_delete(&opctx, "acme").unwrap();
    }

    #[test]
    fn detach_requires_membership() {
        let ds = datastore();
        let opctx = OpContext::for_tests();
        ds.project_create(&opctx, "acme").unwrap();
        ds.node_register(&opctx, "n1", &obm()).unwrap();
        let err = ds.project_detach_node(&opctx, "acme", "n1").unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { .. }));
    }
}
