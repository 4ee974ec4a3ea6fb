// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods on nic connectivity and the networking journal
//!
//! Connect/detach record the desired state on the nic row and enqueue a
//! journal entry in the same transaction.  The journal holds at most one
//! pending entry per nic: enqueueing deletes any entry the new one
//! supersedes, so the reconciler only ever sees the latest intent.

use diesel::prelude::*;
use diesel::SqliteConnection;
use slog::{debug, info};

use rackd_common::{
    DeleteResult, Error, ListResultVec, LookupType, ResourceType,
    UpdateResult,
};

use super::{network_by_name, nic_on_node, node_by_name, DataStore};
use crate::context::OpContext;
use crate::error::{public_error_from_diesel, TxnError};
use crate::models::{NetworkingAction, Nic};
use crate::schema::{network, networking_action, nic, node, port};
use crate::types::DbUuid;

/// A journal entry resolved into the terms the reconciler works in.
#[derive(Clone, Debug)]
pub struct PendingAction {
    /// journal entry id, passed back to `networking_commit_batch`
    pub id: DbUuid,
    /// "node/nic", for logging
    pub nic_label: String,
    /// label of the port the nic is cabled to, if any
    pub port_name: Option<String>,
    /// provider identifier to realize; None means detach
    pub new_provider_id: Option<String>,
}

/// Supersede any pending entry for this nic with a new one.
///
/// Runs inside the caller's transaction.
fn enqueue(
    tx: &mut SqliteConnection,
    nic_id: DbUuid,
    new_network_id: Option<DbUuid>,
) -> Result<(), diesel::result::Error> {
    diesel::delete(
        networking_action::table.filter(networking_action::nic_id.eq(nic_id)),
    )
    .execute(tx)?;
    diesel::insert_into(networking_action::table)
        .values(&NetworkingAction::new(nic_id, new_network_id))
        .execute(tx)?;
    Ok(())
}

impl DataStore {
    /// Records the intent to connect a nic to a network and journals it.
    ///
    /// Never touches hardware; the reconciler realizes the change.
    pub fn nic_connect_network(
        &self,
        opctx: &OpContext,
        node_name: &str,
        nic_name: &str,
        network_name: &str,
    ) -> UpdateResult<Nic> {
        let mut conn = self.conn();
        let updated = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let n = node_by_name(tx, node_name)?;
                let mut target = nic_on_node(tx, &n, nic_name)?;
                let net = network_by_name(tx, network_name)?;
                let project_id = n.project_id.ok_or_else(|| {
                    Error::project_mismatch("node is not in any project")
                })?;
                if let Some(access_id) = net.access_project_id {
                    if access_id != project_id {
                        return Err(Error::project_mismatch(
                            "node and network are in different projects",
                        )
                        .into());
                    }
                }
                if target.network_id.is_some() {
                    return Err(Error::already_exists(
                        ResourceType::Nic,
                        &format!(
                            "nic \"{}\" on node \"{}\" is already attached \
                             to a network",
                            nic_name, node_name
                        ),
                    )
                    .into());
                }
                diesel::update(nic::table.filter(nic::id.eq(target.id)))
                    .set(nic::network_id.eq(Some(net.id)))
                    .execute(tx)?;
                enqueue(tx, target.id, Some(net.id))?;
                target.network_id = Some(net.id);
                Ok(target)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "connected nic to network";
            "node" => node_name, "nic" => nic_name,
            "network" => network_name);
        Ok(updated)
    }

    /// Records the intent to detach a nic from its network and journals it.
    pub fn nic_detach_network(
        &self,
        opctx: &OpContext,
        node_name: &str,
        nic_name: &str,
    ) -> UpdateResult<Nic> {
        let mut conn = self.conn();
        let updated = conn
            .immediate_transaction::<_, TxnError, _>(|tx| {
                let n = node_by_name(tx, node_name)?;
                let mut target = nic_on_node(tx, &n, nic_name)?;
                if n.project_id.is_none() {
                    return Err(Error::project_mismatch(
                        "node is not in any project",
                    )
                    .into());
                }
                if target.network_id.is_none() {
                    return Err(LookupType::ByCompositeName(format!(
                        "network attached to nic \"{}\" on node \"{}\"",
                        nic_name, node_name
                    ))
                    .into_not_found(ResourceType::Network)
                    .into());
                }
                diesel::update(nic::table.filter(nic::id.eq(target.id)))
                    .set(nic::network_id.eq(None::<DbUuid>))
                    .execute(tx)?;
                enqueue(tx, target.id, None)?;
                target.network_id = None;
                Ok(target)
            })
            .map_err(Error::from)?;
        info!(opctx.log, "detached nic from network";
            "node" => node_name, "nic" => nic_name);
        Ok(updated)
    }

    /// Returns every pending journal entry, oldest first, resolved into the
    /// terms the switch driver works in.
    ///
    /// Resolution runs in one transaction, so the batch is a consistent
    /// snapshot of the journal.
    pub fn networking_pending_batch(
        &self,
        _opctx: &OpContext,
    ) -> ListResultVec<PendingAction> {
        let mut conn = self.conn();
        let batch = conn.immediate_transaction::<_, TxnError, _>(|tx| {
            let actions: Vec<NetworkingAction> = networking_action::table
                .order(networking_action::time_created.asc())
                .load(tx)?;
            let mut batch = Vec::with_capacity(actions.len());
            for action in actions {
                let target: Nic = nic::table
                    .filter(nic::id.eq(action.nic_id))
                    .first(tx)
                    .map_err(|e| {
                        public_error_from_diesel(
                            e,
                            ResourceType::Nic,
                            LookupType::ById(action.nic_id.0),
                        )
                    })?;
                let owner: String = node::table
                    .filter(node::id.eq(target.node_id))
                    .select(node::name)
                    .first(tx)?;
                let port_name = match target.port_id {
                    Some(port_id) => Some(
                        port::table
                            .filter(port::id.eq(port_id))
                            .select(port::name)
                            .first::<String>(tx)?,
                    ),
                    None => None,
                };
                let new_provider_id = match action.new_network_id {
                    Some(network_id) => Some(
                        network::table
                            .filter(network::id.eq(network_id))
                            .select(network::provider_id)
                            .first::<String>(tx)?,
                    ),
                    None => None,
                };
                batch.push(PendingAction {
                    id: action.id,
                    nic_label: format!("{}/{}", owner, target.name),
                    port_name,
                    new_provider_id,
                });
            }
            Ok(batch)
        })
        .map_err(Error::from)?;
        debug!(self.log, "resolved pending networking batch";
            "entries" => batch.len());
        Ok(batch)
    }

    /// Deletes exactly the given journal entries, after a successful apply.
    pub fn networking_commit_batch(
        &self,
        opctx: &OpContext,
        ids: &[DbUuid],
    ) -> DeleteResult {
        let mut conn = self.conn();
        let committed = diesel::delete(
            networking_action::table
                .filter(networking_action::id.eq_any(ids)),
        )
        .execute(&mut *conn)
        .map_err(|e| {
            Error::internal_error(&format!(
                "committing networking batch: {}",
                e
            ))
        })?;
        info!(opctx.log, "committed networking batch";
            "entries" => committed);
        Ok(())
    }

    /// Number of journal entries not yet realized on the hardware.
    pub fn networking_queue_depth(
        &self,
        _opctx: &OpContext,
    ) -> Result<usize, Error> {
        let mut conn = self.conn();
        let depth: i64 = networking_action::table
            .count()
            .get_result(&mut *conn)
            .map_err(|e| {
                Error::internal_error(&format!(
                    "counting networking queue: {}",
                    e
                ))
            })?;
        Ok(depth as usize)
    }
}
