// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primary control plane interface for database read and write operations
//!
//! Every mutation of the resource graph goes through one of the operations
//! defined on [`DataStore`].  Multi-step operations run inside
//! `immediate_transaction`, so each one either fully happens or leaves no
//! trace, and the graph invariants are checked against the state the
//! transaction actually sees.

use std::sync::Mutex;
use std::sync::MutexGuard;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::SqliteConnection;
use slog::{info, o, Logger};

use rackd_common::{Error, LookupType, ResourceType};

use crate::error::public_error_from_diesel;
use crate::models::{Headnode, Hnic, Network, Nic, Node, Port, Project, Switch};
use crate::schema;

mod headnode;
mod network;
mod networking;
mod node;
mod project;
mod switch;

pub use network::NetworkAccess;
pub use network::NetworkOwner;
pub use networking::PendingAction;

pub struct DataStore {
    log: Logger,
    conn: Mutex<SqliteConnection>,
}

impl DataStore {
    /// Opens (creating if necessary) the database at `path` and applies the
    /// schema.
    ///
    /// `path` may be `":memory:"` for an ephemeral store.
    pub fn open(log: &Logger, path: &str) -> Result<DataStore, Error> {
        let schema = include_str!("../schema.sql");
        let log = log.new(o!("component" => "DataStore"));
        info!(log, "opening database"; "path" => path);
        let mut conn = SqliteConnection::establish(path).map_err(|err| {
            Error::unavail(&format!(
                "failed to open database {:?}: {}",
                path, err
            ))
        })?;

        // Enable foreign key processing, which is off by default. Without
        // enabling this, there is no referential integrity check between
        // primary and foreign keys in tables.
        diesel::sql_query("PRAGMA foreign_keys = 'ON'")
            .execute(&mut conn)
            .map_err(db_setup_error)?;

        // Enable the WAL.
        diesel::sql_query("PRAGMA journal_mode = 'WAL'")
            .execute(&mut conn)
            .map_err(db_setup_error)?;

        // Sync to disk after every commit.
        diesel::sql_query("PRAGMA synchronous = 'FULL'")
            .execute(&mut conn)
            .map_err(db_setup_error)?;

        // Create tables
        conn.batch_execute(schema).map_err(db_setup_error)?;

        Ok(DataStore { log, conn: Mutex::new(conn) })
    }

    /// Returns the store's connection, serializing concurrent callers.
    fn conn(&self) -> MutexGuard<'_, SqliteConnection> {
        // Poisoning requires a panic while holding the lock; we build with
        // panic=abort, so a poisoned lock is unreachable.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn db_setup_error(err: DieselError) -> Error {
    Error::internal_error(&format!("database setup failed: {}", err))
}

// Lookup helpers shared by the operation modules. These run on whatever
// connection the caller holds, typically inside a transaction.

pub(crate) fn project_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Project, Error> {
    use schema::project::dsl;
    dsl::project.filter(dsl::name.eq(name)).first::<Project>(conn).map_err(
        |e| {
            public_error_from_diesel(
                e,
                ResourceType::Project,
                LookupType::from(name),
            )
        },
    )
}

pub(crate) fn node_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Node, Error> {
    use schema::node::dsl;
    dsl::node.filter(dsl::name.eq(name)).first::<Node>(conn).map_err(|e| {
        public_error_from_diesel(e, ResourceType::Node, LookupType::from(name))
    })
}

pub(crate) fn switch_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Switch, Error> {
    use schema::switch::dsl;
    dsl::switch.filter(dsl::name.eq(name)).first::<Switch>(conn).map_err(
        |e| {
            public_error_from_diesel(
                e,
                ResourceType::Switch,
                LookupType::from(name),
            )
        },
    )
}

pub(crate) fn network_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Network, Error> {
    use schema::network::dsl;
    dsl::network.filter(dsl::name.eq(name)).first::<Network>(conn).map_err(
        |e| {
            public_error_from_diesel(
                e,
                ResourceType::Network,
                LookupType::from(name),
            )
        },
    )
}

pub(crate) fn headnode_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Headnode, Error> {
    use schema::headnode::dsl;
    dsl::headnode.filter(dsl::name.eq(name)).first::<Headnode>(conn).map_err(
        |e| {
            public_error_from_diesel(
                e,
                ResourceType::Headnode,
                LookupType::from(name),
            )
        },
    )
}

pub(crate) fn nic_on_node(
    conn: &mut SqliteConnection,
    node: &Node,
    nic_name: &str,
) -> Result<Nic, Error> {
    use schema::nic::dsl;
    dsl::nic
        .filter(dsl::node_id.eq(node.id))
        .filter(dsl::name.eq(nic_name))
        .first::<Nic>(conn)
        .map_err(|e| match e {
            DieselError::NotFound => Error::not_found_in_owner(
                ResourceType::Nic,
                nic_name,
                ResourceType::Node,
                &node.name,
            ),
            e => public_error_from_diesel(
                e,
                ResourceType::Nic,
                LookupType::from(nic_name),
            ),
        })
}

pub(crate) fn port_on_switch(
    conn: &mut SqliteConnection,
    switch: &Switch,
    port_name: &str,
) -> Result<Port, Error> {
    use schema::port::dsl;
    dsl::port
        .filter(dsl::switch_id.eq(switch.id))
        .filter(dsl::name.eq(port_name))
        .first::<Port>(conn)
        .map_err(|e| match e {
            DieselError::NotFound => Error::not_found_in_owner(
                ResourceType::Port,
                port_name,
                ResourceType::Switch,
                &switch.name,
            ),
            e => public_error_from_diesel(
                e,
                ResourceType::Port,
                LookupType::from(port_name),
            ),
        })
}

pub(crate) fn hnic_on_headnode(
    conn: &mut SqliteConnection,
    headnode: &Headnode,
    hnic_name: &str,
) -> Result<Hnic, Error> {
    use schema::hnic::dsl;
    dsl::hnic
        .filter(dsl::headnode_id.eq(headnode.id))
        .filter(dsl::name.eq(hnic_name))
        .first::<Hnic>(conn)
        .map_err(|e| match e {
            DieselError::NotFound => Error::not_found_in_owner(
                ResourceType::Hnic,
                hnic_name,
                ResourceType::Headnode,
                &headnode.name,
            ),
            e => public_error_from_diesel(
                e,
                ResourceType::Hnic,
                LookupType::from(hnic_name),
            ),
        })
}
