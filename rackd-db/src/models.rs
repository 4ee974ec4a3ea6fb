// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Row model types for the rackd database
//!
//! Field order matches the `table!` declarations in [`crate::schema`], which
//! in turn match `schema.sql`.

use chrono::NaiveDateTime;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::*;
use crate::types::DbUuid;

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// A tenant: the unit of isolation and resource ownership.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = project)]
pub struct Project {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Project { id: DbUuid::new_v4(), name: name.to_owned(), time_created: now() }
    }
}

/// Out-of-band management coordinates supplied when a node is registered.
#[derive(Clone, Debug)]
pub struct ObmCredentials {
    /// type tag resolved against the OBM driver registry
    pub obm_type: String,
    pub host: String,
    pub user: String,
    pub password: String,
}

/// A physical machine, allocatable to at most one project at a time.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = node)]
pub struct Node {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
    pub project_id: Option<DbUuid>,
    pub obm_type: String,
    pub obm_host: String,
    pub obm_user: String,
    pub obm_password: String,
}

impl Node {
    pub fn new(name: &str, obm: &ObmCredentials) -> Self {
        Node {
            id: DbUuid::new_v4(),
            name: name.to_owned(),
            time_created: now(),
            project_id: None,
            obm_type: obm.obm_type.clone(),
            obm_host: obm.host.clone(),
            obm_user: obm.user.clone(),
            obm_password: obm.password.clone(),
        }
    }
}

/// A managed switch; `driver` names the switch driver that realizes
/// networking on it.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = switch)]
pub struct Switch {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
    pub driver: String,
}

impl Switch {
    pub fn new(name: &str, driver: &str) -> Self {
        Switch {
            id: DbUuid::new_v4(),
            name: name.to_owned(),
            time_created: now(),
            driver: driver.to_owned(),
        }
    }
}

/// A physical switch port. The nic side of the 1:1 pairing lives on
/// `nic.port_id`.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = port)]
pub struct Port {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
    pub switch_id: DbUuid,
}

impl Port {
    pub fn new(switch_id: DbUuid, name: &str) -> Self {
        Port {
            id: DbUuid::new_v4(),
            name: name.to_owned(),
            time_created: now(),
            switch_id,
        }
    }
}

/// An isolated link-layer network.
///
/// `provider_id` is the driver-meaningful identifier realized on the
/// hardware; `allocated` records whether it was issued by the allocator
/// (and must be returned to the pool on deletion) or assigned by an
/// administrator.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = network)]
pub struct Network {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
    /// project that created the network; None for admin-created networks
    pub owner_project_id: Option<DbUuid>,
    /// project allowed to attach nodes; None means public
    pub access_project_id: Option<DbUuid>,
    pub allocated: bool,
    pub provider_id: String,
}

impl Network {
    pub fn new(
        name: &str,
        owner_project_id: Option<DbUuid>,
        access_project_id: Option<DbUuid>,
        allocated: bool,
        provider_id: &str,
    ) -> Self {
        Network {
            id: DbUuid::new_v4(),
            name: name.to_owned(),
            time_created: now(),
            owner_project_id,
            access_project_id,
            allocated,
            provider_id: provider_id.to_owned(),
        }
    }
}

/// A node's network interface.
///
/// `network_id` is desired state: it is recorded synchronously by
/// connect/detach and realized asynchronously by the reconciler.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = nic)]
pub struct Nic {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
    pub node_id: DbUuid,
    pub mac_addr: String,
    pub port_id: Option<DbUuid>,
    pub network_id: Option<DbUuid>,
}

impl Nic {
    pub fn new(node_id: DbUuid, name: &str, mac_addr: &str) -> Self {
        Nic {
            id: DbUuid::new_v4(),
            name: name.to_owned(),
            time_created: now(),
            node_id,
            mac_addr: mac_addr.to_owned(),
            port_id: None,
            network_id: None,
        }
    }
}

/// A project's administrative VM. Created dirty; starting it freezes its
/// definition (nics may no longer be edited).
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = headnode)]
pub struct Headnode {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
    pub project_id: DbUuid,
    pub dirty: bool,
}

impl Headnode {
    pub fn new(project_id: DbUuid, name: &str) -> Self {
        Headnode {
            id: DbUuid::new_v4(),
            name: name.to_owned(),
            time_created: now(),
            project_id,
            dirty: true,
        }
    }
}

/// A headnode's virtual interface. Not journaled: it is realized when the
/// headnode VM is defined, not by the switch reconciler.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = hnic)]
pub struct Hnic {
    pub id: DbUuid,
    pub name: String,
    pub time_created: NaiveDateTime,
    pub headnode_id: DbUuid,
    pub network_id: Option<DbUuid>,
}

impl Hnic {
    pub fn new(headnode_id: DbUuid, name: &str) -> Self {
        Hnic {
            id: DbUuid::new_v4(),
            name: name.to_owned(),
            time_created: now(),
            headnode_id,
            network_id: None,
        }
    }
}

/// One pending journal entry: "make this nic's connectivity match
/// `new_network_id`" (None means detach).
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[diesel(table_name = networking_action)]
pub struct NetworkingAction {
    pub id: DbUuid,
    pub time_created: NaiveDateTime,
    pub nic_id: DbUuid,
    pub new_network_id: Option<DbUuid>,
}

impl NetworkingAction {
    pub fn new(nic_id: DbUuid, new_network_id: Option<DbUuid>) -> Self {
        NetworkingAction {
            id: DbUuid::new_v4(),
            time_created: now(),
            nic_id,
            new_network_id,
        }
    }
}
