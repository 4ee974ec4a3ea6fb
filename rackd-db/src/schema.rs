// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Describes the diesel schema for the rackd database
//!
//! The authoritative DDL lives in `schema.sql`, applied when the store is
//! opened.  Column order here must match the DDL.

use diesel::prelude::*;

table! {
    project (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
    }
}

table! {
    node (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
        project_id -> Nullable<Text>,
        obm_type -> Text,
        obm_host -> Text,
        obm_user -> Text,
        obm_password -> Text,
    }
}

table! {
    switch (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
        driver -> Text,
    }
}

table! {
    port (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
        switch_id -> Text,
    }
}

table! {
    network (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
        owner_project_id -> Nullable<Text>,
        access_project_id -> Nullable<Text>,
        allocated -> Bool,
        provider_id -> Text,
    }
}

table! {
    nic (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
        node_id -> Text,
        mac_addr -> Text,
        port_id -> Nullable<Text>,
        network_id -> Nullable<Text>,
    }
}

table! {
    headnode (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
        project_id -> Text,
        dirty -> Bool,
    }
}

table! {
    hnic (id) {
        id -> Text,
        name -> Text,
        time_created -> Timestamp,
        headnode_id -> Text,
        network_id -> Nullable<Text>,
    }
}

table! {
    networking_action (id) {
        id -> Text,
        time_created -> Timestamp,
        nic_id -> Text,
        new_network_id -> Nullable<Text>,
    }
}

allow_tables_to_appear_in_same_query!(
    project,
    node,
    switch,
    port,
    network,
    nic,
    headnode,
    hnic,
    networking_action,
);
