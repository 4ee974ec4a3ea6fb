// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios driving the Controller with in-memory drivers

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use camino_tempfile::Utf8TempDir;
use slog::{o, Discard, Logger};

use rackd::app::Controller;
use rackd::config::{
    ConsoleConfig, DatabaseConfig, RackdConfig, ReconcilerConfig,
    SwitchConfig, VlanConfig,
};
use rackd::drivers::ipmi::IPMI_TAG;
use rackd::drivers::mock::{MockObm, MockSwitch, MOCK_TAG};
use rackd::drivers::vlan::VlanPool;
use rackd::drivers::ObmRegistry;
use rackd_common::Error;
use rackd_db::models::ObmCredentials;

struct TestRack {
    controller: Controller,
    switch: Arc<MockSwitch>,
    obm: Arc<MockObm>,
    // Holds the database file for the Controller's lifetime.
    _tempdir: Arc<Utf8TempDir>,
}

fn test_config(db_path: Utf8PathBuf, vlan_ranges: &str) -> RackdConfig {
    RackdConfig {
        database: DatabaseConfig { path: db_path },
        switch: SwitchConfig { driver: MOCK_TAG.to_string() },
        vlan: VlanConfig { ranges: vlan_ranges.to_string() },
        reconciler: ReconcilerConfig {
            period_secs: 3600,
            failure_backoff_secs: Some(0),
            max_backoff_secs: 60,
        },
        console: ConsoleConfig::default(),
    }
}

fn start_rack_with_vlans(
    tempdir: Arc<Utf8TempDir>,
    vlan_ranges: &str,
) -> TestRack {
    let log = Logger::root(Discard, o!());
    let config = test_config(tempdir.path().join("rackd.db"), vlan_ranges);
    let switch =
        Arc::new(MockSwitch::new(VlanPool::parse(&config.vlan.ranges).unwrap()));
    let obm = Arc::new(MockObm::new());
    let mut registry = ObmRegistry::new();
    registry.register(obm.clone());
    let controller = Controller::start_with_drivers(
        &config,
        &log,
        switch.clone(),
        registry,
    )
    .unwrap();
    TestRack { controller, switch, obm, _tempdir: tempdir }
}

fn start_rack(tempdir: Arc<Utf8TempDir>) -> TestRack {
    start_rack_with_vlans(tempdir, "100-110")
}

fn rack() -> TestRack {
    start_rack(Arc::new(camino_tempfile::tempdir().unwrap()))
}

fn obm_creds() -> ObmCredentials {
    ObmCredentials {
        obm_type: MOCK_TAG.to_string(),
        host: "10.0.0.5".to_string(),
        user: "admin".to_string(),
        password: "secret".to_string(),
    }
}

/// Sets up one project with one node whose nic "eth0" is cabled to port
/// "gi1/0/1" of switch "sw0".
fn provision_node(rack: &TestRack) {
    let c = &rack.controller;
    c.project_create("acme").unwrap();
    c.node_register("n1", &obm_creds()).unwrap();
    c.nic_register("n1", "eth0", "de:ad:be:ef:00:01").unwrap();
    c.switch_register("sw0", MOCK_TAG).unwrap();
    c.port_register("sw0", "gi1/0/1").unwrap();
    c.port_connect_nic("sw0", "gi1/0/1", "n1", "eth0").unwrap();
    c.project_connect_node("acme", "n1").unwrap();
}

async fn wait_for_drain(controller: &Controller) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if controller.networking_queue_depth().unwrap() == 0 {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("networking journal did not drain");
        }
        controller.activate_switch_sync();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn port_map(
    entries: &[(&str, Option<&str>)],
) -> BTreeMap<String, Option<String>> {
    entries
        .iter()
        .map(|(port, id)| (port.to_string(), id.map(str::to_owned)))
        .collect()
}

#[tokio::test]
async fn attach_and_detach_are_realized() {
    let rack = rack();
    provision_node(&rack);
    let c = &rack.controller;

    let net = c.network_create_for_project("acme", "acme-net").unwrap();
    assert_eq!(net.provider_id, "100");

    c.nic_connect_network("n1", "eth0", "acme-net").unwrap();
    wait_for_drain(c).await;
    assert_eq!(
        rack.switch.last_applied(),
        Some(port_map(&[("gi1/0/1", Some("100"))]))
    );

    c.nic_detach_network("n1", "eth0").unwrap();
    wait_for_drain(c).await;
    assert_eq!(
        rack.switch.last_applied(),
        Some(port_map(&[("gi1/0/1", None)]))
    );

    // The network is now unreferenced and can be deleted.
    c.network_delete("acme-net").unwrap();
}

#[tokio::test]
async fn superseded_changes_apply_only_the_final_state() {
    let rack = rack();
    provision_node(&rack);
    let c = &rack.controller;
    c.network_create_for_project("acme", "acme-net").unwrap();

    // Hold the switch down so both changes queue up before any apply.
    rack.switch.set_fail(true);
    c.nic_connect_network("n1", "eth0", "acme-net").unwrap();
    c.nic_detach_network("n1", "eth0").unwrap();
    assert_eq!(c.networking_queue_depth().unwrap(), 1);

    // Let any in-flight (failing) activation finish before recovery.
    tokio::time::sleep(Duration::from_millis(100)).await;
    rack.switch.set_fail(false);
    wait_for_drain(c).await;

    // The connect never reached the hardware; only the end state did.
    assert_eq!(
        rack.switch.applied(),
        vec![port_map(&[("gi1/0/1", None)])]
    );
}

#[tokio::test]
async fn failed_applies_stay_queued_until_the_switch_recovers() {
    let rack = rack();
    provision_node(&rack);
    let c = &rack.controller;
    c.network_create_for_project("acme", "acme-net").unwrap();

    rack.switch.set_fail(true);
    c.nic_connect_network("n1", "eth0", "acme-net").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(c.networking_queue_depth().unwrap(), 1);
    assert!(rack.switch.applied().is_empty());

    rack.switch.set_fail(false);
    wait_for_drain(c).await;
    assert_eq!(
        rack.switch.last_applied(),
        Some(port_map(&[("gi1/0/1", Some("100"))]))
    );
}

#[tokio::test]
async fn portless_nic_changes_converge_without_touching_hardware() {
    let rack = rack();
    let c = &rack.controller;
    c.project_create("acme").unwrap();
    c.node_register("n1", &obm_creds()).unwrap();
    c.nic_register("n1", "eth0", "de:ad:be:ef:00:01").unwrap();
    c.project_connect_node("acme", "n1").unwrap();
    c.network_create_for_project("acme", "acme-net").unwrap();

    c.nic_connect_network("n1", "eth0", "acme-net").unwrap();
    wait_for_drain(c).await;
    assert!(rack.switch.applied().is_empty());

    // The desired state is still recorded on the nic.
    let err = c
        .nic_connect_network("n1", "eth0", "acme-net")
        .unwrap_err();
    assert!(matches!(err, Error::ObjectAlreadyExists { .. }));
}

#[tokio::test]
async fn queued_changes_survive_a_restart() {
    let tempdir = Arc::new(camino_tempfile::tempdir().unwrap());
    let rack = start_rack(Arc::clone(&tempdir));
    provision_node(&rack);
    let c = &rack.controller;
    c.network_create_for_project("acme", "acme-net").unwrap();

    rack.switch.set_fail(true);
    c.nic_connect_network("n1", "eth0", "acme-net").unwrap();
    assert_eq!(c.networking_queue_depth().unwrap(), 1);
    assert!(rack.switch.applied().is_empty());
    drop(rack);

    // A fresh Controller over the same database picks the entry up.
    let rack = start_rack(tempdir);
    wait_for_drain(&rack.controller).await;
    assert_eq!(
        rack.switch.last_applied(),
        Some(port_map(&[("gi1/0/1", Some("100"))]))
    );
}

#[tokio::test]
async fn network_ids_are_allocated_and_reused() {
    let rack = rack();
    let c = &rack.controller;
    c.project_create("acme").unwrap();

    let a = c.network_create_for_project("acme", "net-a").unwrap();
    let b = c.network_create_for_project("acme", "net-b").unwrap();
    assert_eq!(a.provider_id, "100");
    assert_eq!(b.provider_id, "101");

    // Deleting a network returns its identifier to the pool.
    c.network_delete("net-a").unwrap();
    let a2 = c.network_create_for_project("acme", "net-a2").unwrap();
    assert_eq!(a2.provider_id, "100");

    // Admin-assigned identifiers are skipped by the allocator.
    c.network_create_admin("mgmt", None, Some("102")).unwrap();
    let d = c.network_create_for_project("acme", "net-d").unwrap();
    assert_eq!(d.provider_id, "103");
}

#[tokio::test]
async fn vlan_pool_exhaustion_and_recovery() {
    let rack = start_rack_with_vlans(
        Arc::new(camino_tempfile::tempdir().unwrap()),
        "100-102",
    );
    let c = &rack.controller;
    c.project_create("acme").unwrap();

    let a = c.network_create_for_project("acme", "net-a").unwrap();
    let b = c.network_create_for_project("acme", "net-b").unwrap();
    let d = c.network_create_for_project("acme", "net-c").unwrap();
    assert_eq!(
        (a.provider_id.as_str(), b.provider_id.as_str(), d.provider_id.as_str()),
        ("100", "101", "102")
    );

    // The pool is exhausted; nothing was created for the failed request.
    let err = c.network_create_for_project("acme", "net-d").unwrap_err();
    assert!(matches!(err, Error::InsufficientCapacity { .. }));
    assert!(matches!(
        c.network_lookup("net-d").unwrap_err(),
        Error::ObjectNotFound { .. }
    ));

    // Deleting a network frees its tag; the retry succeeds with it.
    c.network_delete("net-b").unwrap();
    let d = c.network_create_for_project("acme", "net-d").unwrap();
    assert_eq!(d.provider_id, "101");
}

#[tokio::test]
async fn deployed_obm_registry_has_no_mock_driver() {
    let tempdir = camino_tempfile::tempdir().unwrap();
    let config = test_config(tempdir.path().join("rackd.db"), "100-110");
    let log = Logger::root(Discard, o!());
    let controller = Controller::start(&config, &log).unwrap();

    // Only hardware-backed OBM types are accepted outside of tests.
    let err = controller.node_register("n1", &obm_creds()).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    let mut ipmi = obm_creds();
    ipmi.obm_type = IPMI_TAG.to_string();
    controller.node_register("n1", &ipmi).unwrap();
}

#[tokio::test]
async fn switch_registration_requires_the_configured_driver() {
    let rack = rack();
    let err = rack
        .controller
        .switch_register("sw0", "vlan-stub")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));
    rack.controller.switch_register("sw0", MOCK_TAG).unwrap();
}

#[tokio::test]
async fn obm_operations_reach_the_node_driver() {
    let rack = rack();
    let c = &rack.controller;
    c.node_register("n1", &obm_creds()).unwrap();

    // A node whose OBM type no driver claims cannot be registered.
    let mut bad = obm_creds();
    bad.obm_type = "redfish".to_string();
    let err = c.node_register("n2", &bad).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    c.node_power_cycle("n1").unwrap();
    c.node_console_start("n1").unwrap();
    let console = c.node_console_show("n1").unwrap();
    assert!(console.contains("n1"));
    c.node_console_stop("n1").unwrap();
    c.node_console_delete("n1").unwrap();
    c.node_power_off("n1").unwrap();

    let err = c.node_console_show("n1").unwrap_err();
    assert!(matches!(err, Error::ServiceUnavailable { .. }));

    assert_eq!(
        rack.obm.ops(),
        vec![
            "power_cycle n1",
            "console_start n1",
            "console_stop n1",
            "console_delete n1",
            "power_off n1",
        ]
    );

    let err = c.node_power_cycle("ghost").unwrap_err();
    assert!(matches!(err, Error::ObjectNotFound { .. }));
}
