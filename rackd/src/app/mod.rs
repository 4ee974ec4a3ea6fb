// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The rackd application: wires the datastore, drivers, and background
//! tasks together and exposes the control plane's operations

use std::sync::Arc;

use rackd_common::Error;
use rackd_db::{DataStore, OpContext};
use slog::{info, o, Logger};

use crate::background::tasks::switch_sync::SwitchSync;
use crate::background::{Driver, TaskHandle, TaskStatus};
use crate::config::RackdConfig;
use crate::drivers::ipmi::IpmiObm;
use crate::drivers::{switch_driver_from_config, ObmRegistry, SwitchDriver};

mod headnode;
mod network;
mod networking;
mod node;
mod project;
mod switch;

/// A running rackd control plane.
///
/// Dropping the Controller aborts the background tasks; the datastore's
/// transactional guarantees make that safe at any point.
pub struct Controller {
    log: Logger,
    datastore: Arc<DataStore>,
    switch_driver: Arc<dyn SwitchDriver>,
    obm_registry: ObmRegistry,
    driver: Driver,
    switch_sync: TaskHandle,
}

impl Controller {
    /// Starts a Controller with the drivers named in the configuration.
    ///
    /// Only hardware-backed OBM drivers are registered here; mocks are
    /// injected through [`Controller::start_with_drivers`].
    pub fn start(
        config: &RackdConfig,
        log: &Logger,
    ) -> Result<Controller, Error> {
        let switch_driver = switch_driver_from_config(config, log)?;
        let mut obm_registry = ObmRegistry::new();
        obm_registry.register(Arc::new(IpmiObm::new(
            config.console.spool_dir.clone(),
            log,
        )));
        Controller::start_with_drivers(
            config,
            log,
            switch_driver,
            obm_registry,
        )
    }

    /// Starts a Controller with explicitly supplied drivers (tests inject
    /// mocks this way).
    pub fn start_with_drivers(
        config: &RackdConfig,
        log: &Logger,
        switch_driver: Arc<dyn SwitchDriver>,
        obm_registry: ObmRegistry,
    ) -> Result<Controller, Error> {
        let log = log.new(o!("component" => "Controller"));
        let datastore =
            Arc::new(DataStore::open(&log, config.database.path.as_str())?);

        let mut driver = Driver::new();
        let task = SwitchSync::new(
            Arc::clone(&datastore),
            Arc::clone(&switch_driver),
            &config.reconciler,
        );
        let switch_sync = driver.register(
            "switch_sync",
            config.reconciler.period(),
            Box::new(task),
            OpContext::for_background(log.clone()),
        );

        info!(log, "controller started";
            "switch_driver" => switch_driver.tag());
        Ok(Controller {
            log,
            datastore,
            switch_driver,
            obm_registry,
            driver,
            switch_sync,
        })
    }

    fn opctx(&self, operation: &'static str) -> OpContext {
        OpContext::for_operation(&self.log, operation)
    }

    /// Kicks the reconciler outside of its periodic schedule.
    pub fn activate_switch_sync(&self) {
        self.driver.activate(&self.switch_sync);
    }

    /// Status of the most recent reconciler activation.
    pub fn switch_sync_status(&self) -> TaskStatus {
        self.driver.status(&self.switch_sync)
    }
}
