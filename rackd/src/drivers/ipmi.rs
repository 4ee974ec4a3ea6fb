// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OBM driver speaking IPMI via `ipmitool`

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use camino::Utf8PathBuf;
use slog::{info, o, warn, Logger};

use super::{ObmDriver, ObmError, ObmTarget};

pub const IPMI_TAG: &str = "ipmi";

/// Drives nodes through their IPMI controllers.
///
/// Serial consoles are captured by leaving an `ipmitool sol activate`
/// child running with its output redirected into a per-node spool file.
pub struct IpmiObm {
    spool_dir: Utf8PathBuf,
    log: Logger,
    consoles: Mutex<BTreeMap<String, Child>>,
}

impl IpmiObm {
    pub fn new(spool_dir: Utf8PathBuf, log: &Logger) -> IpmiObm {
        IpmiObm {
            spool_dir,
            log: log.new(o!("obm_driver" => IPMI_TAG)),
            consoles: Mutex::new(BTreeMap::new()),
        }
    }

    fn run(
        &self,
        target: &ObmTarget<'_>,
        args: &[&str],
    ) -> Result<(), ObmError> {
        let command = format!("ipmitool {}", args.join(" "));
        let output = Command::new("ipmitool")
            .args(["-U", target.user, "-P", target.password, "-H", target.host])
            .args(args)
            .output()
            .map_err(|err| ObmError::Exec { command: command.clone(), err })?;
        if !output.status.success() {
            return Err(ObmError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim()
                    .to_string(),
            });
        }
        Ok(())
    }

    fn spool_path(&self, node: &str) -> Utf8PathBuf {
        // Node labels may contain '/'.
        self.spool_dir.join(format!("{}.log", node.replace('/', "_")))
    }

    fn console_running(&self, node: &str) -> bool {
        self.consoles.lock().unwrap().contains_key(node)
    }
}

impl ObmDriver for IpmiObm {
    fn tag(&self) -> &'static str {
        IPMI_TAG
    }

    fn power_cycle(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        // Failing to set the boot device is not fatal.
        if let Err(err) = self.run(target, &["chassis", "bootdev", "pxe"]) {
            warn!(self.log, "failed to set boot device";
                "node" => target.node, "err" => %err);
        }
        // Cycling fails when the machine is off; turn it on instead, so
        // powered-down nodes can still be brought up.
        match self.run(target, &["chassis", "power", "cycle"]) {
            Ok(()) => Ok(()),
            Err(_) => self.run(target, &["chassis", "power", "on"]),
        }
    }

    fn power_off(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        self.run(target, &["chassis", "power", "off"])
    }

    fn console_start(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        let mut consoles = self.consoles.lock().unwrap();
        if consoles.contains_key(target.node) {
            return Ok(());
        }
        std::fs::create_dir_all(&self.spool_dir)?;
        let path = self.spool_path(target.node);
        let spool = OpenOptions::new().create(true).append(true).open(&path)?;
        let child = Command::new("ipmitool")
            .args(["-I", "lanplus"])
            .args(["-U", target.user, "-P", target.password, "-H", target.host])
            .args(["sol", "activate"])
            .stdin(Stdio::null())
            .stdout(Stdio::from(spool.try_clone()?))
            .stderr(Stdio::from(spool))
            .spawn()
            .map_err(|err| ObmError::Exec {
                command: "ipmitool sol activate".to_string(),
                err,
            })?;
        consoles.insert(target.node.to_string(), child);
        info!(self.log, "console started";
            "node" => target.node, "spool" => %path);
        Ok(())
    }

    fn console_stop(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        let child = self.consoles.lock().unwrap().remove(target.node);
        if let Some(mut child) = child {
            child.kill()?;
            let _ = child.wait();
        }
        // Tear down the SOL session on the BMC side too; the session may
        // already be gone, which is fine.
        if let Err(err) = self.run(target, &["sol", "deactivate"]) {
            warn!(self.log, "sol deactivate failed";
                "node" => target.node, "err" => %err);
        }
        Ok(())
    }

    fn console_show(&self, target: &ObmTarget<'_>) -> Result<String, ObmError> {
        let path = self.spool_path(target.node);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ObmError::NoConsole(target.node.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn console_delete(&self, target: &ObmTarget<'_>) -> Result<(), ObmError> {
        if self.console_running(target.node) {
            self.console_stop(target)?;
        }
        match std::fs::remove_file(self.spool_path(target.node)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
