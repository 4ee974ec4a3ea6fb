// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the rackd daemon

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DatabaseConfig {
    /// path to the SQLite database file (created if absent)
    pub path: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SwitchConfig {
    /// tag of the switch driver to use, e.g. "vlan-stub"
    pub driver: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VlanConfig {
    /// VLAN tags available to the allocator, e.g. "100-110, 200"
    pub ranges: String,
}

impl Default for VlanConfig {
    fn default() -> Self {
        VlanConfig { ranges: "100-4094".to_string() }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// how often the reconciler wakes up on its own, in seconds
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// delay before retrying after a failed switch apply, in seconds;
    /// defaults to `period_secs`
    pub failure_backoff_secs: Option<u64>,
    /// cap on the (doubling) retry delay, in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

fn default_period_secs() -> u64 {
    2
}

fn default_max_backoff_secs() -> u64 {
    60
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            period_secs: default_period_secs(),
            failure_backoff_secs: None,
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl ReconcilerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(
            self.failure_backoff_secs.unwrap_or(self.period_secs),
        )
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {
    /// directory where serial console output is spooled
    #[serde(default = "default_spool_dir")]
    pub spool_dir: Utf8PathBuf,
}

fn default_spool_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("/var/tmp/rackd/consoles")
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig { spool_dir: default_spool_dir() }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RackdConfig {
    pub database: DatabaseConfig,
    pub switch: SwitchConfig,
    #[serde(default)]
    pub vlan: VlanConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("read \"{path}\"")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("parse \"{path}\"")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}

impl RackdConfig {
    /// Load a `RackdConfig` from the given TOML file.
    pub fn from_file(path: &Utf8Path) -> Result<RackdConfig, LoadError> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            LoadError::Io { path: path.to_owned(), err }
        })?;
        toml::from_str(&contents).map_err(|err| LoadError::Parse {
            path: path.to_owned(),
            err,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config: RackdConfig = toml::from_str(
            r#"
            [database]
            path = "/var/db/rackd.db"
            [switch]
            driver = "vlan-stub"
            "#,
        )
        .unwrap();
        assert_eq!(config.reconciler.period(), Duration::from_secs(2));
        assert_eq!(
            config.reconciler.failure_backoff(),
            Duration::from_secs(2)
        );
        assert_eq!(config.reconciler.max_backoff(), Duration::from_secs(60));
        assert_eq!(config.vlan.ranges, "100-4094");
    }

    #[test]
    fn explicit_values() {
        let config: RackdConfig = toml::from_str(
            r#"
            [database]
            path = "/var/db/rackd.db"
            [switch]
            driver = "vlan-stub"
            [vlan]
            ranges = "100-110, 200"
            [reconciler]
            period_secs = 5
            failure_backoff_secs = 1
            max_backoff_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.reconciler.period(), Duration::from_secs(5));
        assert_eq!(
            config.reconciler.failure_backoff(),
            Duration::from_secs(1)
        );
        assert_eq!(config.vlan.ranges, "100-110, 200");
    }

    #[test]
    fn rejects_unknown_reconciler_keys() {
        let err = toml::from_str::<RackdConfig>(
            r#"
            [database]
            path = "/var/db/rackd.db"
            [switch]
            driver = "vlan-stub"
            [reconciler]
            period = 5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("period"));
    }
}
