// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VLAN-based switch drivers
//!
//! [`VlanPool`] is the allocator shared by every VLAN-style driver: network
//! identifiers are VLAN tags drawn from configured ranges.  The used set is
//! recomputed from live network rows inside the allocating transaction, so
//! restarts cannot desynchronize it and an admin-assigned tag inside the
//! pool is never double-issued.
//!
//! [`VlanStubSwitch`] realizes nothing (its `apply_networking` only logs),
//! for deployments where the switches are configured out of band.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use diesel::prelude::*;
use diesel::SqliteConnection;
use rackd_common::Error;
use rackd_db::schema::network;
use rackd_db::NetworkIdAllocator;
use slog::{debug, o, Logger};

use super::{SwitchDriver, SwitchError};

pub const VLAN_STUB_TAG: &str = "vlan-stub";

/// The set of VLAN tags available for allocation.
#[derive(Clone, Debug)]
pub struct VlanPool {
    vlans: BTreeSet<u16>,
}

impl VlanPool {
    /// Parses a range list such as `"100-110, 200"`.
    pub fn parse(ranges: &str) -> Result<VlanPool, Error> {
        let mut vlans = BTreeSet::new();
        for piece in ranges.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let (low, high) = match piece.split_once('-') {
                Some((low, high)) => {
                    (parse_tag(low.trim())?, parse_tag(high.trim())?)
                }
                None => {
                    let tag = parse_tag(piece)?;
                    (tag, tag)
                }
            };
            if low > high {
                return Err(Error::invalid_value(
                    "vlan.ranges",
                    &format!("empty VLAN range {:?}", piece),
                ));
            }
            vlans.extend(low..=high);
        }
        if vlans.is_empty() {
            return Err(Error::invalid_value(
                "vlan.ranges",
                "no VLANs configured",
            ));
        }
        Ok(VlanPool { vlans })
    }

    pub fn len(&self) -> usize {
        self.vlans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vlans.is_empty()
    }

    /// Returns the lowest tag in the pool not already in use by any live
    /// network.
    pub fn allocate_from(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<String>, Error> {
        let in_use: Vec<String> = network::table
            .select(network::provider_id)
            .load(conn)
            .map_err(|e| {
                Error::internal_error(&format!(
                    "loading network IDs in use: {}",
                    e
                ))
            })?;
        // Admin-assigned identifiers may not be numeric at all; those can
        // never collide with pool tags and are ignored.
        let in_use: BTreeSet<u16> =
            in_use.iter().filter_map(|id| id.parse().ok()).collect();
        Ok(self
            .vlans
            .iter()
            .find(|tag| !in_use.contains(tag))
            .map(|tag| tag.to_string()))
    }
}

fn parse_tag(s: &str) -> Result<u16, Error> {
    let tag: u16 = s.parse().map_err(|_| {
        Error::invalid_value(
            "vlan.ranges",
            &format!("{:?} is not a VLAN tag", s),
        )
    })?;
    if tag == 0 || tag > 4094 {
        return Err(Error::invalid_value(
            "vlan.ranges",
            &format!("VLAN tag {} out of range", tag),
        ));
    }
    Ok(tag)
}

/// VLAN allocation with no switch programming.
pub struct VlanStubSwitch {
    pool: VlanPool,
    log: Logger,
}

impl VlanStubSwitch {
    pub fn new(pool: VlanPool, log: &Logger) -> VlanStubSwitch {
        VlanStubSwitch {
            pool,
            log: log.new(o!("switch_driver" => VLAN_STUB_TAG)),
        }
    }
}

impl NetworkIdAllocator for VlanStubSwitch {
    fn allocate_id(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<String>, Error> {
        self.pool.allocate_from(conn)
    }

    fn free_id(
        &self,
        _conn: &mut SqliteConnection,
        _id: &str,
    ) -> Result<(), Error> {
        // The used set is derived from live network rows; deleting the row
        // is the free.
        Ok(())
    }
}

impl SwitchDriver for VlanStubSwitch {
    fn tag(&self) -> &'static str {
        VLAN_STUB_TAG
    }

    fn apply_networking(
        &self,
        map: &BTreeMap<String, Option<String>>,
    ) -> Result<(), SwitchError> {
        for (port, net_id) in map {
            debug!(self.log, "apply networking (stub)";
                "port" => port, "network_id" => ?net_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::VlanPool;
    use rackd_common::Error;

    #[test]
    fn parse_ranges() {
        let pool = VlanPool::parse("100-110, 200").unwrap();
        assert_eq!(pool.len(), 12);
        let pool = VlanPool::parse("42").unwrap();
        assert_eq!(pool.len(), 1);

        assert!(matches!(
            VlanPool::parse(""),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            VlanPool::parse("abc"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            VlanPool::parse("200-100"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            VlanPool::parse("0-5"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            VlanPool::parse("4000-5000"),
            Err(Error::InvalidValue { .. })
        ));
    }
}
