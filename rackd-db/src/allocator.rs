// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network identifier allocation
//!
//! An allocator hands out the driver-meaningful identifiers (e.g. VLAN tags)
//! that networks are realized with.  Implementations must derive their used
//! set purely from live network rows, querying through the supplied
//! connection: allocation runs inside the same transaction that inserts the
//! network row, so a crash can never leak or double-issue an identifier.

use diesel::SqliteConnection;
use rackd_common::Error;

pub trait NetworkIdAllocator: Send + Sync {
    /// Returns an unused identifier, or None if the pool is exhausted.
    fn allocate_id(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<String>, Error>;

    /// Returns an identifier to the pool.
    ///
    /// Called inside the transaction that deletes the owning network row.
    /// Allocators that compute their used set from live rows have nothing
    /// to do here.
    fn free_id(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<(), Error>;
}

/// How `network_create` obtains the network's provider identifier.
pub enum NetworkIdSource<'a> {
    /// Draw from the allocator's pool.
    Allocate(&'a dyn NetworkIdAllocator),
    /// Use an admin-assigned value verbatim.
    Assign(&'a str),
}
