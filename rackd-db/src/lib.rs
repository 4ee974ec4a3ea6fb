// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence layer for rackd
//!
//! Everything durable lives here: the relational schema, the row model
//! types, and the [`datastore::DataStore`] through which every mutation of
//! the resource graph flows.  The graph's consistency invariants are
//! enforced inside the datastore's transactions, so a caller can never
//! observe (or commit) a state that violates them.

pub mod allocator;
pub mod context;
pub mod datastore;
pub mod error;
pub mod models;
pub mod schema;
pub mod types;

pub use allocator::NetworkIdAllocator;
pub use context::OpContext;
pub use datastore::DataStore;
