// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`OpContext`] carries per-operation state through the datastore

use slog::o;
use slog::Logger;

/// Context for an individual operation against the resource graph
///
/// Callers construct one per logical operation so that everything the
/// operation logs shares the same context.
#[derive(Clone)]
pub struct OpContext {
    pub log: Logger,
}

impl OpContext {
    /// Returns an OpContext for a caller-initiated operation.
    pub fn for_operation(log: &Logger, operation: &'static str) -> OpContext {
        OpContext { log: log.new(o!("operation" => operation)) }
    }

    /// Returns an OpContext suitable for use by a background task.
    pub fn for_background(log: Logger) -> OpContext {
        OpContext { log }
    }

    /// Returns an OpContext for tests, logging to nowhere.
    pub fn for_tests() -> OpContext {
        OpContext { log: Logger::root(slog::Discard, o!()) }
    }
}
