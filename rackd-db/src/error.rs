// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling and conversions for the datastore

use diesel::result::DatabaseErrorInformation;
use diesel::result::DatabaseErrorKind as DieselErrorKind;
use diesel::result::Error as DieselError;
use rackd_common::{Error as PublicError, LookupType, ResourceType};

/// Summarizes details provided with a database error.
fn format_database_error(
    kind: DieselErrorKind,
    info: &dyn DatabaseErrorInformation,
) -> String {
    let mut rv =
        format!("database error (kind = {:?}): {}\n", kind, info.message());
    if let Some(details) = info.details() {
        rv.push_str(&format!("DETAILS: {}\n", details));
    }
    if let Some(table_name) = info.table_name() {
        rv.push_str(&format!("TABLE NAME: {}\n", table_name));
    }
    rv
}

/// Converts a Diesel error to an external error.
pub fn public_error_from_diesel(
    error: DieselError,
    resource_type: ResourceType,
    lookup_type: LookupType,
) -> PublicError {
    match error {
        DieselError::NotFound => PublicError::ObjectNotFound {
            type_name: resource_type,
            lookup_type,
        },
        DieselError::DatabaseError(kind, info) => {
            PublicError::internal_error(&format_database_error(kind, &*info))
        }
        error => PublicError::internal_error(&format!(
            "Unknown diesel error: {:?}",
            error
        )),
    }
}

/// Converts a Diesel error to an external error, when requested as
/// part of a creation operation.
pub fn public_error_from_diesel_create(
    error: DieselError,
    resource_type: ResourceType,
    object_name: &str,
) -> PublicError {
    match error {
        DieselError::DatabaseError(kind, info) => match kind {
            DieselErrorKind::UniqueViolation => {
                PublicError::ObjectAlreadyExists {
                    type_name: resource_type,
                    object_name: object_name.to_string(),
                }
            }
            _ => PublicError::internal_error(&format_database_error(
                kind, &*info,
            )),
        },
        _ => PublicError::internal_error(&format!(
            "Unknown diesel error: {:?}",
            error
        )),
    }
}

/// Error type for datastore transactions, which can fail either on a
/// condition the operation checks for or on the database itself
///
/// Diesel requires the transaction's error type to implement
/// `From<diesel::result::Error>` so that it can inject rollback failures.
#[derive(Debug)]
pub enum TxnError {
    /// A condition checked by the operation (surfaced to the caller as-is)
    Public(PublicError),
    /// A failure from the database itself
    Database(DieselError),
}

impl From<PublicError> for TxnError {
    fn from(err: PublicError) -> Self {
        TxnError::Public(err)
    }
}

impl From<DieselError> for TxnError {
    fn from(err: DieselError) -> Self {
        TxnError::Database(err)
    }
}

impl From<TxnError> for PublicError {
    fn from(err: TxnError) -> Self {
        match err {
            TxnError::Public(err) => err,
            TxnError::Database(DieselError::DatabaseError(kind, info)) => {
                PublicError::internal_error(&format_database_error(
                    kind, &*info,
                ))
            }
            TxnError::Database(err) => PublicError::internal_error(&format!(
                "unexpected database error: {:?}",
                err
            )),
        }
    }
}
