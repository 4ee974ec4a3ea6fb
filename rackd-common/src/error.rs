// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling facilities for rackd
//!
//! Every fallible operation exposed by the resource graph, the allocator,
//! and the journal surfaces one of these conditions synchronously to its
//! caller.  Driver failures during reconciliation are handled internally by
//! the reconciler and never appear here.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// An error that can be generated within the rackd control plane
///
/// General best practices for error design apply here.  Where possible, we
/// want to reuse existing variants rather than inventing new ones to
/// distinguish cases that no programmatic consumer needs to distinguish.
#[derive(Clone, Debug, Deserialize, thiserror::Error, PartialEq, Serialize)]
pub enum Error {
    /// An object needed as part of this operation was not found.
    #[error("Object (of type {type_name:?}) not found: {lookup_type:?}")]
    ObjectNotFound { type_name: ResourceType, lookup_type: LookupType },
    /// An object already exists with the specified name or identifier.
    #[error("Object (of type {type_name:?}) already exists: {object_name}")]
    ObjectAlreadyExists { type_name: ResourceType, object_name: String },
    /// A structural precondition is unmet; the operation may succeed later,
    /// once some other change has been made (e.g., deleting the components
    /// of the object first).
    #[error("Blocked: {message}")]
    Blocked { message: String },
    /// A cross-tenant operation was attempted: the resources involved do not
    /// belong to the same project.
    #[error("Project mismatch: {message}")]
    ProjectMismatch { message: String },
    /// The operation is invalid given the current state of the system, and
    /// no other change will make this particular request valid.
    #[error("Illegal state: {message}")]
    IllegalState { message: String },
    /// A finite resource pool has no remaining values.  Callers can react by
    /// waiting, freeing something, or requesting an admin-assigned value.
    #[error("Insufficient capacity: {message}")]
    InsufficientCapacity { message: String },
    /// The request was well-formed, but cannot be completed as asked.
    #[error("Invalid Request: {message}")]
    InvalidRequest { message: String },
    /// The specified input field is not valid.
    #[error("Invalid Value: {label}, {message}")]
    InvalidValue { label: String, message: String },
    /// The system encountered an unhandled operational error.
    #[error("Internal Error: {internal_message}")]
    InternalError { internal_message: String },
    /// The system (or part of it) is unavailable.
    #[error("Service Unavailable: {internal_message}")]
    ServiceUnavailable { internal_message: String },
}

/// Indicates how an object was looked up (for an `ObjectNotFound` error)
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum LookupType {
    /// a specific name was requested
    ByName(String),
    /// a specific id was requested
    ById(Uuid),
    /// a name was requested within the namespace of some owning object
    /// (caller summarizes it, e.g. "eth0 on node n4")
    ByCompositeName(String),
}

impl LookupType {
    /// Returns an ObjectNotFound error appropriate for the case where this
    /// lookup failed
    pub fn into_not_found(self, type_name: ResourceType) -> Error {
        Error::ObjectNotFound { type_name, lookup_type: self }
    }
}

impl From<&str> for LookupType {
    fn from(name: &str) -> Self {
        LookupType::ByName(name.to_owned())
    }
}

impl From<Uuid> for LookupType {
    fn from(id: Uuid) -> Self {
        LookupType::ById(id)
    }
}

/// The type of a resource in the rackd resource graph
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum ResourceType {
    Project,
    Node,
    Nic,
    Switch,
    Port,
    Network,
    Headnode,
    Hnic,
    NetworkingAction,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResourceType::Project => "project",
                ResourceType::Node => "node",
                ResourceType::Nic => "nic",
                ResourceType::Switch => "switch",
                ResourceType::Port => "port",
                ResourceType::Network => "network",
                ResourceType::Headnode => "headnode",
                ResourceType::Hnic => "hnic",
                ResourceType::NetworkingAction => "networking action",
            }
        )
    }
}

impl Error {
    /// Returns whether the error is likely transient and could reasonably be
    /// retried
    pub fn retryable(&self) -> bool {
        match self {
            Error::ServiceUnavailable { .. } => true,

            Error::ObjectNotFound { .. }
            | Error::ObjectAlreadyExists { .. }
            | Error::Blocked { .. }
            | Error::ProjectMismatch { .. }
            | Error::IllegalState { .. }
            | Error::InsufficientCapacity { .. }
            | Error::InvalidRequest { .. }
            | Error::InvalidValue { .. }
            | Error::InternalError { .. } => false,
        }
    }

    /// Generates an [`Error::ObjectNotFound`] error for a lookup by object
    /// name.
    pub fn not_found_by_name(type_name: ResourceType, name: &str) -> Error {
        LookupType::from(name).into_not_found(type_name)
    }

    /// Generates an [`Error::ObjectNotFound`] error for a lookup by object
    /// id.
    pub fn not_found_by_id(type_name: ResourceType, id: Uuid) -> Error {
        LookupType::ById(id).into_not_found(type_name)
    }

    /// Generates an [`Error::ObjectNotFound`] error for a lookup within the
    /// namespace of an owning object (e.g. a nic on a node).
    pub fn not_found_in_owner(
        type_name: ResourceType,
        name: &str,
        owner_type: ResourceType,
        owner_name: &str,
    ) -> Error {
        LookupType::ByCompositeName(format!(
            "{} \"{}\" on {} \"{}\"",
            type_name, name, owner_type, owner_name
        ))
        .into_not_found(type_name)
    }

    /// Generates an [`Error::ObjectAlreadyExists`] error
    pub fn already_exists(type_name: ResourceType, object_name: &str) -> Error {
        Error::ObjectAlreadyExists {
            type_name,
            object_name: object_name.to_owned(),
        }
    }

    /// Generates an [`Error::Blocked`] error with the specific message
    ///
    /// Blocked means a structural precondition is unmet: the request may be
    /// retried once the blocking resource has been removed or its pending
    /// work has drained.
    pub fn blocked(message: &str) -> Error {
        Error::Blocked { message: message.to_owned() }
    }

    /// Generates an [`Error::ProjectMismatch`] error with the specific
    /// message
    pub fn project_mismatch(message: &str) -> Error {
        Error::ProjectMismatch { message: message.to_owned() }
    }

    /// Generates an [`Error::IllegalState`] error with the specific message
    pub fn illegal_state(message: &str) -> Error {
        Error::IllegalState { message: message.to_owned() }
    }

    /// Generates an [`Error::InsufficientCapacity`] error with the specific
    /// message
    ///
    /// This is used when a finite pool (e.g. the network-identifier
    /// namespace) is exhausted.  It is a first-class condition, distinct
    /// from other failures, so that clients can react to it.
    pub fn insufficient_capacity(message: &str) -> Error {
        Error::InsufficientCapacity { message: message.to_owned() }
    }

    /// Generates an [`Error::InvalidRequest`] error with the specific
    /// message
    pub fn invalid_request(message: &str) -> Error {
        Error::InvalidRequest { message: message.to_owned() }
    }

    /// Generates an [`Error::InvalidValue`] error for the named input field
    pub fn invalid_value(label: &str, message: &str) -> Error {
        Error::InvalidValue {
            label: label.to_owned(),
            message: message.to_owned(),
        }
    }

    /// Generates an [`Error::InternalError`] error with the specific message
    ///
    /// InternalError should be used for operational conditions that should
    /// not happen but that we cannot reasonably handle at runtime (e.g.,
    /// deserializing a value from the database, or finding two records for
    /// something that is supposed to be unique).
    pub fn internal_error(internal_message: &str) -> Error {
        Error::InternalError { internal_message: internal_message.to_owned() }
    }

    /// Generates an [`Error::ServiceUnavailable`] error with the specific
    /// message
    ///
    /// This should be used for transient failures where the caller might be
    /// expected to retry.
    pub fn unavail(message: &str) -> Error {
        Error::ServiceUnavailable { internal_message: message.to_owned() }
    }
}

#[cfg(test)]
mod test {
    use super::Error;
    use super::LookupType;
    use super::ResourceType;

    #[test]
    fn test_constructors() {
        let error = Error::not_found_by_name(ResourceType::Project, "acme");
        assert_eq!(
            error,
            Error::ObjectNotFound {
                type_name: ResourceType::Project,
                lookup_type: LookupType::ByName("acme".to_string()),
            }
        );
        assert!(!error.retryable());
        assert!(Error::unavail("db gone").retryable());
    }

    #[test]
    fn test_display() {
        let error = Error::insufficient_capacity("no network IDs available");
        assert_eq!(
            error.to_string(),
            "Insufficient capacity: no network IDs available"
        );
        assert_eq!(ResourceType::NetworkingAction.to_string(),
            "networking action");
    }
}
