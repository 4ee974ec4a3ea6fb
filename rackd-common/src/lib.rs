// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared by all rackd components.

pub mod error;

pub use error::Error;
pub use error::LookupType;
pub use error::ResourceType;

/// Result of a create operation for the specified type
pub type CreateResult<T> = Result<T, Error>;
/// Result of a delete operation for the specified type
pub type DeleteResult = Result<(), Error>;
/// Result of a lookup operation for the specified type
pub type LookupResult<T> = Result<T, Error>;
/// Result of an update operation for the specified type
pub type UpdateResult<T> = Result<T, Error>;
/// Result of a list operation that returns a vector
pub type ListResultVec<T> = Result<Vec<T>, Error>;

/// Maximum length of a label, in characters
pub const MAX_LABEL_LEN: usize = 128;

/// Validates a caller-supplied label (the human-assigned name of a project,
/// node, port, etc.).
///
/// Labels are namespaced identifiers, not free text, but they do carry
/// switch-meaningful port names like "ethernet1/3", so the character set is
/// deliberately permissive.
pub fn validate_label(label: &str) -> Result<(), Error> {
    if label.is_empty() {
        return Err(Error::invalid_value(label, "label cannot be empty"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(Error::invalid_value(
            label,
            &format!("label may not exceed {} characters", MAX_LABEL_LEN),
        ));
    }
    if label.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::invalid_value(
            label,
            "label may not contain whitespace or control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::validate_label;
    use super::Error;

    #[test]
    fn test_validate_label() {
        assert!(validate_label("acme").is_ok());
        assert!(validate_label("ethernet1/3").is_ok());
        assert!(validate_label("gi1/0/4").is_ok());

        assert!(matches!(
            validate_label(""),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            validate_label("two words"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            validate_label(&"x".repeat(129)),
            Err(Error::InvalidValue { .. })
        ));
    }
}
