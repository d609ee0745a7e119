//! Validation module
//!
//! Content-type identifiers and attribute names are checked once, when a schema
//! is registered, so every later lookup can trust them.

use std::fmt;

/// Validation errors for schema identifiers
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Name contains characters outside the allowed set
    InvalidCharacters(String),
    /// Name is longer than the identifier limit
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },
    /// Name is empty
    Empty,
    /// Name starts with an invalid character (must start with a letter, or underscore for attributes)
    InvalidStartCharacter(String),
    /// Name collides with a key the service manages itself
    ReservedName(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidCharacters(name) => {
                write!(f, "Invalid characters in name '{}'", name)
            }
            ValidationError::TooLong {
                name,
                length,
                max_length,
            } => {
                write!(
                    f,
                    "Name '{}' is too long: {} characters (max {})",
                    name, length, max_length
                )
            }
            ValidationError::Empty => {
                write!(f, "Name cannot be empty")
            }
            ValidationError::InvalidStartCharacter(name) => {
                write!(f, "Name '{}' must start with a letter", name)
            }
            ValidationError::ReservedName(name) => {
                write!(f, "Name '{}' is reserved", name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validated attribute name
///
/// Attribute names share a namespace with filter operators (`$eq`) and the
/// service-managed keys `id` and `__type`, so they are restricted to plain identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedAttributeName(String);

impl ValidatedAttributeName {
    const MAX_LENGTH: usize = 63;

    pub fn new(name: &str) -> Result<Self, ValidationError> {
        check_length(name, Self::MAX_LENGTH)?;

        let first_char = name.chars().next().ok_or(ValidationError::Empty)?;
        if !first_char.is_ascii_alphabetic() && first_char != '_' {
            return Err(ValidationError::InvalidStartCharacter(name.to_string()));
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidCharacters(name.to_string()));
        }

        if Self::is_reserved(name) {
            return Err(ValidationError::ReservedName(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn is_reserved(name: &str) -> bool {
        const RESERVED: &[&str] = &["id", "__type", "__component", "_q"];
        RESERVED.contains(&name.to_ascii_lowercase().as_str())
    }
}

impl fmt::Display for ValidatedAttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated content-type identifier such as `api::article.article`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedUid(String);

impl ValidatedUid {
    const MAX_LENGTH: usize = 255;

    pub fn new(uid: &str) -> Result<Self, ValidationError> {
        check_length(uid, Self::MAX_LENGTH)?;

        let first_char = uid.chars().next().ok_or(ValidationError::Empty)?;
        if !first_char.is_ascii_alphabetic() {
            return Err(ValidationError::InvalidStartCharacter(uid.to_string()));
        }

        if !uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        {
            return Err(ValidationError::InvalidCharacters(uid.to_string()));
        }

        Ok(Self(uid.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn check_length(name: &str, max_length: usize) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if name.len() > max_length {
        return Err(ValidationError::TooLong {
            name: name.to_string(),
            length: name.len(),
            max_length,
        });
    }
    Ok(())
}

/// Utility functions for validation
pub mod utils {
    use super::*;

    pub fn is_valid_attribute_name(name: &str) -> bool {
        ValidatedAttributeName::new(name).is_ok()
    }

    pub fn is_valid_uid(uid: &str) -> bool {
        ValidatedUid::new(uid).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_attribute_names() {
        let valid_names = ["title", "published_at", "coverImage", "_internal", "a1", &"a".repeat(63)];

        for name in valid_names {
            assert!(
                ValidatedAttributeName::new(name).is_ok(),
                "Should accept valid name: {}",
                name
            );
        }
    }

    #[test]
    fn test_invalid_attribute_names() {
        let test_cases = [
            ("", ValidationError::Empty),
            (
                "1st",
                ValidationError::InvalidStartCharacter("1st".to_string()),
            ),
            (
                "$eq",
                ValidationError::InvalidStartCharacter("$eq".to_string()),
            ),
            (
                "cover-image",
                ValidationError::InvalidCharacters("cover-image".to_string()),
            ),
            (
                "author.name",
                ValidationError::InvalidCharacters("author.name".to_string()),
            ),
            ("id", ValidationError::ReservedName("id".to_string())),
            ("ID", ValidationError::ReservedName("ID".to_string())),
            ("__type", ValidationError::ReservedName("__type".to_string())),
        ];

        for (name, expected_error) in test_cases {
            let result = ValidatedAttributeName::new(name);
            assert_eq!(result.unwrap_err(), expected_error, "for name {:?}", name);
        }
    }

    #[test]
    fn test_too_long_attribute_name() {
        match ValidatedAttributeName::new(&"a".repeat(64)).unwrap_err() {
            ValidationError::TooLong {
                length, max_length, ..
            } => {
                assert_eq!(length, 64);
                assert_eq!(max_length, 63);
            }
            other => panic!("Expected TooLong error, got {:?}", other),
        }
    }

    #[test]
    fn test_uid_validation() {
        assert!(ValidatedUid::new("article").is_ok());
        assert!(ValidatedUid::new("api::article.article").is_ok());
        assert!(ValidatedUid::new("plugin::users-permissions.user").is_ok());

        assert_eq!(ValidatedUid::new("").unwrap_err(), ValidationError::Empty);
        assert!(matches!(
            ValidatedUid::new("::article").unwrap_err(),
            ValidationError::InvalidStartCharacter(_)
        ));
        assert!(matches!(
            ValidatedUid::new("api::my article").unwrap_err(),
            ValidationError::InvalidCharacters(_)
        ));
    }

    #[test]
    fn test_display_and_utils() {
        let name = ValidatedAttributeName::new("title").unwrap();
        let uid = ValidatedUid::new("api::tag.tag").unwrap();
        assert_eq!(format!("{}", name), "title");
        assert_eq!(uid.to_string(), "api::tag.tag");

        assert!(utils::is_valid_attribute_name("body"));
        assert!(!utils::is_valid_attribute_name("id"));
        assert!(utils::is_valid_uid("api::tag.tag"));
        assert!(!utils::is_valid_uid("9tags"));
    }
}
