//! Stable identity of one remote resource.
//!
//! The identity doubles as the Mutation Gate's lock key, so it must stay the
//! same across retries of the same logical operation.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use thiserror::Error;

/// Opaque, comparable key identifying the remote resource being mutated.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TargetId(String);

/// Errors raised when building a [`TargetId`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TargetIdError {
    /// Raised when the identity is empty after trimming.
    #[error("target identity must not be empty")]
    Empty,
}

impl TargetId {
    /// Builds an identity from a raw key, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TargetIdError::Empty`] when nothing remains after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, TargetIdError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TargetIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for TargetId {
    type Err = TargetIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TargetId {
    type Error = TargetIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for TargetId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for TargetId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("vm-1", "vm-1")]
    #[case("  fr-par-1/abc  ", "fr-par-1/abc")]
    fn new_trims_identity(#[case] raw: &str, #[case] expected: &str) {
        let id = TargetId::new(raw).expect("identity should build");
        assert_eq!(id.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn new_rejects_blank_identity(#[case] raw: &str) {
        assert_eq!(TargetId::new(raw), Err(TargetIdError::Empty));
    }

    #[test]
    fn identities_compare_by_value() {
        let lhs: TargetId = "vm-a".parse().expect("parse");
        let rhs = TargetId::try_from(" vm-a").expect("try_from");
        assert_eq!(lhs, rhs);
    }
}
