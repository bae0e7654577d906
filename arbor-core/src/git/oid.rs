//! Object identifiers

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A 40-character hex content address of a commit or other object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(git2::Oid);

impl Oid {
    /// Parse a full 40-character hex id
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != 40 {
            return Err(Error::Other(format!("Invalid object id '{}': expected 40 hex characters", s)));
        }
        git2::Oid::from_str(s)
            .map(Self)
            .map_err(|e| Error::Other(format!("Invalid object id '{}': {}", s, e.message())))
    }

    /// First 8 characters, for display
    pub fn short(&self) -> String {
        let mut s = self.0.to_string();
        s.truncate(8);
        s
    }

    pub(crate) fn raw(&self) -> git2::Oid {
        self.0
    }
}

impl From<git2::Oid> for Oid {
    fn from(oid: git2::Oid) -> Self {
        Self(oid)
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_parse_and_display() {
        let oid = Oid::parse(HEX).unwrap();
        assert_eq!(oid.to_string(), HEX);
        assert_eq!(oid.short(), "01234567");
    }

    #[test]
    fn test_parse_rejects_short_ids() {
        assert!(Oid::parse("0123abcd").is_err());
        assert!(Oid::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(Oid::parse(&"z".repeat(40)).is_err());
    }

    #[test]
    fn test_from_str() {
        let oid: Oid = HEX.parse().unwrap();
        assert_eq!(oid.raw().to_string(), HEX);
    }
}
