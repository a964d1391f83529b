//! Node identifiers: committed uids and blank-node placeholders.

use crate::error::UidError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a committed node in the graph store (`0x1f`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    pub fn parse(s: &str) -> Result<Self, UidError> {
        let trimmed = s.trim();
        if is_uid(trimmed) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(UidError::Malformed(s.to_string()))
        }
    }

    pub fn from_u64(n: u64) -> Self {
        Self(format!("{n:#x}"))
    }

    /// Numeric value of the uid; always succeeds for a parsed uid unless it
    /// overflows 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        u64::from_str_radix(&self.0[2..], 16).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `true` if `s` looks like a stored node uid (`0x` followed by hex digits).
pub fn is_uid(s: &str) -> bool {
    let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) else {
        return false;
    };
    !digits.is_empty() && digits.len() <= 16 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Uid {
    type Err = UidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uid {
    type Error = UidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

/// Placeholder for a node created by the mutation that mentions it.
///
/// Stored without the `_:` prefix; rendered with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlankId(String);

impl BlankId {
    pub fn new(label: impl Into<String>) -> Result<Self, UidError> {
        let label = label.into();
        let label = label.strip_prefix("_:").unwrap_or(&label).to_string();
        let ok = !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if ok {
            Ok(Self(label))
        } else {
            Err(UidError::BadBlank(label))
        }
    }

    /// A label that cannot collide with any other label in the same mutation.
    pub fn fresh(prefix: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}_{}", &suffix[..12]))
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

/// Reference to a node inside a mutation: either an existing one or a
/// placeholder that the store allocates on commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    Existing(Uid),
    New(BlankId),
}

impl NodeRef {
    pub fn uid(&self) -> Option<&Uid> {
        match self {
            NodeRef::Existing(uid) => Some(uid),
            NodeRef::New(_) => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, NodeRef::New(_))
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Existing(uid) => write!(f, "<{uid}>"),
            NodeRef::New(blank) => write!(f, "{blank}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hex_uids_only() {
        assert!(is_uid("0x1"));
        assert!(is_uid("0xDEADbeef"));
        assert!(!is_uid("0x"));
        assert!(!is_uid("12"));
        assert!(!is_uid("0xzz"));
        assert!(!is_uid("_:new"));
        assert_eq!(Uid::parse(" 0xAB ").unwrap().as_str(), "0xab");
    }

    #[test]
    fn uid_numeric_round_trip() {
        let uid = Uid::from_u64(255);
        assert_eq!(uid.as_str(), "0xff");
        assert_eq!(uid.to_u64(), Some(255));
    }

    #[test]
    fn blank_labels_render_with_prefix() {
        let blank = BlankId::new("_:newentry").unwrap();
        assert_eq!(blank.label(), "newentry");
        assert_eq!(blank.to_string(), "_:newentry");
        assert!(BlankId::new("bad label").is_err());
        assert_ne!(BlankId::fresh("x"), BlankId::fresh("x"));
    }
}
