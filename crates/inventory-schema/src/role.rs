use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role levels, ordered by privilege.
///
/// `System` is never held by a user; types locked to it can only be written
/// by internal tooling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Anonymous,
    Contributor,
    Reviewer,
    Admin,
    System,
}

impl Role {
    /// Maps the numeric level stored on user nodes.
    pub fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=0 => Role::Anonymous,
            1 => Role::Contributor,
            2..=9 => Role::Reviewer,
            10..=98 => Role::Admin,
            _ => Role::System,
        }
    }

    pub fn level(self) -> i64 {
        match self {
            Role::Anonymous => 0,
            Role::Contributor => 1,
            Role::Reviewer => 2,
            Role::Admin => 10,
            Role::System => 99,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Anonymous => "anonymous",
            Role::Contributor => "contributor",
            Role::Reviewer => "reviewer",
            Role::Admin => "admin",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anonymous" => Ok(Role::Anonymous),
            "contributor" => Ok(Role::Contributor),
            "reviewer" => Ok(Role::Reviewer),
            "admin" => Ok(Role::Admin),
            other => other
                .parse::<i64>()
                .map(Role::from_level)
                .map_err(|_| format!("unknown role `{s}`")),
        }
    }
}

/// The two write operations a type guards with a permission threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Edit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered() {
        assert!(Role::Anonymous < Role::Contributor);
        assert!(Role::Contributor < Role::Reviewer);
        assert!(Role::Reviewer < Role::Admin);
        assert!(Role::Admin < Role::System);
    }

    #[test]
    fn parses_names_and_levels() {
        assert_eq!("Reviewer".parse::<Role>().unwrap(), Role::Reviewer);
        assert_eq!("10".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::from_level(Role::Contributor.level()), Role::Contributor);
        assert!("owner".parse::<Role>().is_err());
    }
}
