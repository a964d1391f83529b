use inventory_schema::{Role, Uid};
use inventory_store::UserRecord;
use serde::{Deserialize, Serialize};

/// The authenticated account acting on a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: Uid,
    pub role: Role,
    pub display_name: Option<String>,
}

impl User {
    pub fn new(uid: Uid, role: Role) -> Self {
        Self {
            uid,
            role,
            display_name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    pub fn has(&self, role: Role) -> bool {
        self.role >= role
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            uid: record.uid,
            role: record.role,
            display_name: record.display_name,
        }
    }
}
