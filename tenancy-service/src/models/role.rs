//! Organization roles and the privilege ordering that gates sensitive
//! operations.

use serde::{Deserialize, Serialize};

/// A user's role within one organization.
///
/// The variants form a privilege ladder: owner > admin > manager > staff.
/// Integration settings and membership mutation only ever gate on admin or
/// owner; the manager/staff distinction exists for call sites elsewhere in
/// the platform and is kept explicit per use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Owner,
    Admin,
    Manager,
    Staff,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Owner => "owner",
            OrgRole::Admin => "admin",
            OrgRole::Manager => "manager",
            OrgRole::Staff => "staff",
        }
    }

    /// Privilege rank. Every variant must appear here: adding a role without
    /// ranking it is a compile error, not a silent denial.
    fn rank(&self) -> u8 {
        match self {
            OrgRole::Owner => 3,
            OrgRole::Admin => 2,
            OrgRole::Manager => 1,
            OrgRole::Staff => 0,
        }
    }

    /// Whether this role satisfies a minimum required role.
    pub fn at_least(&self, min: OrgRole) -> bool {
        self.rank() >= min.rank()
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(OrgRole::Owner),
            "admin" => Ok(OrgRole::Admin),
            "manager" => Ok(OrgRole::Manager),
            "staff" => Ok(OrgRole::Staff),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}
