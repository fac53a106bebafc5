//! Role enums used by the store access check.

use serde::{Deserialize, Serialize};

/// A user's role on a single store.
///
/// Roles are ordered: `StoreAdmin` grants everything `StoreViewer` grants.
///
/// ```
/// use winqer_core::StoreRole;
///
/// assert!(StoreRole::StoreAdmin.satisfies(StoreRole::StoreViewer));
/// assert!(!StoreRole::StoreViewer.satisfies(StoreRole::StoreAdmin));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreRole {
    /// Read-only access to the store dashboard.
    StoreViewer,
    /// Can change settings, billing, members and generate creatives.
    StoreAdmin,
}

impl StoreRole {
    /// Whether this role is at least as strong as `required`.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }
}

impl std::fmt::Display for StoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreAdmin => write!(f, "STORE_ADMIN"),
            Self::StoreViewer => write!(f, "STORE_VIEWER"),
        }
    }
}

impl std::str::FromStr for StoreRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STORE_ADMIN" => Ok(Self::StoreAdmin),
            "STORE_VIEWER" => Ok(Self::StoreViewer),
            _ => Err(format!("invalid store role: {s}")),
        }
    }
}

/// A user's role inside an organization that owns stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "org_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    /// Manages every store of the organization.
    Owner,
    /// Sees every store of the organization.
    Member,
}

impl OrgRole {
    /// Every organization role.
    pub const ALL: [Self; 2] = [Self::Owner, Self::Member];

    /// Database and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Member => "MEMBER",
        }
    }

    /// The store role an organization role implies on org-owned stores.
    #[must_use]
    pub const fn implied_store_role(self) -> StoreRole {
        match self {
            Self::Owner => StoreRole::StoreAdmin,
            Self::Member => StoreRole::StoreViewer,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_role_ordering() {
        assert!(StoreRole::StoreAdmin > StoreRole::StoreViewer);
        assert!(StoreRole::StoreAdmin.satisfies(StoreRole::StoreAdmin));
        assert!(StoreRole::StoreViewer.satisfies(StoreRole::StoreViewer));
    }

    #[test]
    fn test_store_role_wire_format() {
        assert_eq!(
            serde_json::to_string(&StoreRole::StoreAdmin).unwrap(),
            "\"STORE_ADMIN\""
        );
        assert_eq!("store_viewer".parse::<StoreRole>().unwrap(), StoreRole::StoreViewer);
        assert!("owner".parse::<StoreRole>().is_err());
    }

    #[test]
    fn test_org_role_implies_store_role() {
        assert_eq!(OrgRole::Owner.implied_store_role(), StoreRole::StoreAdmin);
        assert_eq!(OrgRole::Member.implied_store_role(), StoreRole::StoreViewer);
    }

    #[test]
    fn test_org_role_names_match_serde() {
        for role in OrgRole::ALL {
            assert_eq!(serde_json::to_string(&role).unwrap(), format!("\"{}\"", role.as_str()));
        }
    }
}
