//! The acting principal of a request.

use serde::{Deserialize, Serialize};

/// Session user on whose behalf a request runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Reference id of the user; empty for anonymous requests.
    pub user_reference_id: String,
    /// Reference ids of the groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Bypasses per-object authorization.
    #[serde(default)]
    pub is_admin: bool,
}

impl Principal {
    /// Create a principal for a user.
    pub fn user(user_reference_id: impl Into<String>) -> Self {
        Self {
            user_reference_id: user_reference_id.into(),
            groups: Vec::new(),
            is_admin: false,
        }
    }

    /// Create an anonymous principal.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create an administrator.
    pub fn admin(user_reference_id: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::user(user_reference_id)
        }
    }

    /// Add a group membership.
    pub fn with_group(mut self, group_reference_id: impl Into<String>) -> Self {
        self.groups.push(group_reference_id.into());
        self
    }

    /// Check group membership.
    pub fn in_group(&self, group_reference_id: &str) -> bool {
        self.groups.iter().any(|g| g == group_reference_id)
    }
}

/// Decides who counts as an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Members of this group are administrators.
    pub admin_group: Option<String>,
}

impl AccessPolicy {
    /// Policy where only the principal's own flag grants admin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat members of a group as administrators.
    pub fn with_admin_group(mut self, group_reference_id: impl Into<String>) -> Self {
        self.admin_group = Some(group_reference_id.into());
        self
    }

    /// Check whether the principal bypasses per-object checks.
    pub fn is_admin(&self, principal: &Principal) -> bool {
        principal.is_admin
            || self
                .admin_group
                .as_deref()
                .is_some_and(|group| principal.in_group(group))
    }
}
