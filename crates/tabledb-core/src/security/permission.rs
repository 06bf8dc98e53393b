//! Object permissions.
//!
//! A row's `permission` integer packs seven capabilities for each of three
//! scopes: guest (bits 0-6), owner (bits 7-13) and group (bits 14-20).

use super::principal::Principal;
use serde::{Deserialize, Serialize};

/// Operations a permission can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// See that the object exists.
    Peek,
    /// Read the object.
    Read,
    /// Create objects.
    Create,
    /// Update the object.
    Update,
    /// Delete the object.
    Delete,
    /// Execute actions on the object.
    Execute,
    /// Reference or detach the object from another one.
    Refer,
}

impl Capability {
    const COUNT: u32 = 7;

    fn offset(self) -> u32 {
        match self {
            Capability::Peek => 0,
            Capability::Read => 1,
            Capability::Create => 2,
            Capability::Update => 3,
            Capability::Delete => 4,
            Capability::Execute => 5,
            Capability::Refer => 6,
        }
    }
}

/// Who a group of permission bits applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionScope {
    /// Anyone, including anonymous principals.
    Guest,
    /// The owning user.
    Owner,
    /// Members of a granted group.
    Group,
}

impl PermissionScope {
    fn shift(self) -> u32 {
        match self {
            PermissionScope::Guest => 0,
            PermissionScope::Owner => Capability::COUNT,
            PermissionScope::Group => Capability::COUNT * 2,
        }
    }
}

/// Packed capability bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionBits(pub i64);

impl PermissionBits {
    /// No capabilities at all.
    pub const NONE: PermissionBits = PermissionBits(0);

    /// Every capability for every scope.
    pub const ALL: PermissionBits = PermissionBits((1 << (Capability::COUNT * 3)) - 1);

    /// Single bit for a capability within a scope.
    pub fn bit(scope: PermissionScope, capability: Capability) -> Self {
        PermissionBits(1 << (scope.shift() + capability.offset()))
    }

    /// Add a capability.
    pub fn with(self, scope: PermissionScope, capability: Capability) -> Self {
        PermissionBits(self.0 | Self::bit(scope, capability).0)
    }

    /// Every capability within one scope.
    pub fn scope_all(scope: PermissionScope) -> Self {
        PermissionBits(((1 << Capability::COUNT) - 1) << scope.shift())
    }

    /// Check a capability.
    pub fn allows(self, scope: PermissionScope, capability: Capability) -> bool {
        self.0 & Self::bit(scope, capability).0 != 0
    }
}

impl std::ops::BitOr for PermissionBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        PermissionBits(self.0 | rhs.0)
    }
}

/// A group's grant on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPermission {
    /// Reference id of the group.
    pub group_reference_id: String,
    /// Granted bits; only the group scope is consulted.
    pub permission: PermissionBits,
}

/// Resolved permissions of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPermission {
    /// Owning user, if any.
    pub owner_reference_id: Option<String>,
    /// Bits stored on the row.
    pub permission: PermissionBits,
    /// Per-group grants.
    pub groups: Vec<GroupPermission>,
}

impl ObjectPermission {
    /// A descriptor that grants nothing, used for objects that do not resolve.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check a capability for a user and the groups it belongs to.
    pub fn can(&self, capability: Capability, user_reference_id: &str, user_groups: &[String]) -> bool {
        if self.permission.allows(PermissionScope::Guest, capability) {
            return true;
        }

        let is_owner = !user_reference_id.is_empty()
            && self.owner_reference_id.as_deref() == Some(user_reference_id);
        if is_owner && self.permission.allows(PermissionScope::Owner, capability) {
            return true;
        }

        self.groups.iter().any(|grant| {
            grant.permission.allows(PermissionScope::Group, capability)
                && user_groups.iter().any(|g| *g == grant.group_reference_id)
        })
    }

    /// Check whether the user may refer to (detach) this object.
    pub fn can_refer(&self, user_reference_id: &str, user_groups: &[String]) -> bool {
        self.can(Capability::Refer, user_reference_id, user_groups)
    }

    /// Same check, taking a principal.
    pub fn can_refer_as(&self, principal: &Principal) -> bool {
        self.can_refer(&principal.user_reference_id, &principal.groups)
    }
}
