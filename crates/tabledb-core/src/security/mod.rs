//! Security model: principals and per-object permissions.
//!
//! Provides:
//! - Principals carrying user identity and group memberships
//! - Administrator resolution
//! - Packed per-object permission bits and the refer check

mod permission;
mod principal;

pub use permission::{Capability, GroupPermission, ObjectPermission, PermissionBits, PermissionScope};
pub use principal::{AccessPolicy, Principal};
