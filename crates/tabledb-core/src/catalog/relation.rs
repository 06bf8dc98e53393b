//! Relation definitions between tables.

use serde::{Deserialize, Serialize};

/// Kind of a relation, read from the subject's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Subject holds a foreign key to at most one object.
    HasOne,
    /// Subject holds a foreign key to its owning object.
    BelongsTo,
    /// Subject owns many objects through a join table.
    HasMany,
    /// Many-to-many association through a join table.
    HasManyAndBelongsToMany,
}

impl RelationKind {
    /// Check whether the association is stored in a join table.
    pub fn uses_join_table(self) -> bool {
        matches!(
            self,
            RelationKind::HasMany | RelationKind::HasManyAndBelongsToMany
        )
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationKind::HasOne => write!(f, "has_one"),
            RelationKind::BelongsTo => write!(f, "belongs_to"),
            RelationKind::HasMany => write!(f, "has_many"),
            RelationKind::HasManyAndBelongsToMany => write!(f, "has_many_and_belongs_to_many"),
        }
    }
}

/// Which end of a relation a table sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The table is the relation's subject.
    Subject,
    /// The table is the relation's object.
    Object,
}

/// A relation between a subject table and an object table.
///
/// For `has_one` / `belongs_to` the subject table stores the object's `id` in
/// the column named by `object_name`. For the join-table kinds, `join_table`
/// holds one row per association with `subject_name` pointing at the subject's
/// `id` and `object_name` pointing at the object's `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Subject table name.
    pub subject: String,
    /// Object table name.
    pub object: String,
    /// Relation kind.
    #[serde(rename = "relation")]
    pub kind: RelationKind,
    /// Column referencing the subject (join tables only).
    #[serde(default)]
    pub subject_name: String,
    /// Column referencing the object.
    #[serde(default)]
    pub object_name: String,
    /// Join table for has_many / has_many_and_belongs_to_many.
    #[serde(default)]
    pub join_table: Option<String>,
}

impl RelationDef {
    /// Create a relation with default column and join table names.
    pub fn new(subject: impl Into<String>, kind: RelationKind, object: impl Into<String>) -> Self {
        let mut relation = Self {
            subject: subject.into(),
            object: object.into(),
            kind,
            subject_name: String::new(),
            object_name: String::new(),
            join_table: None,
        };
        relation.fill_defaults();
        relation
    }

    /// Create a has_one relation.
    pub fn has_one(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self::new(subject, RelationKind::HasOne, object)
    }

    /// Create a belongs_to relation.
    pub fn belongs_to(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self::new(subject, RelationKind::BelongsTo, object)
    }

    /// Create a has_many relation.
    pub fn has_many(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self::new(subject, RelationKind::HasMany, object)
    }

    /// Create a has_many_and_belongs_to_many relation.
    pub fn has_many_and_belongs_to_many(
        subject: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self::new(subject, RelationKind::HasManyAndBelongsToMany, object)
    }

    /// Override the join table name.
    pub fn with_join_table(mut self, join_table: impl Into<String>) -> Self {
        self.join_table = Some(join_table.into());
        self
    }

    /// Override the subject column name.
    pub fn with_subject_name(mut self, name: impl Into<String>) -> Self {
        self.subject_name = name.into();
        self
    }

    /// Override the object column name.
    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = name.into();
        self
    }

    /// Fill in column and join table names left empty by a schema document.
    pub fn fill_defaults(&mut self) {
        if self.subject_name.is_empty() {
            self.subject_name = format!("{}_id", self.subject);
        }
        if self.object_name.is_empty() {
            self.object_name = format!("{}_id", self.object);
        }
        if self.kind.uses_join_table() && self.join_table.is_none() {
            self.join_table = Some(format!("{}_{}", self.subject, self.object));
        }
        if !self.kind.uses_join_table() {
            self.join_table = None;
        }
    }

    /// Join table name; empty for relations without one.
    pub fn join_table_name(&self) -> &str {
        self.join_table.as_deref().unwrap_or_default()
    }

    /// Role the given table plays in this relation.
    ///
    /// A self-referencing relation is seen from the subject side.
    pub fn role_of(&self, table: &str) -> Option<Role> {
        if self.subject == table {
            Some(Role::Subject)
        } else if self.object == table {
            Some(Role::Object)
        } else {
            None
        }
    }

    /// Check whether either end names an audit table.
    pub fn touches_audit_table(&self) -> bool {
        super::is_audit_table(&self.subject) || super::is_audit_table(&self.object)
    }
}

impl std::fmt::Display for RelationDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.kind, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_many_defaults() {
        let rel = RelationDef::has_many("invoice", "invoice_line");

        assert_eq!(rel.kind, RelationKind::HasMany);
        assert_eq!(rel.subject_name, "invoice_id");
        assert_eq!(rel.object_name, "invoice_line_id");
        assert_eq!(rel.join_table_name(), "invoice_invoice_line");
    }

    #[test]
    fn test_has_one_has_no_join_table() {
        let rel = RelationDef::has_one("profile", "user").with_join_table("ignored");
        let mut rel = rel;
        rel.fill_defaults();

        assert!(rel.join_table.is_none());
        assert_eq!(rel.object_name, "user_id");
    }

    #[test]
    fn test_role_of() {
        let rel = RelationDef::belongs_to("comment", "post");

        assert_eq!(rel.role_of("comment"), Some(Role::Subject));
        assert_eq!(rel.role_of("post"), Some(Role::Object));
        assert_eq!(rel.role_of("user"), None);

        let self_ref = RelationDef::has_one("node", "node");
        assert_eq!(self_ref.role_of("node"), Some(Role::Subject));
    }

    #[test]
    fn test_deserialize_kind() {
        let rel: RelationDef = serde_json::from_str(
            r#"{"subject":"user","object":"tag","relation":"has_many_and_belongs_to_many"}"#,
        )
        .unwrap();
        assert_eq!(rel.kind, RelationKind::HasManyAndBelongsToMany);
        assert!(rel.subject_name.is_empty());
    }

    #[test]
    fn test_touches_audit_table() {
        assert!(RelationDef::has_many("invoice", "invoice_audit").touches_audit_table());
        assert!(!RelationDef::has_many("invoice", "invoice_line").touches_audit_table());
    }
}
