//! Current-state snapshot of the cluster.
//!
//! Entities are stored in the same shapes as directives (always present) so
//! the diff engine can compare the two structurally.

use crate::directive::{Database, DatabasePrivilege, Directive, Group, ObjectKey, Schema, User};
use std::collections::{BTreeMap, BTreeSet};

/// Objects observed in the cluster at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct CurrentState {
    objects: BTreeMap<ObjectKey, Directive>,
    /// Roles filed under a kind that disagrees with their login attribute:
    /// groups that can log in and users that cannot.
    login_mismatch: BTreeSet<String>,
    /// Whether this snapshot was read from the cluster. An unloaded state
    /// cannot confirm that referenced objects exist.
    loaded: bool,
}

impl CurrentState {
    /// A snapshot with nothing in it that was read from the cluster.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            login_mismatch: BTreeSet::new(),
            loaded: true,
        }
    }

    /// Placeholder used when introspection is skipped.
    pub fn unloaded() -> Self {
        Self {
            objects: BTreeMap::new(),
            login_mismatch: BTreeSet::new(),
            loaded: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn insert(&mut self, directive: Directive) {
        debug_assert!(directive.is_present());
        self.objects.insert(directive.key(), directive);
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Directive> {
        self.objects.get(key)
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    /// Whether a role with this name exists, as a group or as a user.
    pub fn has_role(&self, name: &str) -> bool {
        self.contains(&ObjectKey::Group(name.to_string()))
            || self.contains(&ObjectKey::User(name.to_string()))
    }

    /// The role with this name, filed either as a group or as a user.
    pub fn role(&self, name: &str) -> Option<&Directive> {
        self.get(&ObjectKey::Group(name.to_string()))
            .or_else(|| self.get(&ObjectKey::User(name.to_string())))
    }

    /// Whether the role with this name has the login attribute.
    pub fn can_login(&self, name: &str) -> bool {
        let as_user = matches!(self.role(name), Some(Directive::User(_)));
        as_user != self.login_mismatch.contains(name)
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.contains(&ObjectKey::Database(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.objects.values()
    }

    pub(crate) fn add_group(&mut self, name: &str) {
        self.insert(Directive::Group(Group {
            name: name.to_string(),
            present: true,
        }));
    }

    pub(crate) fn add_user(&mut self, user: User) {
        self.insert(Directive::User(user));
    }

    /// Record that a role's login attribute disagrees with the kind it is
    /// filed under.
    pub(crate) fn mark_login_mismatch(&mut self, name: &str) {
        self.login_mismatch.insert(name.to_string());
    }

    pub(crate) fn add_database(&mut self, name: &str, owner: Option<String>) {
        self.insert(Directive::Database(Database {
            name: name.to_string(),
            owner,
            present: true,
        }));
    }

    pub(crate) fn add_schema(&mut self, database: &str, name: &str, owner: Option<String>) {
        self.insert(Directive::Schema(Schema {
            database: database.to_string(),
            name: name.to_string(),
            owner,
            present: true,
        }));
    }

    pub(crate) fn add_privilege(&mut self, privilege: DatabasePrivilege) {
        self.insert(Directive::DatabasePrivilege(privilege));
    }
}
