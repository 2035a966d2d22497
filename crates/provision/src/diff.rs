//! Diff engine
//!
//! Compares each directive with the object found under the same identity
//! in the current state and derives the operations that converge them.
//! Groups and users are looked up by role name, since both kinds share one
//! namespace in the cluster. Planning is pure: it never touches the cluster.

use crate::collection::DirectiveSet;
use crate::directive::{
    Database, DatabasePrivilege, Directive, Group, Privilege, Schema, User,
};
use crate::operation::Operation;
use crate::order;
use crate::report::{Report, Status};
use crate::state::CurrentState;
use std::collections::BTreeSet;

/// Ordered operations that converge the cluster to the desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    operations: Vec<Operation>,
}

impl Plan {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the cluster already matches the desired state
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// A report listing every operation as planned.
    pub fn to_report(&self, dry_run: bool) -> Report {
        Report::uniform(&self.operations, Status::Planned, dry_run)
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Compute the plan for `desired` against `current`.
pub fn plan(desired: &DirectiveSet, current: &CurrentState) -> Plan {
    let mut operations = Vec::new();
    for directive in desired {
        diff_directive(directive, current, &mut operations);
    }
    Plan {
        operations: order::arrange(operations),
    }
}

/// Operations needed to move the matching object of `current` (if any) to
/// `directive`.
pub fn diff_directive(directive: &Directive, current: &CurrentState, out: &mut Vec<Operation>) {
    match (directive, current.get(&directive.key())) {
        (Directive::Group(want), _) => diff_group(want, current, out),
        (Directive::User(want), _) => diff_user(want, current, out),
        (Directive::Database(want), Some(Directive::Database(have))) => {
            diff_database(want, Some(have), out);
        }
        (Directive::Database(want), _) => diff_database(want, None, out),
        (Directive::Schema(want), Some(Directive::Schema(have))) => {
            diff_schema(want, Some(have), out);
        }
        (Directive::Schema(want), _) => diff_schema(want, None, out),
        (Directive::DatabasePrivilege(want), Some(Directive::DatabasePrivilege(have))) => {
            diff_privilege(want, Some(have), out);
        }
        (Directive::DatabasePrivilege(want), _) => diff_privilege(want, None, out),
    }
}

fn diff_group(want: &Group, current: &CurrentState, out: &mut Vec<Operation>) {
    let name = want.name().to_string();
    match (want.present, current.role(want.name()).is_some()) {
        (true, false) => out.push(Operation::CreateGroup { name }),
        (true, true) if current.can_login(want.name()) => {
            out.push(Operation::AlterRoleLogin { name, login: false });
        }
        (false, true) => out.push(Operation::DropGroup { name }),
        _ => {}
    }
}

fn diff_user(want: &User, current: &CurrentState, out: &mut Vec<Operation>) {
    let name = want.name().to_string();
    // A role filed as a group carries no membership or password details.
    let bare;
    let have = match current.role(want.name()) {
        Some(Directive::User(user)) => Some(user),
        Some(_) => {
            bare = User {
                name: name.clone(),
                password: None,
                groups: Vec::new(),
                present: true,
            };
            Some(&bare)
        }
        None => None,
    };

    if want.present && have.is_some() && !current.can_login(want.name()) {
        out.push(Operation::AlterRoleLogin {
            name: name.clone(),
            login: true,
        });
    }

    match (want.present, have) {
        (true, None) => out.push(Operation::CreateUser {
            name,
            password: want.password.clone(),
            groups: want.groups.clone(),
        }),
        (true, Some(have)) => {
            if let Some(password) = &want.password
                && !want.password_matches(have.password.as_ref())
            {
                out.push(Operation::AlterUserPassword {
                    name: name.clone(),
                    password: password.clone(),
                });
            }
            let grant: Vec<String> = want
                .groups
                .iter()
                .filter(|g| !have.groups.contains(g))
                .cloned()
                .collect();
            if !grant.is_empty() {
                out.push(Operation::GrantMembership {
                    user: name.clone(),
                    groups: grant,
                });
            }
            let revoke: Vec<String> = have
                .groups
                .iter()
                .filter(|g| !want.groups.contains(g))
                .cloned()
                .collect();
            if !revoke.is_empty() {
                out.push(Operation::RevokeMembership {
                    user: name,
                    groups: revoke,
                });
            }
        }
        (false, Some(_)) => out.push(Operation::DropUser { name }),
        (false, None) => {}
    }
}

fn diff_database(want: &Database, have: Option<&Database>, out: &mut Vec<Operation>) {
    let name = want.name().to_string();
    match (want.present, have) {
        (true, None) => out.push(Operation::CreateDatabase {
            name,
            owner: want.owner.clone(),
        }),
        (true, Some(have)) => {
            if let Some(owner) = owner_change(want.owner(), have.owner()) {
                out.push(Operation::AlterDatabaseOwner { name, owner });
            }
        }
        (false, Some(_)) => out.push(Operation::DropDatabase { name }),
        (false, None) => {}
    }
}

fn diff_schema(want: &Schema, have: Option<&Schema>, out: &mut Vec<Operation>) {
    let database = want.database().to_string();
    let name = want.name().to_string();
    match (want.present, have) {
        (true, None) => out.push(Operation::CreateSchema {
            database,
            name,
            owner: want.owner.clone(),
        }),
        (true, Some(have)) => {
            if let Some(owner) = owner_change(want.owner(), have.owner()) {
                out.push(Operation::AlterSchemaOwner {
                    database,
                    name,
                    owner,
                });
            }
        }
        (false, Some(_)) => out.push(Operation::DropSchema { database, name }),
        (false, None) => {}
    }
}

fn diff_privilege(
    want: &DatabasePrivilege,
    have: Option<&DatabasePrivilege>,
    out: &mut Vec<Operation>,
) {
    let database = want.database().to_string();
    let group = want.group().to_string();
    match (want.present, have) {
        (true, None) => out.push(Operation::GrantPrivileges {
            database,
            group,
            privileges: want.privileges.clone(),
            initial: true,
        }),
        (true, Some(have)) => {
            let grant: BTreeSet<Privilege> =
                want.privileges.difference(&have.privileges).copied().collect();
            let revoke: BTreeSet<Privilege> =
                have.privileges.difference(&want.privileges).copied().collect();
            if !grant.is_empty() {
                out.push(Operation::GrantPrivileges {
                    database: database.clone(),
                    group: group.clone(),
                    privileges: grant,
                    initial: false,
                });
            }
            if !revoke.is_empty() {
                out.push(Operation::RevokePrivileges {
                    database,
                    group,
                    privileges: revoke,
                    all: false,
                });
            }
        }
        (false, Some(have)) => out.push(Operation::RevokePrivileges {
            database,
            group,
            privileges: have.privileges.clone(),
            all: true,
        }),
        (false, None) => {}
    }
}

fn owner_change(want: Option<&str>, have: Option<&str>) -> Option<String> {
    match want {
        Some(owner) if Some(owner) != have => Some(owner.to_string()),
        _ => None,
    }
}
