//! Dependency orderer
//!
//! Kinds are created in [`CREATION_ORDER`](crate::ObjectKind::CREATION_ORDER) and removed in the
//! exact reverse. A plan runs every removal-direction operation first, then
//! every creation-direction operation; within a kind the declared order of
//! the collection is kept.
//!
//! Ownership changes always run with the removals, so a role gives up what
//! it owns before it is dropped. A role created in the same run that receives
//! ownership is therefore created ahead of the removals, together with any
//! new group it joins.

use crate::collection::DirectiveSet;
use crate::directive::{Directive, ObjectKey, Reference};
use crate::error::{Error, Result};
use crate::operation::{Direction, Operation};
use crate::state::CurrentState;
use std::collections::{BTreeMap, BTreeSet};

/// Check that every reference made by a present directive resolves.
///
/// A reference resolves to a present directive in the same collection or,
/// when the name is not declared at all, to an object found in `current`.
/// When `current` was not loaded, undeclared names are assumed to exist.
pub fn validate(desired: &DirectiveSet, current: &CurrentState) -> Result<()> {
    for directive in desired.iter().filter(|d| d.is_present()) {
        for reference in directive.references() {
            check_reference(directive, &reference, desired, current)?;
        }
    }
    Ok(())
}

fn check_reference(
    directive: &Directive,
    reference: &Reference,
    desired: &DirectiveSet,
    current: &CurrentState,
) -> Result<()> {
    let declared = match reference {
        Reference::Role(name) => desired.role(name),
        Reference::Database(name) => desired.get(&ObjectKey::Database(name.clone())),
    };

    let failure = |reason: &str| Error::Dependency {
        from: directive.key(),
        to: reference.name().to_string(),
        reason: reason.to_string(),
    };

    match declared {
        Some(target) if target.is_present() => Ok(()),
        Some(_) => Err(failure("it is marked absent but still referenced")),
        None => {
            let exists = match reference {
                Reference::Role(name) => current.has_role(name),
                Reference::Database(name) => current.has_database(name),
            };
            if exists || !current.is_loaded() {
                Ok(())
            } else {
                Err(failure("it is neither declared nor present in the cluster"))
            }
        }
    }
}

/// Where an operation goes in the plan. Each slot carries the rank of the
/// operation's kind in that slot's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Slot {
    /// Creation of a role that receives ownership, before any removal
    Early(usize),
    /// Removal order
    Removal(usize),
    /// Creation order
    Creation(usize),
}

/// Slot of `operation`, given the roles that must be created early.
pub fn placement(operation: &Operation, early_roles: &BTreeSet<String>) -> Slot {
    let kind = operation.kind();
    match operation {
        Operation::CreateGroup { name } | Operation::CreateUser { name, .. }
            if early_roles.contains(name) =>
        {
            Slot::Early(kind.creation_rank())
        }
        _ if operation.new_owner().is_some() => Slot::Removal(kind.removal_rank()),
        _ => match operation.direction() {
            Direction::Removal => Slot::Removal(kind.removal_rank()),
            Direction::Creation => Slot::Creation(kind.creation_rank()),
        },
    }
}

/// Roles created by `operations` that must exist before the removals run:
/// every new owner, and the new groups those owners join.
pub fn early_roles(operations: &[Operation]) -> BTreeSet<String> {
    let created: BTreeMap<&str, &Operation> = operations
        .iter()
        .filter_map(|op| match op {
            Operation::CreateGroup { name } | Operation::CreateUser { name, .. } => {
                Some((name.as_str(), op))
            }
            _ => None,
        })
        .collect();

    let mut pending: Vec<&str> = operations
        .iter()
        .filter_map(Operation::new_owner)
        .filter(|owner| created.contains_key(owner))
        .collect();
    let mut early = BTreeSet::new();
    while let Some(name) = pending.pop() {
        if !early.insert(name.to_string()) {
            continue;
        }
        if let Some(Operation::CreateUser { groups, .. }) = created.get(name) {
            pending.extend(
                groups
                    .iter()
                    .map(String::as_str)
                    .filter(|group| created.contains_key(group)),
            );
        }
    }
    early
}

/// Arrange operations into plan order. The sort is stable, so operations
/// emitted in declared order keep that order within a kind.
pub fn arrange(mut operations: Vec<Operation>) -> Vec<Operation> {
    let early = early_roles(&operations);
    operations.sort_by_key(|op| placement(op, &early));
    operations
}
