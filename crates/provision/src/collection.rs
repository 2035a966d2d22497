//! Frozen, validated collection of directives.

use crate::directive::{Directive, ObjectKey};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// The desired state for one run, in declared order.
///
/// Building a set rejects duplicate identity keys and role names declared
/// both as a group and as a user. Once built the set is read-only.
#[derive(Debug, Clone, Default)]
pub struct DirectiveSet {
    directives: Vec<Directive>,
    index: BTreeMap<ObjectKey, usize>,
}

impl DirectiveSet {
    pub fn new(directives: Vec<Directive>) -> Result<Self> {
        let mut index = BTreeMap::new();
        let mut groups = BTreeSet::new();
        let mut users = BTreeSet::new();

        for (position, directive) in directives.iter().enumerate() {
            let key = directive.key();
            match directive {
                Directive::Group(g) => {
                    groups.insert(g.name().to_string());
                }
                Directive::User(u) => {
                    users.insert(u.name().to_string());
                }
                _ => {}
            }
            if index.insert(key.clone(), position).is_some() {
                return Err(Error::validation(format!("{key} is declared more than once")));
            }
        }

        if let Some(name) = groups.intersection(&users).next() {
            return Err(Error::validation(format!(
                "role '{name}' is declared both as a group and as a user"
            )));
        }

        Ok(Self { directives, index })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Directive> {
        self.directives.iter()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Directive> {
        self.index.get(key).map(|&i| &self.directives[i])
    }

    /// Look up a role directive by name, whichever kind declares it.
    pub fn role(&self, name: &str) -> Option<&Directive> {
        self.get(&ObjectKey::Group(name.to_string()))
            .or_else(|| self.get(&ObjectKey::User(name.to_string())))
    }

    /// Every role name the collection declares or refers to.
    pub fn role_names(&self) -> BTreeSet<String> {
        use crate::directive::Reference;

        let mut names = BTreeSet::new();
        for directive in &self.directives {
            match directive {
                Directive::Group(g) => {
                    names.insert(g.name().to_string());
                }
                Directive::User(u) => {
                    names.insert(u.name().to_string());
                }
                _ => {}
            }
            for reference in directive.references() {
                if let Reference::Role(name) = reference {
                    names.insert(name);
                }
            }
        }
        names
    }

    /// Every database name the collection declares or refers to.
    pub fn database_names(&self) -> BTreeSet<String> {
        use crate::directive::Reference;

        let mut names = BTreeSet::new();
        for directive in &self.directives {
            if let Directive::Database(d) = directive {
                names.insert(d.name().to_string());
            }
            for reference in directive.references() {
                if let Reference::Database(name) = reference {
                    names.insert(name);
                }
            }
        }
        names
    }
}

impl<'a> IntoIterator for &'a DirectiveSet {
    type Item = &'a Directive;
    type IntoIter = std::slice::Iter<'a, Directive>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
