//! Directive model
//!
//! A directive declares the desired state of one cluster object together
//! with a presence flag. Directives are closed over five kinds and are
//! immutable once constructed: fields are only reachable through accessors.
//!
//! Construction validates local shape only (names, privilege tokens).
//! Cross-references are checked by the [`order`](crate::order) module.

use crate::error::{Error, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Longest identifier the cluster accepts without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// The kinds of object a directive can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Group,
    User,
    Database,
    Schema,
    DatabasePrivilege,
}

impl ObjectKind {
    /// Order in which kinds are created. Removal uses the exact reverse.
    pub const CREATION_ORDER: [ObjectKind; 5] = [
        ObjectKind::Group,
        ObjectKind::User,
        ObjectKind::Database,
        ObjectKind::Schema,
        ObjectKind::DatabasePrivilege,
    ];

    /// Position of this kind in [`Self::CREATION_ORDER`].
    pub fn creation_rank(self) -> usize {
        match self {
            Self::Group => 0,
            Self::User => 1,
            Self::Database => 2,
            Self::Schema => 3,
            Self::DatabasePrivilege => 4,
        }
    }

    /// Position of this kind in the removal order.
    pub fn removal_rank(self) -> usize {
        Self::CREATION_ORDER.len() - 1 - self.creation_rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
            Self::Database => "database",
            Self::Schema => "schema",
            Self::DatabasePrivilege => "database privilege",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an object, unique per kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    Group(String),
    User(String),
    Database(String),
    Schema { database: String, name: String },
    DatabasePrivilege { database: String, group: String },
}

impl ObjectKey {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Group(_) => ObjectKind::Group,
            Self::User(_) => ObjectKind::User,
            Self::Database(_) => ObjectKind::Database,
            Self::Schema { .. } => ObjectKind::Schema,
            Self::DatabasePrivilege { .. } => ObjectKind::DatabasePrivilege,
        }
    }

    /// Human-readable identity without the kind prefix.
    pub fn identity(&self) -> String {
        match self {
            Self::Group(name) | Self::User(name) | Self::Database(name) => name.clone(),
            Self::Schema { database, name } => format!("{database}.{name}"),
            Self::DatabasePrivilege { database, group } => format!("{database}/{group}"),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.identity())
    }
}

/// A database-level privilege token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Privilege {
    Create,
    Connect,
    Temporary,
}

impl Privilege {
    pub const ALL: [Privilege; 3] = [Privilege::Create, Privilege::Connect, Privilege::Temporary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Connect => "CONNECT",
            Self::Temporary => "TEMPORARY",
        }
    }

    /// Parse a list of tokens, expanding `ALL` and the `TEMP` alias.
    pub fn parse_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<BTreeSet<Privilege>> {
        let mut set = BTreeSet::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.eq_ignore_ascii_case("ALL") || token.eq_ignore_ascii_case("ALL PRIVILEGES") {
                set.extend(Self::ALL);
            } else {
                set.insert(token.parse()?);
            }
        }
        Ok(set)
    }
}

impl FromStr for Privilege {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "CONNECT" => Ok(Self::Connect),
            "TEMP" | "TEMPORARY" => Ok(Self::Temporary),
            other => Err(Error::validation(format!(
                "unknown database privilege '{other}' (expected CREATE, CONNECT, TEMP or ALL)"
            ))),
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the md5 role-password hash: `"md5" + hex(md5(password ++ username))`.
pub fn md5_role_password(username: &str, password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    format!("md5{:x}", hasher.finalize())
}

/// A role password, either plaintext (hashed at execution time) or already hashed.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    Plain(String),
    Hashed(String),
}

impl Password {
    /// Classify a password string. Values that already look like a stored
    /// md5 or SCRAM verifier are kept as-is.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let is_md5 = value.len() == 35
            && value.starts_with("md5")
            && value[3..].chars().all(|c| c.is_ascii_hexdigit());
        if is_md5 || value.starts_with("SCRAM-SHA-256$") {
            Self::Hashed(value)
        } else {
            Self::Plain(value)
        }
    }

    /// The form stored by the cluster for `username`.
    pub fn hashed(&self, username: &str) -> String {
        match self {
            Self::Plain(plain) => md5_role_password(username, plain),
            Self::Hashed(hash) => hash.clone(),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Password::Plain(<redacted>)"),
            Self::Hashed(_) => f.write_str("Password::Hashed(<redacted>)"),
        }
    }
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation(format!("{what} name must not be empty")));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::validation(format!(
            "{what} name '{name}' is longer than {MAX_IDENTIFIER_LEN} bytes"
        )));
    }
    if name.contains('\0') {
        return Err(Error::validation(format!(
            "{what} name '{}' contains a NUL byte",
            name.escape_debug()
        )));
    }
    Ok(())
}

fn check_owner(owner: Option<&str>) -> Result<()> {
    match owner {
        Some(owner) => check_name("owner", owner),
        None => Ok(()),
    }
}

/// A role acting as a group (cannot log in).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub(crate) name: String,
    pub(crate) present: bool,
}

impl Group {
    pub fn new(name: impl Into<String>, present: bool) -> Result<Self> {
        let name = name.into();
        check_name("group", &name)?;
        Ok(Self { name, present })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A role acting as a login user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub(crate) name: String,
    pub(crate) password: Option<Password>,
    pub(crate) groups: Vec<String>,
    pub(crate) present: bool,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        password: Option<Password>,
        groups: impl IntoIterator<Item = impl Into<String>>,
        present: bool,
    ) -> Result<Self> {
        let name = name.into();
        check_name("user", &name)?;
        let mut unique = Vec::new();
        for group in groups {
            let group = group.into();
            check_name("group", &group)?;
            if !unique.contains(&group) {
                unique.push(group);
            }
        }
        Ok(Self {
            name,
            password,
            groups: unique,
            present,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> Option<&Password> {
        self.password.as_ref()
    }

    /// Group memberships in declared order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Whether the stored password already matches this directive's password.
    /// A directive without a password accepts whatever is stored.
    pub fn password_matches(&self, stored: Option<&Password>) -> bool {
        match (&self.password, stored) {
            (None, _) => true,
            (Some(wanted), Some(stored)) => wanted.hashed(&self.name) == stored.hashed(&self.name),
            (Some(_), None) => false,
        }
    }
}

/// A database with an optional owning role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub(crate) name: String,
    pub(crate) owner: Option<String>,
    pub(crate) present: bool,
}

impl Database {
    pub fn new(name: impl Into<String>, owner: Option<String>, present: bool) -> Result<Self> {
        let name = name.into();
        check_name("database", &name)?;
        check_owner(owner.as_deref())?;
        Ok(Self {
            name,
            owner,
            present,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

/// A schema inside a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub(crate) database: String,
    pub(crate) name: String,
    pub(crate) owner: Option<String>,
    pub(crate) present: bool,
}

impl Schema {
    pub fn new(
        database: impl Into<String>,
        name: impl Into<String>,
        owner: Option<String>,
        present: bool,
    ) -> Result<Self> {
        let database = database.into();
        let name = name.into();
        check_name("database", &database)?;
        check_name("schema", &name)?;
        check_owner(owner.as_deref())?;
        Ok(Self {
            database,
            name,
            owner,
            present,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

/// Database-level privileges granted to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePrivilege {
    pub(crate) database: String,
    pub(crate) group: String,
    pub(crate) privileges: BTreeSet<Privilege>,
    pub(crate) present: bool,
}

impl DatabasePrivilege {
    pub fn new<S: AsRef<str>>(
        database: impl Into<String>,
        group: impl Into<String>,
        privileges: &[S],
        present: bool,
    ) -> Result<Self> {
        let database = database.into();
        let group = group.into();
        check_name("database", &database)?;
        check_name("group", &group)?;
        let privileges = Privilege::parse_tokens(privileges)?;
        if present && privileges.is_empty() {
            return Err(Error::validation(format!(
                "privileges on database '{database}' for '{group}' must name at least one token"
            )));
        }
        Ok(Self {
            database,
            group,
            privileges,
            present,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn privileges(&self) -> &BTreeSet<Privilege> {
        &self.privileges
    }
}

/// Something a directive refers to by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A role, declared either as a group or as a user
    Role(String),
    Database(String),
}

impl Reference {
    pub fn name(&self) -> &str {
        match self {
            Self::Role(name) | Self::Database(name) => name,
        }
    }
}

/// A desired-state declaration for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Group(Group),
    User(User),
    Database(Database),
    Schema(Schema),
    DatabasePrivilege(DatabasePrivilege),
}

impl Directive {
    pub fn key(&self) -> ObjectKey {
        match self {
            Self::Group(g) => ObjectKey::Group(g.name.clone()),
            Self::User(u) => ObjectKey::User(u.name.clone()),
            Self::Database(d) => ObjectKey::Database(d.name.clone()),
            Self::Schema(s) => ObjectKey::Schema {
                database: s.database.clone(),
                name: s.name.clone(),
            },
            Self::DatabasePrivilege(p) => ObjectKey::DatabasePrivilege {
                database: p.database.clone(),
                group: p.group.clone(),
            },
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Group(_) => ObjectKind::Group,
            Self::User(_) => ObjectKind::User,
            Self::Database(_) => ObjectKind::Database,
            Self::Schema(_) => ObjectKind::Schema,
            Self::DatabasePrivilege(_) => ObjectKind::DatabasePrivilege,
        }
    }

    /// Whether the object should exist.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Group(g) => g.present,
            Self::User(u) => u.present,
            Self::Database(d) => d.present,
            Self::Schema(s) => s.present,
            Self::DatabasePrivilege(p) => p.present,
        }
    }

    /// Names this directive depends on.
    pub fn references(&self) -> Vec<Reference> {
        match self {
            Self::Group(_) => Vec::new(),
            Self::User(u) => u.groups.iter().cloned().map(Reference::Role).collect(),
            Self::Database(d) => d.owner.iter().cloned().map(Reference::Role).collect(),
            Self::Schema(s) => {
                let mut refs = vec![Reference::Database(s.database.clone())];
                refs.extend(s.owner.iter().cloned().map(Reference::Role));
                refs
            }
            Self::DatabasePrivilege(p) => vec![
                Reference::Database(p.database.clone()),
                Reference::Role(p.group.clone()),
            ],
        }
    }

    /// Attribute-diff predicate: true when `current` already satisfies every
    /// attribute this directive cares about. Directives of different kinds
    /// never converge with each other.
    pub fn converged_with(&self, current: &Directive) -> bool {
        match (self, current) {
            (Self::Group(_), Self::Group(_)) => true,
            (Self::User(want), Self::User(have)) => {
                want.password_matches(have.password.as_ref())
                    && same_members(&want.groups, &have.groups)
            }
            (Self::Database(want), Self::Database(have)) => {
                owner_matches(want.owner.as_deref(), have.owner.as_deref())
            }
            (Self::Schema(want), Self::Schema(have)) => {
                owner_matches(want.owner.as_deref(), have.owner.as_deref())
            }
            (Self::DatabasePrivilege(want), Self::DatabasePrivilege(have)) => {
                want.privileges == have.privileges
            }
            _ => false,
        }
    }
}

fn same_members(want: &[String], have: &[String]) -> bool {
    let want: BTreeSet<&String> = want.iter().collect();
    let have: BTreeSet<&String> = have.iter().collect();
    want == have
}

fn owner_matches(want: Option<&str>, have: Option<&str>) -> bool {
    want.is_none() || want == have
}
