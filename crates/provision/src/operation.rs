//! Typed operations and their statements
//!
//! Every operation targets one object identity and renders exactly one
//! statement.

use crate::connection::{quote_ident, quote_literal};
use crate::directive::{ObjectKey, ObjectKind, Password, Privilege};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What an operation does to its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Create,
    Alter,
    Drop,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Alter => "alter",
            Self::Drop => "drop",
        })
    }
}

/// Which ordering list an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Runs in removal order, before anything is created
    Removal,
    /// Runs in creation order
    Creation,
}

/// A single typed change against the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateGroup {
        name: String,
    },
    DropGroup {
        name: String,
    },
    CreateUser {
        name: String,
        password: Option<Password>,
        groups: Vec<String>,
    },
    AlterUserPassword {
        name: String,
        password: Password,
    },
    /// Flip the login attribute of a role that exists under the other kind.
    AlterRoleLogin {
        name: String,
        login: bool,
    },
    GrantMembership {
        user: String,
        groups: Vec<String>,
    },
    RevokeMembership {
        user: String,
        groups: Vec<String>,
    },
    DropUser {
        name: String,
    },
    CreateDatabase {
        name: String,
        owner: Option<String>,
    },
    AlterDatabaseOwner {
        name: String,
        owner: String,
    },
    DropDatabase {
        name: String,
    },
    CreateSchema {
        database: String,
        name: String,
        owner: Option<String>,
    },
    AlterSchemaOwner {
        database: String,
        name: String,
        owner: String,
    },
    DropSchema {
        database: String,
        name: String,
    },
    /// `initial` is set when no privilege was held before.
    GrantPrivileges {
        database: String,
        group: String,
        privileges: BTreeSet<Privilege>,
        initial: bool,
    },
    /// `all` is set when every held privilege is being revoked.
    RevokePrivileges {
        database: String,
        group: String,
        privileges: BTreeSet<Privilege>,
        all: bool,
    },
}

impl Operation {
    pub fn key(&self) -> ObjectKey {
        match self {
            Self::CreateGroup { name } | Self::DropGroup { name } => ObjectKey::Group(name.clone()),
            Self::CreateUser { name, .. }
            | Self::AlterUserPassword { name, .. }
            | Self::DropUser { name } => ObjectKey::User(name.clone()),
            Self::AlterRoleLogin { name, login: true } => ObjectKey::User(name.clone()),
            Self::AlterRoleLogin { name, login: false } => ObjectKey::Group(name.clone()),
            Self::GrantMembership { user, .. } | Self::RevokeMembership { user, .. } => {
                ObjectKey::User(user.clone())
            }
            Self::CreateDatabase { name, .. }
            | Self::AlterDatabaseOwner { name, .. }
            | Self::DropDatabase { name } => ObjectKey::Database(name.clone()),
            Self::CreateSchema { database, name, .. }
            | Self::AlterSchemaOwner { database, name, .. }
            | Self::DropSchema { database, name } => ObjectKey::Schema {
                database: database.clone(),
                name: name.clone(),
            },
            Self::GrantPrivileges {
                database, group, ..
            }
            | Self::RevokePrivileges {
                database, group, ..
            } => ObjectKey::DatabasePrivilege {
                database: database.clone(),
                group: group.clone(),
            },
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.key().kind()
    }

    pub fn verb(&self) -> Verb {
        match self {
            Self::CreateGroup { .. }
            | Self::CreateUser { .. }
            | Self::CreateDatabase { .. }
            | Self::CreateSchema { .. }
            | Self::GrantPrivileges { initial: true, .. } => Verb::Create,
            Self::DropGroup { .. }
            | Self::DropUser { .. }
            | Self::DropDatabase { .. }
            | Self::DropSchema { .. }
            | Self::RevokePrivileges { all: true, .. } => Verb::Drop,
            Self::AlterUserPassword { .. }
            | Self::AlterRoleLogin { .. }
            | Self::GrantMembership { .. }
            | Self::RevokeMembership { .. }
            | Self::AlterDatabaseOwner { .. }
            | Self::AlterSchemaOwner { .. }
            | Self::GrantPrivileges { initial: false, .. }
            | Self::RevokePrivileges { all: false, .. } => Verb::Alter,
        }
    }

    /// Direction this operation takes on its own. The orderer moves
    /// ownership changes ahead of role drops.
    pub fn direction(&self) -> Direction {
        match self {
            Self::DropGroup { .. }
            | Self::DropUser { .. }
            | Self::RevokeMembership { .. }
            | Self::DropDatabase { .. }
            | Self::DropSchema { .. }
            | Self::RevokePrivileges { .. } => Direction::Removal,
            _ => Direction::Creation,
        }
    }

    /// New owner named by an ownership change, if this is one.
    pub fn new_owner(&self) -> Option<&str> {
        match self {
            Self::AlterDatabaseOwner { owner, .. } | Self::AlterSchemaOwner { owner, .. } => {
                Some(owner)
            }
            _ => None,
        }
    }

    /// Database the statement must run in. `None` means any connection.
    pub fn database(&self) -> Option<&str> {
        match self {
            Self::CreateSchema { database, .. }
            | Self::AlterSchemaOwner { database, .. }
            | Self::DropSchema { database, .. } => Some(database),
            _ => None,
        }
    }

    /// The statement to transmit.
    pub fn statement(&self) -> String {
        self.render(false)
    }

    /// The statement with password material masked, for logs and reports.
    pub fn display_statement(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let password = |name: &str, password: &Password| {
            if redact {
                "'********'".to_string()
            } else {
                quote_literal(&password.hashed(name))
            }
        };

        match self {
            Self::CreateGroup { name } => format!("CREATE ROLE {}", quote_ident(name)),
            Self::DropGroup { name } => format!("DROP ROLE {}", quote_ident(name)),
            Self::CreateUser {
                name,
                password: pw,
                groups,
            } => {
                let mut sql = format!("CREATE USER {}", quote_ident(name));
                if let Some(pw) = pw {
                    sql.push_str(&format!(" WITH PASSWORD {}", password(name, pw)));
                }
                if !groups.is_empty() {
                    sql.push_str(&format!(" IN ROLE {}", ident_list(groups)));
                }
                sql
            }
            Self::AlterUserPassword { name, password: pw } => format!(
                "ALTER USER {} WITH PASSWORD {}",
                quote_ident(name),
                password(name, pw)
            ),
            Self::AlterRoleLogin { name, login } => format!(
                "ALTER ROLE {} {}",
                quote_ident(name),
                if *login { "LOGIN" } else { "NOLOGIN" }
            ),
            Self::GrantMembership { user, groups } => {
                format!("GRANT {} TO {}", ident_list(groups), quote_ident(user))
            }
            Self::RevokeMembership { user, groups } => {
                format!("REVOKE {} FROM {}", ident_list(groups), quote_ident(user))
            }
            Self::DropUser { name } => format!("DROP USER {}", quote_ident(name)),
            Self::CreateDatabase { name, owner } => match owner {
                Some(owner) => format!(
                    "CREATE DATABASE {} OWNER {}",
                    quote_ident(name),
                    quote_ident(owner)
                ),
                None => format!("CREATE DATABASE {}", quote_ident(name)),
            },
            Self::AlterDatabaseOwner { name, owner } => format!(
                "ALTER DATABASE {} OWNER TO {}",
                quote_ident(name),
                quote_ident(owner)
            ),
            Self::DropDatabase { name } => format!("DROP DATABASE {}", quote_ident(name)),
            Self::CreateSchema { name, owner, .. } => match owner {
                Some(owner) => format!(
                    "CREATE SCHEMA {} AUTHORIZATION {}",
                    quote_ident(name),
                    quote_ident(owner)
                ),
                None => format!("CREATE SCHEMA {}", quote_ident(name)),
            },
            Self::AlterSchemaOwner { name, owner, .. } => format!(
                "ALTER SCHEMA {} OWNER TO {}",
                quote_ident(name),
                quote_ident(owner)
            ),
            Self::DropSchema { name, .. } => format!("DROP SCHEMA {}", quote_ident(name)),
            Self::GrantPrivileges {
                database,
                group,
                privileges,
                ..
            } => format!(
                "GRANT {} ON DATABASE {} TO {}",
                privilege_list(privileges),
                quote_ident(database),
                quote_ident(group)
            ),
            Self::RevokePrivileges {
                database,
                group,
                privileges,
                ..
            } => format!(
                "REVOKE {} ON DATABASE {} FROM {}",
                privilege_list(privileges),
                quote_ident(database),
                quote_ident(group)
            ),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.key())
    }
}

fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn privilege_list(privileges: &BTreeSet<Privilege>) -> String {
    privileges
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
