//! State inspector
//!
//! Reads the system catalogs and builds a [`CurrentState`] limited to the
//! names the desired collection mentions. Only read queries are issued.

use crate::collection::DirectiveSet;
use crate::connection::{Connection, Row, Session, TransportError, literal_list};
use crate::directive::{DatabasePrivilege, Directive, Password, Privilege, User};
use crate::error::{Error, Result};
use crate::state::CurrentState;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Capture the current state of every object `desired` declares or refers to.
pub fn snapshot(session: &mut Session<'_>, desired: &DirectiveSet) -> Result<CurrentState> {
    let mut state = CurrentState::new();

    let roles = desired.role_names();
    let databases = desired.database_names();

    if !roles.is_empty() {
        load_roles(session.on(None)?, desired, &roles, &mut state)?;
    }
    if !databases.is_empty() {
        load_databases(session.on(None)?, &databases, &mut state)?;
    }
    load_schemas(session, desired, &mut state)?;
    load_privileges(session, desired, &mut state)?;

    debug!("Current state holds {} objects", state.len());
    Ok(state)
}

fn run_query(connection: &mut dyn Connection, sql: &str) -> Result<Vec<Row>> {
    debug!("Catalog query: {sql}");
    connection.query(sql).map_err(|e| match e {
        TransportError::Unreachable(message) => Error::connection(message),
        TransportError::Rejected(message) => Error::Introspection {
            query: sql.to_string(),
            message,
        },
    })
}

fn column<'r>(row: &'r Row, index: usize, sql: &str) -> Result<&'r str> {
    row.get(index).ok_or_else(|| Error::Introspection {
        query: sql.to_string(),
        message: format!("column {index} is unexpectedly NULL"),
    })
}

fn is_true(value: &str) -> bool {
    matches!(value, "t" | "true" | "on" | "1")
}

fn load_roles(
    connection: &mut dyn Connection,
    desired: &DirectiveSet,
    roles: &BTreeSet<String>,
    state: &mut CurrentState,
) -> Result<()> {
    let sql = format!(
        "SELECT rolname, rolcanlogin FROM pg_roles WHERE rolname IN {} ORDER BY rolname",
        literal_list(roles)
    );
    let mut users: BTreeMap<String, User> = BTreeMap::new();
    for row in run_query(connection, &sql)? {
        let name = column(&row, 0, &sql)?;
        let can_login = is_true(column(&row, 1, &sql)?);
        // Roles share one namespace. A declared role is filed under its
        // declared kind whatever its login attribute; others by the attribute.
        let as_user = match desired.role(name) {
            Some(Directive::User(_)) => true,
            Some(_) => false,
            None => can_login,
        };
        if as_user != can_login {
            debug!("Role {name} exists with the other login attribute");
            state.mark_login_mismatch(name);
        }
        if as_user {
            users.insert(
                name.to_string(),
                User {
                    name: name.to_string(),
                    password: None,
                    groups: Vec::new(),
                    present: true,
                },
            );
        } else {
            state.add_group(name);
        }
    }

    let wanted_users: BTreeSet<String> = desired
        .iter()
        .filter_map(|d| match d {
            Directive::User(u) if users.contains_key(u.name()) => Some(u.name().to_string()),
            _ => None,
        })
        .collect();

    if !wanted_users.is_empty() {
        let sql = format!(
            "SELECT m.rolname, r.rolname FROM pg_auth_members a \
             JOIN pg_roles m ON m.oid = a.member \
             JOIN pg_roles r ON r.oid = a.roleid \
             WHERE m.rolname IN {} ORDER BY m.rolname, r.rolname",
            literal_list(&wanted_users)
        );
        for row in run_query(connection, &sql)? {
            let member = column(&row, 0, &sql)?;
            let group = column(&row, 1, &sql)?;
            if let Some(user) = users.get_mut(member) {
                user.groups.push(group.to_string());
            }
        }
    }

    let with_password: BTreeSet<String> = desired
        .iter()
        .filter_map(|d| match d {
            Directive::User(u) if u.password().is_some() && wanted_users.contains(u.name()) => {
                Some(u.name().to_string())
            }
            _ => None,
        })
        .collect();

    if !with_password.is_empty() {
        let sql = format!(
            "SELECT rolname, rolpassword FROM pg_authid WHERE rolname IN {}",
            literal_list(&with_password)
        );
        for row in run_query(connection, &sql)? {
            let name = column(&row, 0, &sql)?;
            if let Some(user) = users.get_mut(name) {
                user.password = row.get(1).map(|hash| Password::Hashed(hash.to_string()));
            }
        }
    }

    for user in users.into_values() {
        state.add_user(user);
    }
    Ok(())
}

fn load_databases(
    connection: &mut dyn Connection,
    databases: &BTreeSet<String>,
    state: &mut CurrentState,
) -> Result<()> {
    let sql = format!(
        "SELECT datname, pg_get_userbyid(datdba) FROM pg_database WHERE datname IN {} ORDER BY datname",
        literal_list(databases)
    );
    for row in run_query(connection, &sql)? {
        let name = column(&row, 0, &sql)?;
        state.add_database(name, row.get(1).map(str::to_string));
    }
    Ok(())
}

fn load_schemas(
    session: &mut Session<'_>,
    desired: &DirectiveSet,
    state: &mut CurrentState,
) -> Result<()> {
    let mut by_database: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for directive in desired {
        if let Directive::Schema(s) = directive {
            by_database
                .entry(s.database().to_string())
                .or_default()
                .insert(s.name().to_string());
        }
    }

    for (database, names) in by_database {
        if !state.has_database(&database) {
            debug!("Database {database} does not exist yet, no schemas to read");
            continue;
        }
        let sql = format!(
            "SELECT nspname, pg_get_userbyid(nspowner) FROM pg_namespace WHERE nspname IN {} ORDER BY nspname",
            literal_list(&names)
        );
        let rows = run_query(session.on(Some(database.as_str()))?, &sql)?;
        for row in rows {
            let name = column(&row, 0, &sql)?;
            state.add_schema(&database, name, row.get(1).map(str::to_string));
        }
    }
    Ok(())
}

fn load_privileges(
    session: &mut Session<'_>,
    desired: &DirectiveSet,
    state: &mut CurrentState,
) -> Result<()> {
    let mut databases = BTreeSet::new();
    let mut groups = BTreeSet::new();
    for directive in desired {
        if let Directive::DatabasePrivilege(p) = directive {
            databases.insert(p.database().to_string());
            groups.insert(p.group().to_string());
        }
    }
    if databases.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "SELECT d.datname, r.rolname, a.privilege_type FROM pg_database d \
         CROSS JOIN LATERAL aclexplode(d.datacl) AS a \
         JOIN pg_roles r ON r.oid = a.grantee \
         WHERE d.datname IN {} AND r.rolname IN {} ORDER BY d.datname, r.rolname",
        literal_list(&databases),
        literal_list(&groups)
    );

    let mut grants: BTreeMap<(String, String), BTreeSet<Privilege>> = BTreeMap::new();
    for row in run_query(session.on(None)?, &sql)? {
        let database = column(&row, 0, &sql)?;
        let group = column(&row, 1, &sql)?;
        let token = column(&row, 2, &sql)?;
        match token.parse::<Privilege>() {
            Ok(privilege) => {
                grants
                    .entry((database.to_string(), group.to_string()))
                    .or_default()
                    .insert(privilege);
            }
            // A database ACL only holds CREATE, TEMPORARY and CONNECT.
            // Anything else is left untouched, never revoked.
            Err(_) => warn!("Ignoring unknown database privilege {token} on {database}"),
        }
    }

    for ((database, group), privileges) in grants {
        state.add_privilege(DatabasePrivilege {
            database,
            group,
            privileges,
            present: true,
        });
    }
    Ok(())
}
