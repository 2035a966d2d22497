//! Definition documents
//!
//! A definition lists the desired objects under `groups`, `users`,
//! `databases`, `schemas` and `database_privileges`. It is parsed into the
//! closed directive model here; a malformed document is a validation error
//! raised before the cluster is contacted.

use anyhow::{Context, Result};
use provision::{
    Database, DatabasePrivilege, Directive, DirectiveSet, Error, Group, Password, Schema, User,
};
use serde::Deserialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Serialization format of a definition document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    /// TOML for `.toml` files, JSON otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

const fn present() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Definition {
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
    #[serde(default)]
    pub schemas: Vec<SchemaEntry>,
    #[serde(default)]
    pub database_privileges: Vec<DatabasePrivilegeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default = "present")]
    pub present: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default = "present")]
    pub present: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseEntry {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "present")]
    pub present: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaEntry {
    pub database: String,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "present")]
    pub present: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabasePrivilegeEntry {
    pub database: String,
    pub group: String,
    #[serde(default)]
    pub privileges: Vec<String>,
    #[serde(default = "present")]
    pub present: bool,
}

impl Definition {
    pub fn parse(text: &str, format: Format) -> provision::Result<Self> {
        let parsed = match format {
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| Error::validation(format!("malformed definition: {e}")))
    }

    /// Convert into a frozen directive collection, kind by kind in the order
    /// the document lists them.
    pub fn into_directives(self) -> provision::Result<DirectiveSet> {
        let mut directives = Vec::new();

        for group in self.groups {
            directives.push(Directive::Group(Group::new(group.name, group.present)?));
        }
        for user in self.users {
            directives.push(Directive::User(User::new(
                user.name,
                user.password.map(Password::new),
                user.groups,
                user.present,
            )?));
        }
        for database in self.databases {
            directives.push(Directive::Database(Database::new(
                database.name,
                database.owner,
                database.present,
            )?));
        }
        for schema in self.schemas {
            directives.push(Directive::Schema(Schema::new(
                schema.database,
                schema.name,
                schema.owner,
                schema.present,
            )?));
        }
        for privilege in self.database_privileges {
            directives.push(Directive::DatabasePrivilege(DatabasePrivilege::new(
                privilege.database,
                privilege.group,
                privilege.privileges.as_slice(),
                privilege.present,
            )?));
        }

        DirectiveSet::new(directives)
    }
}

/// Read the definition argument: inline JSON, `-` for stdin, or a file path.
pub fn load(argument: &str) -> Result<DirectiveSet> {
    let (text, format) = read_source(argument)?;
    let definition = Definition::parse(&text, format)?;
    Ok(definition.into_directives()?)
}

fn read_source(argument: &str) -> Result<(String, Format)> {
    if argument.trim_start().starts_with('{') {
        return Ok((argument.to_string(), Format::Json));
    }

    if argument == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read definition from stdin")?;
        return Ok((text, Format::Json));
    }

    let path = PathBuf::from(shellexpand::tilde(argument).as_ref());
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Could not read definition {}", path.display()))?;
    Ok((text, Format::for_path(&path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision::ObjectKey;

    const EXAMPLE: &str = r#"{
        "groups": [
            {"name": "devops", "present": false},
            {"name": "datascience"}
        ],
        "users": [
            {"name": "johnny", "password": "johnny", "groups": ["datascience"], "present": false}
        ],
        "databases": [
            {"name": "datascience", "owner": "devops", "present": false},
            {"name": "existingdb"}
        ],
        "schemas": [
            {"database": "existingdb", "name": "existingschema", "owner": "devops", "present": false}
        ],
        "database_privileges": [
            {"database": "existingdb", "group": "datascience", "privileges": ["CONNECT", "TEMP"], "present": false}
        ]
    }"#;

    #[test]
    fn test_parse_json_example() {
        let set = Definition::parse(EXAMPLE, Format::Json)
            .unwrap()
            .into_directives()
            .unwrap();
        assert_eq!(set.len(), 7);

        let datascience = set.get(&ObjectKey::Group("datascience".into())).unwrap();
        assert!(datascience.is_present());
        let devops = set.get(&ObjectKey::Group("devops".into())).unwrap();
        assert!(!devops.is_present());
    }

    #[test]
    fn test_declared_order_is_kept() {
        let set = Definition::parse(EXAMPLE, Format::Json)
            .unwrap()
            .into_directives()
            .unwrap();
        let keys: Vec<String> = set.iter().map(|d| d.key().to_string()).collect();
        assert_eq!(keys[0], "group devops");
        assert_eq!(keys[1], "group datascience");
        assert_eq!(keys[2], "user johnny");
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
            [[groups]]
            name = "analysts"

            [[database_privileges]]
            database = "warehouse"
            group = "analysts"
            privileges = ["connect"]
        "#;
        let set = Definition::parse(text, Format::Toml)
            .unwrap()
            .into_directives()
            .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_unknown_key_is_validation_error() {
        let err = Definition::parse(r#"{"roles": []}"#, Format::Json).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_wrong_shape_is_validation_error() {
        let err = Definition::parse(r#"{"groups": [{"present": true}]}"#, Format::Json)
            .unwrap_err();
        assert!(err.to_string().contains("malformed definition"));
    }

    #[test]
    fn test_duplicate_is_validation_error() {
        let err = Definition::parse(
            r#"{"groups": [{"name": "ops"}, {"name": "ops", "present": false}]}"#,
            Format::Json,
        )
        .unwrap()
        .into_directives()
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_format_for_path() {
        assert_eq!(Format::for_path(Path::new("setup.toml")), Format::Toml);
        assert_eq!(Format::for_path(Path::new("setup.TOML")), Format::Toml);
        assert_eq!(Format::for_path(Path::new("setup.json")), Format::Json);
        assert_eq!(Format::for_path(Path::new("setup")), Format::Json);
    }

    #[test]
    fn test_load_inline_json() {
        let set = load(r#"{"groups": [{"name": "ops"}]}"#).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.toml");
        fs::write(&path, "[[groups]]\nname = \"ops\"\n").unwrap();
        let set = load(path.to_str().unwrap()).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load("/nonexistent/setup.json").unwrap_err();
        assert!(err.to_string().contains("Could not read definition"));
    }
}
