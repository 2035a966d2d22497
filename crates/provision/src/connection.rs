//! Connection seam
//!
//! The core never speaks the wire protocol itself. A [`Connector`] opens
//! [`Connection`]s that run textual statements, and a [`Session`] owns every
//! connection used during one run.

use crate::error::{Error, Result};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// A row returned by a catalog query, as text columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Vec<Option<String>>) -> Self {
        Self { columns }
    }

    /// Column value, or `None` when the column is SQL NULL or out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|c| c.as_deref())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<Option<S>> for Row {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|c| c.map(Into::into)).collect())
    }
}

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The cluster could not be reached, or authentication failed
    Unreachable(String),
    /// The backend rejected the statement
    Rejected(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(msg) | Self::Rejected(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// A live handle to one database of the cluster.
pub trait Connection {
    /// Run a read query and return its rows.
    fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, TransportError>;

    /// Run a statement that returns no rows.
    fn execute(&mut self, sql: &str) -> std::result::Result<(), TransportError>;
}

/// Factory for connections, one per database.
///
/// Implement this trait to plug in a transport. The core only ever holds the
/// connections it opens for the duration of a single run.
pub trait Connector {
    /// Database the primary connection is opened against.
    fn default_database(&self) -> &str;

    /// Open a connection to `database`.
    fn connect(&self, database: &str) -> std::result::Result<Box<dyn Connection>, TransportError>;
}

/// Quote an identifier: `my"role` becomes `"my""role"`.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal: `it's` becomes `'it''s'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a parenthesised list of literals for an `IN` clause.
pub fn literal_list<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    let quoted: Vec<String> = values.into_iter().map(|v| quote_literal(v)).collect();
    format!("({})", quoted.join(", "))
}

/// All connections held during one run.
///
/// The primary connection is opened lazily against the connector's default
/// database; connections to other databases are opened on demand and kept
/// until released. Everything is dropped with the session.
pub struct Session<'a> {
    connector: &'a dyn Connector,
    connections: BTreeMap<String, Box<dyn Connection>>,
}

impl<'a> Session<'a> {
    pub fn new(connector: &'a dyn Connector) -> Self {
        Self {
            connector,
            connections: BTreeMap::new(),
        }
    }

    /// Connection to `database`, or to the default database when `None`.
    pub fn on(&mut self, database: Option<&str>) -> Result<&mut dyn Connection> {
        let name = database
            .unwrap_or_else(|| self.connector.default_database())
            .to_string();
        if !self.connections.contains_key(&name) {
            debug!("Opening connection to database {name}");
            let connection = self
                .connector
                .connect(&name)
                .map_err(|e| Error::connection(format!("database '{name}': {e}")))?;
            self.connections.insert(name.clone(), connection);
        }
        match self.connections.get_mut(&name) {
            Some(connection) => Ok(connection.as_mut()),
            None => Err(Error::connection(format!(
                "database '{name}': connection was not retained"
            ))),
        }
    }

    /// Close any connection held to `database`.
    pub fn release(&mut self, database: &str) {
        if self.connections.remove(database).is_some() {
            debug!("Closed connection to database {database}");
        }
    }

    /// Number of open connections.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory cluster used by unit tests.

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared log of everything the fake cluster was asked to do.
    #[derive(Debug, Default)]
    pub struct Journal {
        pub connects: Vec<String>,
        pub queries: Vec<(String, String)>,
        pub statements: Vec<(String, String)>,
    }

    /// A canned catalog answer: the first rule whose needle appears in the
    /// query wins.
    #[derive(Debug, Clone)]
    pub struct Rule {
        pub database: Option<String>,
        pub needle: String,
        pub result: std::result::Result<Vec<Row>, TransportError>,
    }

    #[derive(Clone, Default)]
    pub struct FakeCluster {
        pub journal: Rc<RefCell<Journal>>,
        rules: Rc<RefCell<Vec<Rule>>>,
        fail_on: Rc<RefCell<Vec<(String, TransportError)>>>,
        refused: Rc<RefCell<Vec<String>>>,
        unreachable: bool,
    }

    impl FakeCluster {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        /// Answer queries containing `needle` with `rows`.
        pub fn answer(&self, needle: &str, rows: Vec<Vec<Option<&str>>>) -> &Self {
            self.answer_on(None, needle, rows)
        }

        /// Like [`Self::answer`], restricted to connections to `database`.
        pub fn answer_on(
            &self,
            database: Option<&str>,
            needle: &str,
            rows: Vec<Vec<Option<&str>>>,
        ) -> &Self {
            self.rules.borrow_mut().push(Rule {
                database: database.map(str::to_string),
                needle: needle.to_string(),
                result: Ok(rows.into_iter().map(|r| r.into_iter().collect()).collect()),
            });
            self
        }

        pub fn reject(&self, needle: &str, message: &str) -> &Self {
            self.rules.borrow_mut().push(Rule {
                database: None,
                needle: needle.to_string(),
                result: Err(TransportError::Rejected(message.to_string())),
            });
            self
        }

        /// Reject any statement containing `needle`.
        pub fn fail_statement(&self, needle: &str) -> &Self {
            self.fail_on.borrow_mut().push((
                needle.to_string(),
                TransportError::Rejected(format!("rejected: {needle}")),
            ));
            self
        }

        /// Lose the connection while running a statement containing `needle`.
        pub fn drop_connection_on(&self, needle: &str) -> &Self {
            self.fail_on.borrow_mut().push((
                needle.to_string(),
                TransportError::Unreachable("server closed the connection unexpectedly".into()),
            ));
            self
        }

        /// Refuse connections to `database`.
        pub fn refuse(&self, database: &str) -> &Self {
            self.refused.borrow_mut().push(database.to_string());
            self
        }

        pub fn statements(&self) -> Vec<String> {
            self.journal
                .borrow()
                .statements
                .iter()
                .map(|(_, s)| s.clone())
                .collect()
        }
    }

    struct FakeConnection {
        database: String,
        cluster: FakeCluster,
    }

    impl Connection for FakeConnection {
        fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, TransportError> {
            self.cluster
                .journal
                .borrow_mut()
                .queries
                .push((self.database.clone(), sql.to_string()));
            let rules = self.cluster.rules.borrow();
            let rule = rules.iter().find(|r| {
                sql.contains(&r.needle)
                    && r.database.as_ref().is_none_or(|db| *db == self.database)
            });
            match rule {
                Some(rule) => rule.result.clone(),
                None => Ok(Vec::new()),
            }
        }

        fn execute(&mut self, sql: &str) -> std::result::Result<(), TransportError> {
            if let Some((_, error)) = self
                .cluster
                .fail_on
                .borrow()
                .iter()
                .find(|(needle, _)| sql.contains(needle.as_str()))
            {
                return Err(error.clone());
            }
            self.cluster
                .journal
                .borrow_mut()
                .statements
                .push((self.database.clone(), sql.to_string()));
            Ok(())
        }
    }

    impl Connector for FakeCluster {
        fn default_database(&self) -> &str {
            "postgres"
        }

        fn connect(
            &self,
            database: &str,
        ) -> std::result::Result<Box<dyn Connection>, TransportError> {
            if self.unreachable || self.refused.borrow().iter().any(|db| db == database) {
                return Err(TransportError::Unreachable(
                    "connection refused".to_string(),
                ));
            }
            self.journal.borrow_mut().connects.push(database.to_string());
            Ok(Box::new(FakeConnection {
                database: database.to_string(),
                cluster: self.clone(),
            }))
        }
    }
}
