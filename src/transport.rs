//! Cluster transport over the `postgres` client
//!
//! Statements go through the simple query protocol, so catalog rows arrive as
//! text, which is what the provisioning core expects.

use log::debug;
use postgres::{Client, NoTls, SimpleQueryMessage};
use provision::{Connection, Connector, Row, TransportError};

use crate::config::ConnectionConfig;

const APPLICATION_NAME: &str = "pgo";

/// Opens one client per database with the configured credentials.
pub struct PgConnector {
    config: ConnectionConfig,
}

impl PgConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    fn client_config(&self, database: &str) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.config.host)
            .port(self.config.port)
            .user(&self.config.user)
            .dbname(database)
            .application_name(APPLICATION_NAME);
        if !self.config.password.is_empty() {
            config.password(&self.config.password);
        }
        config
    }
}

impl Connector for PgConnector {
    fn default_database(&self) -> &str {
        &self.config.database
    }

    fn connect(&self, database: &str) -> Result<Box<dyn Connection>, TransportError> {
        debug!(
            "Connecting to {}:{} as {} (database {database})",
            self.config.host, self.config.port, self.config.user
        );
        let client = self
            .client_config(database)
            .connect(NoTls)
            .map_err(|e| TransportError::Unreachable(describe(&e)))?;
        Ok(Box::new(PgConnection { client }))
    }
}

struct PgConnection {
    client: Client,
}

impl Connection for PgConnection {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, TransportError> {
        let messages = self.client.simple_query(sql).map_err(classify)?;
        Ok(messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => {
                    Some((0..row.len()).map(|i| row.get(i)).collect::<Row>())
                }
                _ => None,
            })
            .collect())
    }

    fn execute(&mut self, sql: &str) -> Result<(), TransportError> {
        self.client.batch_execute(sql).map_err(classify)
    }
}

/// A closed connection means the cluster went away; anything else is the
/// backend refusing the statement.
fn classify(err: postgres::Error) -> TransportError {
    if err.is_closed() {
        TransportError::Unreachable(describe(&err))
    } else {
        TransportError::Rejected(describe(&err))
    }
}

fn describe(err: &postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{}: {}", db.severity(), db.message()),
        None => err.to_string(),
    }
}
