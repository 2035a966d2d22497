//! Subcommand implementations

pub mod apply;
pub mod inspect;
pub mod password;

use anyhow::Result;
use provision::DirectiveSet;

use crate::Context;
use crate::config::ConnectionConfig;
use crate::definition;
use crate::transport::PgConnector;

/// Parse the definition before anything else, then read the connection
/// details, so a malformed definition never reaches the cluster.
fn prepare(ctx: &Context, definition: &str) -> Result<(DirectiveSet, PgConnector)> {
    let directives = definition::load(definition)?;
    log::debug!("Definition holds {} directives", directives.len());
    let config = ConnectionConfig::from_env(&ctx.env_prefix)?;
    log::debug!("Connection settings: {config:?}");
    Ok((directives, PgConnector::new(config)))
}
