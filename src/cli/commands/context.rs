//! Connections shared by the rename commands.

use crate::core::indexer::{SchemaGeneration, SqliteIndex};
use crate::models::config::Config;
use crate::services::graphql::GraphQlClient;
use crate::Result;

/// Metadata service client and index store for one invocation.
pub struct RunContext {
    pub client: GraphQlClient,
    pub index: SqliteIndex,
}

/// Connect to the metadata service and open its index database.
///
/// The schema generation is detected once here and kept for the run.
pub fn connect(config: &Config) -> Result<RunContext> {
    let client = GraphQlClient::new(&config.server)?;
    let version = client.database_schema()?;
    let schema = SchemaGeneration::from_version(version);
    tracing::debug!("Database schema version {} ({:?})", version, schema);

    let database_path = match config.general.database_path {
        Some(ref path) => path.clone(),
        None => client.database_path()?,
    };
    let index = SqliteIndex::open(&database_path, schema)?;

    Ok(RunContext {
        client: client.with_schema(version),
        index,
    })
}
