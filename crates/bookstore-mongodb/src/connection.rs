//! MongoDB connection management with pool configuration
//!
//! A `Connection` is acquired once per run and must be released with
//! [`Connection::close`] on every exit path.

use crate::store::MongoBookStore;
use crate::validation::{ValidatedCollectionName, ValidatedDatabaseName};
use bookstore_common::{BookstoreError, Result};
use bson::doc;
use mongodb::{
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Database,
};
use std::time::Duration;
use tracing::{debug, info};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Minimum number of connections in the pool
    pub min_pool_size: Option<u32>,
    /// Maximum number of connections in the pool
    pub max_pool_size: Option<u32>,
    /// Maximum time a connection can remain idle before being closed
    pub max_idle_time: Option<Duration>,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout (default: 30s)
    pub server_selection_timeout: Option<Duration>,
    /// Application name for server logs
    pub app_name: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // Steps run one at a time, so a single connection is enough
        Self {
            min_pool_size: None,
            max_pool_size: Some(1),
            max_idle_time: None,
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            app_name: Some("bookstore".to_string()),
        }
    }
}

/// Client plus the selected database
pub struct Connection {
    client: Client,
    database: Database,
}

impl Connection {
    /// Connect with default pool settings
    pub async fn open(connection_string: &str, database: &ValidatedDatabaseName) -> Result<Self> {
        Self::with_config(connection_string, database, PoolConfig::default()).await
    }

    /// Connect with a custom pool configuration and confirm the server answers
    ///
    /// The driver connects lazily, so a `ping` is issued here to surface bad
    /// addresses or credentials at startup rather than on the first step.
    pub async fn with_config(
        connection_string: &str,
        database: &ValidatedDatabaseName,
        config: PoolConfig,
    ) -> Result<Self> {
        let mut client_options = ClientOptions::parse(connection_string)
            .await
            .map_err(|e| BookstoreError::Connection(e.to_string()))?;

        if let Some(min) = config.min_pool_size {
            client_options.min_pool_size = Some(min);
        }
        if let Some(max) = config.max_pool_size {
            client_options.max_pool_size = Some(max);
        }
        if let Some(idle) = config.max_idle_time {
            client_options.max_idle_time = Some(idle);
        }
        if let Some(connect) = config.connect_timeout {
            client_options.connect_timeout = Some(connect);
        }
        if let Some(server_sel) = config.server_selection_timeout {
            client_options.server_selection_timeout = Some(server_sel);
        }
        if let Some(app) = config.app_name {
            client_options.app_name = Some(app);
        }

        // Set stable API version for compatibility
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        let client = Client::with_options(client_options)
            .map_err(|e| BookstoreError::Connection(e.to_string()))?;
        let connection = Self {
            database: client.database(database.as_str()),
            client,
        };

        let ping = connection.ping().await;
        if let Err(e) = ping {
            connection.close().await;
            return Err(e);
        }

        info!(database = database.as_str(), "connected to MongoDB");
        Ok(connection)
    }

    /// Get a reference to the database
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get the database name
    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Store over one collection of the selected database
    pub fn book_store(&self, collection: &ValidatedCollectionName) -> MongoBookStore {
        MongoBookStore::new(&self.database, collection.as_str())
    }

    /// Check that the server answers
    pub async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| BookstoreError::Connection(format!("Ping failed: {}", e)))
    }

    /// Release the client and its pooled connections
    pub async fn close(self) {
        self.client.shutdown().await;
        debug!("MongoDB client shut down");
    }
}
