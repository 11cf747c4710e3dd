//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::admin::SurrealAdmin;
use crate::error::DbError;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL (e.g., `ws://127.0.0.1:8000`, `mem://`).
    pub url: String,
    /// Namespace holding the control tables and tenant schemas.
    pub namespace: String,
    /// Database holding the control tables.
    pub database: String,
    /// Root username. Embedded engines run without credentials.
    pub username: Option<String>,
    /// Root password.
    pub password: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "kapok".into(),
            database: "control".into(),
            username: Some("root".into()),
            password: Some("root".into()),
        }
    }
}

impl DbConfig {
    /// Configuration for an in-memory instance.
    pub fn memory() -> Self {
        Self {
            url: "mem://".into(),
            username: None,
            password: None,
            ..Self::default()
        }
    }

    /// Load from `KAPOK_DB_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("KAPOK_DB_URL").unwrap_or(defaults.url),
            namespace: std::env::var("KAPOK_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: std::env::var("KAPOK_DB_DATABASE").unwrap_or(defaults.database),
            username: std::env::var("KAPOK_DB_USER").ok().or(defaults.username),
            password: std::env::var("KAPOK_DB_PASSWORD").ok().or(defaults.password),
        }
    }
}

/// Open a client to the configured endpoint, authenticating as root
/// when credentials are present. No namespace is selected.
pub(crate) async fn open(config: &DbConfig) -> Result<Surreal<Any>, DbError> {
    let db = any::connect(config.url.as_str()).await?;

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        db.signin(Root {
            username: username.clone(),
            password: password.clone(),
        })
        .await?;
    }

    Ok(db)
}

/// Manages the control-plane connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
    config: DbConfig,
}

impl DbManager {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Selects the configured namespace and database and returns a
    /// ready-to-use manager.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = open(config).await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self {
            db,
            config: config.clone(),
        })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Server administration handle sharing this manager's connection.
    pub fn admin(&self) -> SurrealAdmin {
        SurrealAdmin::new(self.db.clone(), self.config.clone())
    }
}
