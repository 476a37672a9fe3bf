//! Connection handle shared by the incident store and the vector index.
//!
//! Where the data lives is described by a [`DbTarget`]; `SurrealHandle`
//! connects to it, selects the incident-memory namespace and runs the schema
//! migrations before handing out backends.

use std::path::{Path, PathBuf};

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::surreal::{SurrealIncidentStore, SurrealVectorIndex};
use crate::Result;

pub const DEFAULT_NAMESPACE: &str = "incident_memory";
pub const DEFAULT_DATABASE: &str = "main";
pub const DEFAULT_LOCAL_PATH: &str = ".incident-memory/db";

/// Account used to sign in to a remote server.
#[derive(Clone, PartialEq, Eq)]
pub enum RemoteAuth {
    /// Server-wide root user
    Root { username: String, password: String },
    /// User scoped to the target namespace and database
    Database { username: String, password: String },
}

impl std::fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, username) = match self {
            Self::Root { username, .. } => ("Root", username),
            Self::Database { username, .. } => ("Database", username),
        };
        f.debug_struct(kind)
            .field("username", username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A SurrealDB server reached over the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// e.g. `wss://incidents.example.com`
    pub endpoint: String,
    pub auth: RemoteAuth,
    pub namespace: String,
    pub database: String,
}

impl RemoteConfig {
    pub fn new(endpoint: impl Into<String>, auth: RemoteAuth) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth,
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}

/// Where incident data is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    /// Process-local, lost on exit
    Memory,
    /// SurrealKV files under a directory
    Local(PathBuf),
    /// Any URL the SurrealDB client understands, without sign-in
    Url(String),
    /// Authenticated server
    Remote(RemoteConfig),
}

impl DbTarget {
    /// Resolve the target from the environment.
    ///
    /// - `SURREALDB_ENDPOINT` with `SURREALDB_USERNAME` and `SURREALDB_PASSWORD`
    ///   selects a remote server. `SURREALDB_ROOT=true` signs in as root;
    ///   `SURREALDB_NAMESPACE` and `SURREALDB_DATABASE` override the defaults.
    /// - otherwise `SURREALDB_URL` is used as-is
    /// - otherwise `INCIDENT_DB_PATH`, falling back to `.incident-memory/db`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        if let (Some(endpoint), Some(username), Some(password)) = (
            get("SURREALDB_ENDPOINT"),
            get("SURREALDB_USERNAME"),
            get("SURREALDB_PASSWORD"),
        ) {
            let root = get("SURREALDB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            let auth = if root {
                RemoteAuth::Root { username, password }
            } else {
                RemoteAuth::Database { username, password }
            };
            let mut remote = RemoteConfig::new(endpoint, auth);
            if let Some(ns) = get("SURREALDB_NAMESPACE") {
                remote = remote.with_namespace(ns);
            }
            if let Some(db) = get("SURREALDB_DATABASE") {
                remote = remote.with_database(db);
            }
            return Self::Remote(remote);
        }

        if let Some(url) = get("SURREALDB_URL") {
            return Self::Url(url);
        }

        Self::Local(
            get("INCIDENT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_PATH)),
        )
    }
}

/// Open connection with the schema in place.
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    #[instrument(skip_all, fields(target = ?target))]
    pub async fn connect(target: DbTarget) -> Result<Self> {
        let (url, remote) = match target {
            DbTarget::Memory => ("mem://".to_string(), None),
            DbTarget::Local(path) => {
                std::fs::create_dir_all(&path).map_err(|e| {
                    StateError::Connection(format!(
                        "cannot create database directory {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                (format!("surrealkv://{}", path.display()), None)
            }
            DbTarget::Url(url) => (url, None),
            DbTarget::Remote(remote) => (remote.endpoint.clone(), Some(remote)),
        };

        let db = surrealdb::engine::any::connect(url.as_str())
            .await
            .map_err(|e| StateError::Connection(format!("cannot reach {}: {}", url, e)))?;

        let (namespace, database) = match &remote {
            Some(remote) => {
                sign_in(&db, remote).await?;
                (remote.namespace.as_str(), remote.database.as_str())
            }
            None => (DEFAULT_NAMESPACE, DEFAULT_DATABASE),
        };
        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("cannot select {namespace}/{database}: {e}"))
            })?;

        migrations::init_schema(&db).await?;
        info!(%url, namespace, database, "Incident database ready");
        Ok(Self { db })
    }

    /// Fresh in-memory database.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect(DbTarget::Memory).await
    }

    /// SurrealKV database under `path`, created if missing.
    pub async fn connect_local(path: &Path) -> Result<Self> {
        Self::connect(DbTarget::Local(path.to_path_buf())).await
    }

    pub async fn connect_from_env() -> Result<Self> {
        let target = DbTarget::from_env();
        debug!(?target, "Resolved database target from environment");
        Self::connect(target).await
    }

    pub fn incident_store(&self) -> SurrealIncidentStore {
        SurrealIncidentStore::new(self.db.clone())
    }

    /// Vector index accepting `dimension`-length vectors.
    pub fn vector_index(&self, dimension: usize) -> SurrealVectorIndex {
        SurrealVectorIndex::new(self.db.clone(), dimension)
    }
}

async fn sign_in(db: &Surreal<Any>, remote: &RemoteConfig) -> Result<()> {
    let signed_in = match &remote.auth {
        RemoteAuth::Root { username, password } => {
            db.signin(Root { username, password }).await.map(|_| ())
        }
        RemoteAuth::Database { username, password } => db
            .signin(Database {
                namespace: &remote.namespace,
                database: &remote.database,
                username,
                password,
            })
            .await
            .map(|_| ()),
    };
    signed_in.map_err(|e| {
        StateError::Connection(format!("sign-in to {} failed: {}", remote.endpoint, e))
    })
}
