//! Builds the process-wide state from validated configuration.

use axum_extra::extract::cookie::Key;
use frontgate_access::{IdentityProvider, RefreshLocks};
use frontgate_health::HealthAggregator;
use frontgate_repository::{ExampleRepository, MemoryRepository, PoolSettings, PostgresRepository};
use frontgate_session::{MemorySessionStore, PostgresSessionStore, SessionStore, Sessions};
use rootcause::prelude::Report;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::OidcClient;
use crate::config::{Backend, ServerConfig};
use crate::health::{IdentityProviderCheck, RepositoryCheck};
use crate::metrics::RequestMetrics;
use crate::state::{AppState, CookieSettings};

/// Startup failures. All of them end the process with a non-zero status.
#[derive(Debug)]
pub enum BootError {
    /// A setting passed validation but could not be used.
    Configuration { details: String },
    /// The session database could not be reached or migrated.
    Database { details: String },
    /// The OIDC provider could not be discovered.
    Discovery { details: String },
    /// The listener could not be bound.
    Bind { address: String, details: String },
    /// The server stopped with an I/O error.
    Serve { details: String },
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "invalid configuration: {details}"),
            Self::Database { details } => write!(f, "database unavailable: {details}"),
            Self::Discovery { details } => write!(f, "OIDC discovery failed: {details}"),
            Self::Bind { address, details } => write!(f, "failed to bind {address}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for BootError {}

/// Connects the backends, discovers the provider and wires the state.
pub async fn assemble(config: &ServerConfig) -> Result<AppState, Report<BootError>> {
    let key = session_key(config.session.key.as_deref())?;
    let pool = database(config).await?;

    let store: Arc<dyn SessionStore> = match (config.session.backend, &pool) {
        (Backend::Postgres, Some(pool)) => Arc::new(PostgresSessionStore::new(pool.clone())),
        (Backend::Postgres, None) => {
            return Err(BootError::Configuration {
                details: "postgres session backend without a database URL".to_string(),
            }
            .into());
        }
        (Backend::Memory, _) => Arc::new(MemorySessionStore::new()),
    };
    let sessions = Sessions::new(store, config.session.ttl());
    info!(backend = sessions.backend(), ttl_minutes = config.session.ttl_minutes, "session store ready");

    let repository = repository(config);
    if let Err(e) = repository.connect().await {
        warn!(backend = repository.backend(), error = %e, "repository not reachable at boot");
    }

    let mut health = HealthAggregator::new(config.health.probe_timeout())
        .with_check(Arc::new(RepositoryCheck::new(repository.clone())));

    let provider: Option<Arc<dyn IdentityProvider>> = if config.oidc.is_disabled() {
        warn!("OIDC is disabled; functional routes are not authenticated");
        None
    } else {
        info!(issuer = %config.oidc.issuer_url(), "discovering OIDC provider");
        let client = OidcClient::discover(&config.oidc, config.serve.redirect_uri())
            .await
            .map_err(|e| BootError::Discovery {
                details: e.to_string(),
            })?;
        let probe_http = reqwest::Client::builder()
            .timeout(config.oidc.http_timeout())
            .build()
            .map_err(|e| BootError::Configuration {
                details: format!("failed to create HTTP client: {e}"),
            })?;
        health.register(Arc::new(IdentityProviderCheck::new(
            probe_http,
            config.oidc.issuer_url(),
        )));
        Some(Arc::new(client))
    };

    Ok(AppState {
        cookies: Arc::new(CookieSettings::from_config(&config.session, &config.serve)),
        serve: Arc::new(config.serve.clone()),
        key,
        sessions,
        provider,
        refresh_locks: Arc::new(RefreshLocks::new()),
        repository,
        health,
        metrics: Arc::new(RequestMetrics::new()),
    })
}

/// The cookie key: the configured one, or a random key when none is set.
fn session_key(configured: Option<&str>) -> Result<Key, Report<BootError>> {
    match configured {
        Some(key) => Key::try_from(key.as_bytes()).map_err(|e| {
            BootError::Configuration {
                details: format!("session key: {e}"),
            }
            .into()
        }),
        None => {
            warn!("no session key configured; cookies will not survive a restart");
            Ok(Key::generate())
        }
    }
}

/// Opens and migrates the database when any backend needs it.
///
/// Fatal only for the session backend; a repository-only database is
/// retried lazily by the repository.
async fn database(config: &ServerConfig) -> Result<Option<PgPool>, Report<BootError>> {
    let sessions_need_it = config.session.backend == Backend::Postgres;
    let repository_needs_it = config.repository.backend == Backend::Postgres;
    let Some(url) = config
        .database_url
        .as_deref()
        .filter(|_| sessions_need_it || repository_needs_it)
    else {
        return Ok(None);
    };

    let connected = async {
        let pool = PgPoolOptions::new()
            .max_connections(config.repository.max_connections)
            .connect(url)
            .await?;
        info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok::<_, sqlx::Error>(pool)
    }
    .await;

    match connected {
        Ok(pool) => Ok(Some(pool)),
        Err(e) if sessions_need_it => Err(BootError::Database {
            details: e.to_string(),
        }
        .into()),
        Err(e) => {
            warn!(error = %e, "database unavailable at boot");
            Ok(None)
        }
    }
}

fn repository(config: &ServerConfig) -> Arc<dyn ExampleRepository> {
    match (config.repository.backend, config.database_url.as_deref()) {
        (Backend::Postgres, Some(url)) => Arc::new(PostgresRepository::new(
            url.to_string(),
            PoolSettings {
                max_connections: config.repository.max_connections,
                min_connections: config.repository.min_connections,
            },
            config.health.probe_timeout(),
        )),
        _ => Arc::new(MemoryRepository::new()),
    }
}

/// Deletes expired sessions now and then every `every`.
pub fn spawn_session_sweeper(sessions: Sessions, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(count) => info!(deleted_sessions = count, "purged expired sessions"),
                Err(e) => warn!(error = %e, "failed to purge expired sessions"),
            }
        }
    })
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServeConfig;
    use frontgate_access::OidcConfig;
    use frontgate_session::SessionRecord;

    fn memory_config() -> ServerConfig {
        ServerConfig {
            serve: ServeConfig::new("/app"),
            session: Default::default(),
            oidc: OidcConfig::disabled(),
            repository: Default::default(),
            health: Default::default(),
            database_url: None,
        }
    }

    #[test]
    fn configured_key_must_be_long_enough() {
        assert!(session_key(Some(&"k".repeat(64))).is_ok());
        assert!(session_key(Some("short")).is_err());
        assert!(session_key(None).is_ok());
    }

    #[tokio::test]
    async fn memory_backends_need_no_database() {
        let state = assemble(&memory_config()).await.expect("assemble");
        assert_eq!(state.sessions.backend(), "memory");
        assert_eq!(state.repository.backend(), "memory");
        assert!(state.provider.is_none());
        assert!(state.repository.is_connected().await);
    }

    #[tokio::test]
    async fn sweeper_purges_at_start() {
        let store = Arc::new(MemorySessionStore::new());
        let record = SessionRecord {
            id: frontgate_core::SessionId::new(),
            values: Default::default(),
            expires_at: chrono::Utc::now() - chrono::Duration::minutes(1),
        };
        store.save(&record).await.expect("save");
        let sessions = Sessions::new(store.clone(), chrono::Duration::minutes(60));

        let sweeper = spawn_session_sweeper(sessions, Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.abort();

        assert!(store.is_empty().await);
    }
}
