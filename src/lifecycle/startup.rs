//! Startup orchestration.
//!
//! # Responsibilities
//! - Gather the statement set for the enabled plugins
//! - Open the connection pool (fatal on failure)
//! - Build the session cache, handler registry and rate limiter
//! - Bind the listener last, so traffic only arrives once ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - No ambient singletons: everything is owned here and shared via `Arc`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::db::{PgConnector, PgPool, Pool};
use crate::error::StartupError;
use crate::handlers::{self, PluginContext};
use crate::http::{ConnectionLimits, Dispatcher, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::Listener;
use crate::routing::{HandlerRegistry, PluginLoadError};
use crate::security::RateLimiter;
use crate::session::{store, PgSessionStore, SessionCache};

/// A fully initialized server, ready to accept traffic.
pub struct Application {
    server: HttpServer,
    pool: Arc<PgPool>,
    limiter: Option<Arc<RateLimiter>>,
    sweep_interval: Duration,
}

impl Application {
    pub async fn build(config: &ServerConfig) -> Result<Self, StartupError> {
        let enabled = &config.handlers.enabled;

        let mut statements = HandlerRegistry::statements(handlers::catalog(), enabled)?;
        statements
            .extend(store::STATEMENTS)
            .map_err(PluginLoadError::from)?;

        tracing::info!(
            host = %config.database.host,
            dbname = %config.database.dbname,
            pool_size = config.database.pool_size,
            statements = statements.len(),
            "Opening database pool"
        );
        let connector = PgConnector::new(&config.database, statements);
        let pool = Arc::new(
            Pool::new(
                connector,
                config.database.pool_size,
                config.database.freshness(),
            )
            .await?,
        );

        let session_store = Arc::new(PgSessionStore::new(Arc::clone(&pool)));
        let sessions = Arc::new(SessionCache::new(
            session_store,
            config.sessions.ttl(),
            config.sessions.max_entries,
        ));

        let ctx = PluginContext {
            pool: Arc::clone(&pool),
            sessions,
        };
        let registry = HandlerRegistry::load(
            handlers::catalog(),
            enabled,
            config.handlers.ordering,
            &ctx,
        )?;

        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(registry),
            limiter.clone(),
            Duration::from_secs(config.timeouts.request_secs),
        ));

        let listener = Listener::bind(&config.listener).await?;
        let server = HttpServer::new(listener, dispatcher, ConnectionLimits::from_config(config));

        Ok(Self {
            server,
            pool,
            limiter,
            sweep_interval: Duration::from_secs(config.rate_limit.sweep_interval_secs),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.server.local_addr()
    }

    /// Serve until `shutdown` fires, then drain and close the pool.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), StartupError> {
        if let Some(limiter) = &self.limiter {
            tokio::spawn(Arc::clone(limiter).run_sweeper(self.sweep_interval, shutdown.subscribe()));
        }

        self.server.run(shutdown.subscribe()).await?;

        self.pool.close();
        tracing::info!("Database pool closed");
        Ok(())
    }
}
