//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and build the manager and coordinator
//! - Initialize subsystems in dependency order
//! - Start background tasks (health endpoint, health monitor)
//! - Run until shutdown completes
//!
//! # Design Decisions
//! - Fail fast on bad configuration
//! - Shutdown is armed before anything can hold a lease
//! - A failed initial connect is not fatal: the process stays up and
//!   reports itself unhealthy

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::loader::ConfigError;
use crate::config::schema::WardenConfig;
use crate::config::validation::validate_config;
use crate::connection::connector::PoolSettings;
use crate::connection::error::ConnectionError;
use crate::connection::http::HttpBackend;
use crate::connection::manager::ConnectionManager;
use crate::health::monitor::HealthSettings;
use crate::http::HealthServer;
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownError, ShutdownOutcome};
use crate::resilience::backoff::{BackoffError, BackoffPolicy};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid target url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid backoff policy: {0}")]
    Backoff(#[from] BackoffError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    #[error("failed to bind health endpoint: {0}")]
    Bind(#[from] std::io::Error),
}

/// A fully wired warden for one HTTP backing service.
pub struct Warden {
    config: WardenConfig,
    manager: ConnectionManager<HttpBackend>,
    shutdown: ShutdownCoordinator<HttpBackend>,
}

impl Warden {
    pub fn build(config: WardenConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let backend = HttpBackend::new(&config.target.url, config.health_check.path.clone())?;
        let manager = ConnectionManager::new(
            config.target.name.clone(),
            backend,
            PoolSettings::from_config(&config.pool),
            BackoffPolicy::from_config(&config.backoff)?,
        )?;
        let shutdown = ShutdownCoordinator::from_config(manager.clone(), &config.shutdown);

        tracing::info!(
            target_name = %config.target.name,
            url = %config.target.url,
            min_size = config.pool.min_size,
            max_size = config.pool.max_size,
            grace_period = ?shutdown.grace_period(),
            "Warden configured"
        );

        Ok(Self {
            config,
            manager,
            shutdown,
        })
    }

    pub fn manager(&self) -> &ConnectionManager<HttpBackend> {
        &self.manager
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator<HttpBackend> {
        &self.shutdown
    }

    /// Arm signals, serve health, connect, monitor, then wait for shutdown.
    pub async fn run(self) -> Result<ShutdownOutcome, StartupError> {
        self.shutdown.arm()?;

        let server = if self.config.http.enabled {
            let listener = TcpListener::bind(&self.config.http.bind_address).await?;
            let server = HealthServer::new(self.manager.clone());
            let coordinator = self.shutdown.clone();
            Some(tokio::spawn(server.run(listener, async move {
                let _ = coordinator.wait().await;
            })))
        } else {
            None
        };

        match self.manager.connect(&CancellationToken::new()).await {
            Ok(()) => {
                tracing::info!(target_name = %self.manager.name(), "Initial connect succeeded")
            }
            Err(e) => tracing::error!(
                target_name = %self.manager.name(),
                error = %e,
                "Initial connect failed, serving degraded health"
            ),
        }

        if self.config.health_check.enabled {
            let settings = HealthSettings::from_config(&self.config.health_check);
            tracing::info!(
                interval = ?settings.interval,
                threshold = settings.unhealthy_threshold,
                "Starting health monitor"
            );
            self.manager.start_health_monitor(settings);
        }

        let outcome = self.shutdown.wait().await?;

        if let Some(server) = server {
            match tokio::time::timeout(Duration::from_secs(5), server).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => tracing::error!(error = %e, "Health server failed"),
                Ok(Err(e)) => tracing::error!(error = %e, "Health server task panicked"),
                Err(_) => tracing::warn!("Health server did not stop in time"),
            }
        }

        Ok(outcome)
    }
}
