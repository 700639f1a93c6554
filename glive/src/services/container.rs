//! Service container for dependency injection.
//!
//! Builds every service once, hands out shared handles, and owns the
//! background tasks and the shutdown sequence.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::Result;
use crate::api::{ApiServer, AppState};
use crate::config::AppConfig;
use crate::database::MaintenanceScheduler;
use crate::database::repositories::{SqlxCredentialStore, SqlxEventRepository};
use crate::events::{EventFeed, EventReconciler};
use crate::scheduler::Scheduler;
use crate::session::{SessionManager, SessionProvider, WarmStart};
use crate::stream::{EventStreamService, StreamLocator, StreamResolver};
use crate::upstream::ExchangeUpstream;

/// Default time to wait for background tasks on shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream seams the services talk through.
pub struct Upstreams {
    pub provider: Arc<dyn SessionProvider>,
    pub feed: Arc<dyn EventFeed>,
    pub locator: Arc<dyn StreamLocator>,
}

impl Upstreams {
    /// All three seams served by one exchange client.
    pub fn exchange(upstream: Arc<ExchangeUpstream>) -> Self {
        Self {
            provider: upstream.clone(),
            feed: upstream.clone(),
            locator: upstream,
        }
    }
}

/// Container for all application services.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: SqlitePool,
    pub session: Arc<SessionManager>,
    pub events: Arc<SqlxEventRepository>,
    pub reconciler: Arc<EventReconciler>,
    pub resolver: Arc<StreamResolver>,
    pub streams: Arc<EventStreamService>,
    pub scheduler: Arc<Scheduler>,
    pub maintenance: Arc<MaintenanceScheduler>,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceContainer {
    /// Build the services against the configured exchange.
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Result<Self> {
        let upstream = Arc::new(ExchangeUpstream::new(config.exchange.clone())?);
        Ok(Self::with_upstreams(pool, config, Upstreams::exchange(upstream)))
    }

    /// Build the services against the given upstream seams.
    pub fn with_upstreams(pool: SqlitePool, config: &AppConfig, upstreams: Upstreams) -> Self {
        info!("Initializing service container");

        let cancellation_token = CancellationToken::new();

        let credentials = Arc::new(SqlxCredentialStore::new(pool.clone()));
        let events = Arc::new(SqlxEventRepository::new(pool.clone()));

        let session = Arc::new(SessionManager::new(upstreams.provider, credentials));
        let reconciler = Arc::new(EventReconciler::new(
            session.clone(),
            upstreams.feed,
            events.clone(),
        ));
        let resolver = Arc::new(StreamResolver::new(session.clone(), upstreams.locator));
        let streams = Arc::new(EventStreamService::new(events.clone(), resolver.clone()));

        let scheduler = Arc::new(
            Scheduler::new(
                session.clone(),
                reconciler.clone(),
                config.schedule.clone(),
                cancellation_token.clone(),
            )
            .with_stream_refresh(streams.clone()),
        );
        let maintenance = Arc::new(MaintenanceScheduler::new(
            pool.clone(),
            config.maintenance.clone(),
        ));

        Self {
            pool,
            session,
            events,
            reconciler,
            resolver,
            streams,
            scheduler,
            maintenance,
            cancellation_token,
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Warm the session from the store or the upstream.
    ///
    /// A failure is logged; the scheduler and the stream self-heal retry later.
    pub async fn initialize(&self) -> Option<WarmStart> {
        match self.session.warm_up().await {
            Ok(start) => {
                info!(?start, "Session ready");
                Some(start)
            }
            Err(e) => {
                error!(error = %e, "Initial session setup failed, continuing without a session");
                None
            }
        }
    }

    /// Spawn the scheduler loops and the maintenance task.
    pub fn start_background_tasks(&self) {
        let mut tasks = self.tasks.lock();
        tasks.extend(self.scheduler.clone().start());
        tasks.push(
            self.maintenance
                .clone()
                .start(self.cancellation_token.clone()),
        );
        info!(count = tasks.len(), "Background tasks started");
    }

    /// Register a task to be awaited on shutdown.
    pub fn track_task(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// State for the HTTP API.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.session.clone(),
            self.events.clone(),
            self.resolver.clone(),
            self.streams.clone(),
        )
    }

    /// Serve the API until `shutdown_signal` resolves or the server stops on
    /// its own, then shut every service down.
    ///
    /// Returns the server's error when it is the server that stopped first.
    pub async fn serve_until_shutdown<F>(&self, server: ApiServer, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut server_handle = tokio::spawn(async move { server.run().await });

        let early_exit = tokio::select! {
            _ = shutdown_signal => {
                info!("Received shutdown signal");
                None
            }
            result = &mut server_handle => Some(result),
        };

        if early_exit.is_some() {
            warn!("API server stopped unexpectedly, shutting down");
        }
        self.shutdown().await;

        let result = match early_exit {
            Some(result) => result,
            None => server_handle.await,
        };
        match result {
            Ok(result) => result,
            Err(e) => Err(crate::Error::ApiError(format!("API server task failed: {e}"))),
        }
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) {
        info!("Shutting down services (timeout: {:?})", timeout);
        self.cancellation_token.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        let joined = tokio::time::timeout(timeout, async {
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!("Shutdown timeout reached, forcing shutdown");
        }

        info!("Closing database pool...");
        self.pool.close().await;

        info!("Services shut down");
    }
}
