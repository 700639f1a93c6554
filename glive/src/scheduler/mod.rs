//! Background scheduling.
//!
//! Two independent loops drive the service:
//! - session renewal: new token, a short settle pause, then a new cookie
//! - event reconciliation: one reconcile pass per interval
//!
//! An optional third loop re-resolves every stream URL in bulk. The loops
//! share nothing but the [`SessionManager`], whose single-flight slots keep
//! them from duplicating upstream work.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::events::{EventReconciler, ReconcileOutcome};
use crate::session::SessionManager;
use crate::stream::EventStreamService;

/// Result of one renewal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    Renewed,
    /// Login failed; the cookie step was skipped.
    TokenFailed,
    /// Token renewed but the cookie exchange failed; the old cookie stays.
    CookieFailed,
    /// Shutdown arrived during the settle pause.
    Cancelled,
}

pub struct Scheduler {
    session: Arc<SessionManager>,
    reconciler: Arc<EventReconciler>,
    streams: Option<Arc<EventStreamService>>,
    config: ScheduleConfig,
    cancellation_token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        session: Arc<SessionManager>,
        reconciler: Arc<EventReconciler>,
        config: ScheduleConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            session,
            reconciler,
            streams: None,
            config,
            cancellation_token,
        }
    }

    /// Enable the bulk stream refresh loop when an interval is configured.
    pub fn with_stream_refresh(mut self, streams: Arc<EventStreamService>) -> Self {
        self.streams = Some(streams);
        self
    }

    /// One renewal cycle.
    pub async fn renew_session(&self) -> RenewalOutcome {
        info!("Session renewal started");

        let token = match self.session.acquire_token().await {
            Ok(token) => token,
            Err(e) => {
                if e.is_transient() {
                    warn!(error = %e, "Token renewal failed, skipping cookie refresh");
                } else {
                    error!(error = %e, "Token renewal failed, skipping cookie refresh");
                }
                return RenewalOutcome::TokenFailed;
            }
        };

        tokio::select! {
            _ = self.cancellation_token.cancelled() => {
                debug!("Shutdown during session settle pause");
                return RenewalOutcome::Cancelled;
            }
            _ = tokio::time::sleep(self.config.session_settle) => {}
        }

        match self.session.refresh_cookie(&token).await {
            Ok(_) => {
                info!("Session renewal completed");
                RenewalOutcome::Renewed
            }
            Err(e) => {
                warn!(error = %e, "Cookie refresh failed, keeping the previous cookie");
                RenewalOutcome::CookieFailed
            }
        }
    }

    /// One reconcile pass; errors are logged.
    pub async fn reconcile_events(&self) {
        match self.reconciler.reconcile().await {
            Ok(ReconcileOutcome::Applied(report)) => {
                debug!(?report, "Reconcile pass finished");
            }
            Ok(outcome) => debug!(?outcome, "Reconcile pass skipped"),
            Err(e) => error!(error = %e, "Event reconciliation failed"),
        }
    }

    /// Spawn the loops. They stop when the cancellation token fires.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(3);

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            // Startup already warmed the session; first renewal is one period out.
            let period = scheduler.config.session_renewal;
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = scheduler.cancellation_token.cancelled() => {
                        debug!("Session renewal loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        scheduler.renew_session().await;
                    }
                }
            }
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.config.reconcile_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = scheduler.cancellation_token.cancelled() => {
                        debug!("Reconcile loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        scheduler.reconcile_events().await;
                    }
                }
            }
        }));

        if let (Some(streams), Some(period)) = (self.streams.clone(), self.config.stream_refresh) {
            let token = self.cancellation_token.clone();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("Stream refresh loop shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            if let Err(e) = streams.refresh_streams().await {
                                error!(error = %e, "Stream refresh failed");
                            }
                        }
                    }
                }
            }));
        }

        info!(
            renewal_secs = self.config.session_renewal.as_secs(),
            reconcile_secs = self.config.reconcile_interval.as_secs(),
            stream_refresh = self.streams.is_some() && self.config.stream_refresh.is_some(),
            "Scheduler started"
        );
        handles
    }
}
