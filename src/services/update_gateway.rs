//! Front door for coefficient updates: commit first, then notify.
//!
//! Request lifecycle:
//!
//! ```text
//! Received -> Validating -> Rejected                                  (success = false)
//!                        -> Committing -> Committed -> Notifying -> Done (success = true)
//! ```
//!
//! The commit result is authoritative. Notification runs only after the
//! transaction has closed and its outcome is advisory: it is logged and
//! reported next to the commit result, never in place of it.

use crate::error::CoefficientError;
use crate::repositories::MarketStore;
use crate::services::centrifugo::{CoefficientUpdateMessage, Notifier};
use crate::services::coefficient_service::{CoefficientService, CoefficientUpdate};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

pub const UPDATE_SUCCESS_MESSAGE: &str = "Coefficient updated successfully";

/// A request to move a market to a new coefficient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateRequest {
    pub market_id: i64,
    pub new_coefficient: f64,
    pub user_id: i64,
}

/// What happened to the subscriber notification for one request
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    /// The commit was rejected, so there was nothing to announce
    NotAttempted,
    /// The broker accepted the publication
    Delivered,
    /// The enriched market could not be loaded after commit
    Skipped(String),
    /// The broker call failed or timed out
    Failed(String),
}

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered)
    }
}

/// Two-phase result of one update request
#[derive(Debug, Clone)]
#[must_use]
pub struct UpdateReport {
    pub request: UpdateRequest,
    pub commit: Result<CoefficientUpdate, CoefficientError>,
    pub notification: NotifyOutcome,
}

impl UpdateReport {
    /// Success is decided by the commit alone
    pub fn success(&self) -> bool {
        self.commit.is_ok()
    }

    /// Human-readable outcome for the caller
    pub fn message(&self) -> String {
        match &self.commit {
            Ok(_) => UPDATE_SUCCESS_MESSAGE.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

/// Drives the coefficient pipeline and the notifier for each request
pub struct UpdateGateway {
    pipeline: CoefficientService,
    store: Arc<dyn MarketStore>,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl UpdateGateway {
    pub fn new(store: Arc<dyn MarketStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pipeline: CoefficientService::new(store.clone()),
            store,
            notifier,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Upper bound on how long a notification may take
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Store the gateway reads from
    pub fn store(&self) -> &Arc<dyn MarketStore> {
        &self.store
    }

    /// Handle one update request end to end. Never fails: rejections are part
    /// of the report.
    pub async fn handle(&self, request: UpdateRequest) -> UpdateReport {
        let span = info_span!(
            "coefficient_update",
            market_id = request.market_id,
            user_id = request.user_id
        );

        async move {
            let commit = self
                .pipeline
                .update_market_coefficient(request.market_id, request.new_coefficient, request.user_id)
                .await;

            let notification = match &commit {
                Ok(update) => self.notify(update).await,
                Err(_) => NotifyOutcome::NotAttempted,
            };

            UpdateReport {
                request,
                commit,
                notification,
            }
        }
        .instrument(span)
        .await
    }

    async fn notify(&self, update: &CoefficientUpdate) -> NotifyOutcome {
        let details = match self.store.get_market_with_history(update.market_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(
                    "Committed market {} but could not load details for notification: {}",
                    update.market_id, e
                );
                return NotifyOutcome::Skipped(e.to_string());
            }
        };

        let message = CoefficientUpdateMessage::new(
            details.market.event_id,
            update.market_id,
            update.old_coefficient,
            update.new_coefficient,
        )
        .with_names(&details.market.name, &details.event.name);

        match tokio::time::timeout(self.notify_timeout, self.notifier.notify(&message)).await {
            Ok(Ok(())) => {
                info!("Notified subscribers of market {} update", update.market_id);
                NotifyOutcome::Delivered
            }
            Ok(Err(e)) => {
                warn!("Can't publish coefficient update for market {}: {}", update.market_id, e);
                NotifyOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    "Publishing coefficient update for market {} timed out after {:?}",
                    update.market_id, self.notify_timeout
                );
                NotifyOutcome::Failed(format!("notification timed out after {:?}", self.notify_timeout))
            }
        }
    }
}
