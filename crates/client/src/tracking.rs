//! Order history and tracking.
//!
//! User-entered references rarely match a raw order id, so lookup runs a
//! fixed cascade from strict to loose. The looseness is deliberate and the
//! rule that produced a hit is reported alongside the order, so callers can
//! present a "closest match" differently from an exact one.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};

use crate::api::types::Order;
use crate::api::{ApiClient, ApiError};
use crate::session::SessionStore;
use crate::storage::{StorageError, keys};

/// How often a watcher re-fetches by default.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Errors reading order history.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Not signed in and nothing cached to show.
    #[error("sign in to see orders")]
    LoginRequired,

    /// The account has no orders to match against.
    #[error("no orders found")]
    NoOrders,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Which cascade rule matched a reference to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Reference equals the order id.
    Exact,
    /// Reference equals the order id ignoring case.
    CaseInsensitive,
    /// Reference equals the order number or gateway transaction reference.
    AltReference,
    /// Reference is a substring of the order id.
    Substring,
    /// Nothing matched; this is the most recently created order.
    MostRecent,
}

/// A cascade hit: the order plus the rule that found it.
#[derive(Debug, Clone, Copy)]
pub struct OrderMatch<'a> {
    pub order: &'a Order,
    pub matched_by: MatchRule,
}

/// Match a user-entered reference against an order list.
///
/// Rules run strict to loose: exact id, case-insensitive id, alternate
/// reference, id substring, then the most recent order as a final guess.
/// Only an empty list yields `None`.
#[must_use]
pub fn resolve_order<'a>(orders: &'a [Order], reference: &str) -> Option<OrderMatch<'a>> {
    let target = reference.trim();

    if let Some(order) = orders.iter().find(|order| order.id.as_str() == target) {
        return Some(OrderMatch {
            order,
            matched_by: MatchRule::Exact,
        });
    }

    let lowered = target.to_lowercase();
    if let Some(order) = orders
        .iter()
        .find(|order| order.id.as_str().to_lowercase() == lowered)
    {
        return Some(OrderMatch {
            order,
            matched_by: MatchRule::CaseInsensitive,
        });
    }

    if let Some(order) = orders
        .iter()
        .find(|order| order.alternate_reference() == Some(target))
    {
        return Some(OrderMatch {
            order,
            matched_by: MatchRule::AltReference,
        });
    }

    if !target.is_empty()
        && let Some(order) = orders.iter().find(|order| order.id.as_str().contains(target))
    {
        return Some(OrderMatch {
            order,
            matched_by: MatchRule::Substring,
        });
    }

    // Missing timestamps sort as oldest.
    orders
        .iter()
        .max_by_key(|order| order.created_at)
        .map(|order| OrderMatch {
            order,
            matched_by: MatchRule::MostRecent,
        })
}

/// Order history plus whether it came from the offline cache.
#[derive(Debug, Clone)]
pub struct OrderHistory {
    pub orders: Vec<Order>,
    /// True when the server was unreachable and this is the last good copy.
    pub stale: bool,
}

/// A tracked order as returned by [`OrderTracker::find`].
#[derive(Debug, Clone)]
pub struct TrackedOrder {
    pub order: Order,
    pub matched_by: MatchRule,
    pub stale: bool,
}

/// Reads order history, keeping an offline copy for when the server or the
/// session is unavailable.
#[derive(Clone)]
pub struct OrderTracker {
    api: ApiClient,
    session: Arc<SessionStore>,
}

impl OrderTracker {
    #[must_use]
    pub const fn new(api: ApiClient, session: Arc<SessionStore>) -> Self {
        Self { api, session }
    }

    /// Fetch the user's orders, falling back to the cached copy when the
    /// fetch cannot be made or fails.
    ///
    /// A successful fetch replaces the cache. The fallback serves whatever
    /// was cached last, marked stale; with no cache the original failure
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::LoginRequired`] when signed out with no
    /// cache, and the underlying API error when a fetch fails with no
    /// cache.
    #[instrument(skip(self))]
    pub async fn history(&self) -> Result<OrderHistory, TrackingError> {
        let Some(credentials) = self.session.credentials() else {
            return self.cached_history(TrackingError::LoginRequired).await;
        };

        match self.api.my_orders(&credentials).await {
            Ok(orders) => {
                if let Err(e) = self
                    .session
                    .storage()
                    .set_json(keys::CACHED_ORDERS, &orders)
                    .await
                {
                    warn!(error = %e, "failed to cache order history");
                }
                Ok(OrderHistory {
                    orders,
                    stale: false,
                })
            }
            Err(err) => self.cached_history(err.into()).await,
        }
    }

    /// Find one order by user-entered reference.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NoOrders`] when the history is empty, plus
    /// everything [`OrderTracker::history`] can return.
    #[instrument(skip(self))]
    pub async fn find(&self, reference: &str) -> Result<TrackedOrder, TrackingError> {
        let history = self.history().await?;

        let matched = resolve_order(&history.orders, reference).ok_or(TrackingError::NoOrders)?;
        debug!(order_id = %matched.order.id, rule = ?matched.matched_by, "reference resolved");

        Ok(TrackedOrder {
            order: matched.order.clone(),
            matched_by: matched.matched_by,
            stale: history.stale,
        })
    }

    async fn cached_history(&self, cause: TrackingError) -> Result<OrderHistory, TrackingError> {
        match self
            .session
            .storage()
            .get_json::<Vec<Order>>(keys::CACHED_ORDERS)
            .await
        {
            Ok(Some(orders)) => {
                warn!("serving cached order history: {cause}");
                Ok(OrderHistory {
                    orders,
                    stale: true,
                })
            }
            _ => Err(cause),
        }
    }
}

/// Latest state published by an [`OrderWatcher`].
#[derive(Debug, Clone)]
pub enum TrackingSnapshot {
    /// No fetch has completed yet.
    Pending,
    /// The reference resolved to this order.
    Found(TrackedOrder),
    /// The last fetch failed.
    Failed(String),
}

/// Background poller for one order reference.
///
/// Fetches immediately on spawn and then on every interval tick,
/// publishing into a watch channel. Dropping the watcher aborts the task.
pub struct OrderWatcher {
    receiver: watch::Receiver<TrackingSnapshot>,
    handle: JoinHandle<()>,
}

impl OrderWatcher {
    /// Spawn the polling task.
    #[must_use]
    pub fn spawn(tracker: OrderTracker, reference: impl Into<String>, every: Duration) -> Self {
        let reference = reference.into();
        let (sender, receiver) = watch::channel(TrackingSnapshot::Pending);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let snapshot = match tracker.find(&reference).await {
                    Ok(tracked) => TrackingSnapshot::Found(tracked),
                    Err(err) => TrackingSnapshot::Failed(err.to_string()),
                };
                if sender.send(snapshot).is_err() {
                    break;
                }
            }
        });

        Self { receiver, handle }
    }

    /// A fresh receiver for the snapshot stream.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackingSnapshot> {
        self.receiver.clone()
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> TrackingSnapshot {
        self.receiver.borrow().clone()
    }
}

impl Drop for OrderWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
