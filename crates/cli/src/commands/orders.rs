//! Order history and tracking commands.
//!
//! # Usage
//!
//! ```bash
//! # Your orders, newest first
//! lavande orders
//!
//! # Find one order; the reference can be an id, an order number,
//! # or a VNPAY transaction reference
//! lavande track DH102938
//!
//! # Keep polling until interrupted
//! lavande track DH102938 --watch --interval 30
//! ```
//!
//! History falls back to the last saved copy when the server or the
//! session is unavailable; a warning marks the output as offline.

use std::time::Duration;

use lavande_client::api::ApiError;
use lavande_client::api::types::Order;
use lavande_client::tracking::{
    MatchRule, OrderWatcher, TrackedOrder, TrackingError, TrackingSnapshot,
};
use lavande_core::{OrderId, OrderStatus};
use thiserror::Error;

use super::CommandContext;

/// The four delivery steps, in order.
const TIMELINE_LABELS: [&str; 4] = ["Chờ xác nhận", "Đang xử lý", "Đang giao", "Đã giao"];

/// Errors that can occur during order commands.
#[derive(Debug, Error)]
pub enum OrdersError {
    /// No stored session.
    #[error("Not signed in. Run `lavande login` first")]
    NotSignedIn,

    /// The stored token was rejected by the server.
    #[error("Session expired. Run `lavande login` again")]
    SessionExpired,

    /// Unknown status keyword on the command line.
    #[error("Invalid status: {0}. Valid: pending, processing, shipped, delivered, cancelled")]
    InvalidStatus(String),

    /// API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Order lookup failed.
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// List orders, newest first.
pub async fn history(ctx: &CommandContext, all: bool) -> Result<(), OrdersError> {
    let (mut orders, stale) = if all {
        let credentials = ctx.session.credentials().ok_or(OrdersError::NotSignedIn)?;
        (
            ctx.api
                .all_orders(&credentials)
                .await
                .map_err(login_hint)?,
            false,
        )
    } else {
        let history = ctx.tracker().history().await.map_err(login_hint)?;
        (history.orders, history.stale)
    };

    if stale {
        tracing::warn!("Server unreachable; showing the last saved copy");
    }
    if orders.is_empty() {
        tracing::info!("No orders yet");
        return Ok(());
    }

    // Newest first; records without a timestamp sink to the end.
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    tracing::info!("{} order(s):", orders.len());
    for order in &orders {
        render_order(order);
    }
    Ok(())
}

/// Find one order and show its delivery timeline.
///
/// With `watch`, keeps polling and prints the order again whenever its
/// status changes, until interrupted.
pub async fn track(
    ctx: &CommandContext,
    reference: &str,
    watch: bool,
    interval: u64,
) -> Result<(), OrdersError> {
    let tracker = ctx.tracker();

    if !watch {
        let tracked = tracker.find(reference).await.map_err(login_hint)?;
        render_tracked(reference, &tracked);
        return Ok(());
    }

    let every = Duration::from_secs(interval.max(1));
    let watcher = OrderWatcher::spawn(tracker, reference, every);
    let mut receiver = watcher.subscribe();

    tracing::info!(
        "Watching {} (every {}s, Ctrl-C to stop)",
        reference,
        every.as_secs()
    );

    let mut last_status: Option<OrderStatus> = None;
    loop {
        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = receiver.borrow_and_update().clone();
                match snapshot {
                    TrackingSnapshot::Pending => {}
                    TrackingSnapshot::Found(tracked) => {
                        // The poller reports every tick; only re-render on change.
                        if last_status != Some(tracked.order.status) {
                            last_status = Some(tracked.order.status);
                            render_tracked(reference, &tracked);
                        }
                    }
                    TrackingSnapshot::Failed(message) => {
                        tracing::warn!("Fetch failed: {}", message);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopped watching");
                break;
            }
        }
    }
    Ok(())
}

/// Move an order to a new status.
pub async fn set_status(
    ctx: &CommandContext,
    order_id: &str,
    status: &str,
) -> Result<(), OrdersError> {
    // Strict parse; operator typos should not reach the server.
    let status: OrderStatus = status
        .parse()
        .map_err(|_| OrdersError::InvalidStatus(status.to_owned()))?;

    let credentials = ctx.session.credentials().ok_or(OrdersError::NotSignedIn)?;
    ctx.api
        .update_order_status(&credentials, &OrderId::new(order_id), status)
        .await
        .map_err(login_hint)?;

    tracing::info!("Order {} moved to {}", order_id, status);
    Ok(())
}

/// Rejected tokens prompt a new sign-in instead of reading as a fault.
fn login_hint(err: impl Into<OrdersError>) -> OrdersError {
    match err.into() {
        OrdersError::Api(ApiError::Unauthorized)
        | OrdersError::Tracking(TrackingError::Api(ApiError::Unauthorized)) => {
            OrdersError::SessionExpired
        }
        other => other,
    }
}

fn render_tracked(reference: &str, tracked: &TrackedOrder) {
    if tracked.stale {
        tracing::warn!("Server unreachable; showing the last saved copy");
    }
    match tracked.matched_by {
        MatchRule::Exact => {}
        MatchRule::CaseInsensitive => {
            tracing::info!("Matched {} by id, ignoring case", reference);
        }
        MatchRule::AltReference => {
            tracing::info!("Matched {} by order number / gateway reference", reference);
        }
        MatchRule::Substring => {
            tracing::info!("Matched {} as part of the order id", reference);
        }
        MatchRule::MostRecent => {
            tracing::warn!(
                "No order matches {}; showing your most recent order instead",
                reference
            );
        }
    }
    render_order(&tracked.order);
}

fn render_order(order: &Order) {
    let reference = order.alternate_reference().map_or_else(
        || order.id.to_string(),
        |alt| format!("{} ({})", alt, order.id),
    );

    tracing::info!("  {}", reference);
    tracing::info!("    {}", timeline(order.status));
    tracing::info!("    Total: {}", order.total_amount);
    if let Some(method) = order.payment_method {
        tracing::info!("    Paid by: {}", method);
    }
    if let Some(created) = order.created_at {
        tracing::info!("    Placed: {}", created.format("%d/%m/%Y %H:%M"));
    }
}

/// Render the four-step delivery timeline, bracketing reached steps.
fn timeline(status: OrderStatus) -> String {
    if status.is_cancelled() {
        return "✗ Đã hủy".to_owned();
    }

    let reached = usize::from(status.timeline_step());
    let rendered: Vec<String> = TIMELINE_LABELS
        .iter()
        .enumerate()
        .map(|(index, label)| {
            if index < reached {
                format!("[{label}]")
            } else {
                (*label).to_string()
            }
        })
        .collect();
    rendered.join(" > ")
}
