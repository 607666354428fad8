use anyhow::Context;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::error;

use crate::{
    app_error::AppError,
    domain::roles::Principal,
    models::OrderStatusHistoryEntity,
    schema::order_status_history,
    services::orders::find_visible_order,
};

/// Status timeline of an order, newest entry first.
pub async fn get_order_status_history(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    principal: &Principal,
) -> Result<Vec<OrderStatusHistoryEntity>, AppError> {
    let order = find_visible_order(conn, order_id, principal).await?;

    let history = order_status_history::table
        .filter(order_status_history::order_id.eq(order.id))
        .order_by(order_status_history::id.desc())
        .select(OrderStatusHistoryEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get order status history")?;

    Ok(history)
}

/// Most recent history entry. Every order is created with an initial entry, so an order
/// without one is reported as an integrity failure rather than an empty result.
pub async fn get_latest_status(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    principal: &Principal,
) -> Result<OrderStatusHistoryEntity, AppError> {
    let order = find_visible_order(conn, order_id, principal).await?;

    let latest: Option<OrderStatusHistoryEntity> = order_status_history::table
        .filter(order_status_history::order_id.eq(order.id))
        .order_by(order_status_history::id.desc())
        .select(OrderStatusHistoryEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get latest order status")?;

    match latest {
        Some(entry) => {
            if entry.new_status != order.status {
                error!(
                    "Order #{} is {} but its latest history entry says {}",
                    order.id, order.status, entry.new_status
                );
            }
            Ok(entry)
        }
        None => {
            error!("Order #{} has no status history", order.id);
            Err(anyhow::anyhow!("Order #{} has no status history", order.id).into())
        }
    }
}
