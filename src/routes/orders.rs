use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use bigdecimal::{BigDecimal, Zero};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    domain::{
        order_status::{OrderStatus, PaymentMethod, PaymentStatus},
        roles::Principal,
    },
    middleware,
    models::{DeliveryEntity, OrderEntity, OrderStatusHistoryEntity, RatingReviewEntity},
    services::{
        orders::{self, CreateOrderInput, OrderDetail, OrderWithItems},
        ratings::{self, SubmitRatingInput},
        status_history,
    },
};

/// Order routes. Customer-facing routes need any authenticated principal; lifecycle management
/// is restricted to admin roles.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let customer_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_order))
        .routes(utoipa_axum::routes!(get_my_orders))
        .routes(utoipa_axum::routes!(get_order))
        .routes(utoipa_axum::routes!(get_order_by_number))
        .routes(utoipa_axum::routes!(get_status_history))
        .routes(utoipa_axum::routes!(get_latest_status))
        .routes(utoipa_axum::routes!(submit_rating))
        .route_layer(axum::middleware::from_fn(middleware::authorization));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(list_orders))
        .routes(utoipa_axum::routes!(update_order_status))
        .routes(utoipa_axum::routes!(assign_delivery))
        .routes(utoipa_axum::routes!(update_payment_status))
        .route_layer(axum::middleware::from_fn(middleware::admin_authorization));

    OpenApiRouter::new().nest("/orders", customer_routes.merge(admin_routes))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateOrderReq {
    cart_id: i32,
    address_id: i32,
    payment_method: PaymentMethod,
    notes: Option<String>,
    #[schema(value_type = Option<String>, example = "2.50")]
    tax: Option<BigDecimal>,
    #[schema(value_type = Option<String>, example = "3.00")]
    delivery_fee: Option<BigDecimal>,
    #[schema(value_type = Option<String>, example = "0.00")]
    discount: Option<BigDecimal>,
    #[schema(value_type = Option<String>, example = "30.50")]
    total_amount: Option<BigDecimal>,
}

impl From<CreateOrderReq> for CreateOrderInput {
    fn from(req: CreateOrderReq) -> Self {
        CreateOrderInput {
            cart_id: req.cart_id,
            address_id: req.address_id,
            payment_method: req.payment_method,
            notes: req.notes.filter(|notes| !notes.trim().is_empty()),
            tax: req.tax.unwrap_or_else(BigDecimal::zero),
            delivery_fee: req.delivery_fee.unwrap_or_else(BigDecimal::zero),
            discount: req.discount.unwrap_or_else(BigDecimal::zero),
            total_amount: req.total_amount,
        }
    }
}

/// Convert one of the caller's carts into an order.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<OrderDetail, String>),
        (status = 400, description = "Cart is empty or charges are inconsistent"),
        (status = 404, description = "Cart or address not found")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::create_order_from_cart(conn, principal.id, body.into()).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Created order successfully"),
    })
}

/// Fetch all orders belonging to the authenticated user.
#[utoipa::path(
    get,
    path = "/my-orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<OrderWithItems>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders = orders::get_my_orders(conn, principal.id).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch a specific order with its items and status timeline.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderDetail, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::get_order(conn, id, &principal).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

/// Fetch an order by its human-readable number.
#[utoipa::path(
    get,
    path = "/number/{order_number}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("order_number" = i64, Path, description = "Order number, e.g. 2401010001")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderDetail, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order_by_number(
    Path(order_number): Path<i64>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::get_order_by_number(conn, order_number, &principal).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

/// Status timeline of an order, newest first.
#[utoipa::path(
    get,
    path = "/{id}/status-history",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Get status history successfully", body = StdResponse<Vec<OrderStatusHistoryEntity>, String>)
    )
)]
async fn get_status_history(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let history = status_history::get_order_status_history(conn, id, &principal).await?;

    Ok(StdResponse {
        data: Some(history),
        message: Some("Get status history successfully"),
    })
}

/// Most recent status change of an order.
#[utoipa::path(
    get,
    path = "/{id}/latest-status",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Get latest status successfully", body = StdResponse<OrderStatusHistoryEntity, String>)
    )
)]
async fn get_latest_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let latest = status_history::get_latest_status(conn, id, &principal).await?;

    Ok(StdResponse {
        data: Some(latest),
        message: Some("Get latest status successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct SubmitRatingReq {
    menu_item_id: i32,
    rating: i32,
    review: Option<String>,
}

/// Rate an item of one of the caller's delivered orders.
#[utoipa::path(
    post,
    path = "/{id}/ratings",
    tags = ["Ratings"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID the rated item belongs to")
    ),
    request_body = SubmitRatingReq,
    responses(
        (status = 200, description = "Submitted rating successfully", body = StdResponse<RatingReviewEntity, String>),
        (status = 409, description = "Item already rated for this order")
    )
)]
async fn submit_rating(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SubmitRatingReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rating = ratings::submit_rating(
        conn,
        principal.id,
        id,
        SubmitRatingInput {
            menu_item_id: body.menu_item_id,
            rating: body.rating,
            review: body.review,
        },
    )
    .await?;

    Ok(StdResponse {
        data: Some(rating),
        message: Some("Submitted rating successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListOrdersQuery {
    /// Only return orders currently in this status.
    status: Option<OrderStatus>,
}

/// Fetch all orders in the system.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<OrderWithItems>, String>)
    )
)]
async fn list_orders(
    Query(query): Query<ListOrdersQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders = orders::list_orders(conn, query.status).await?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateOrderStatusReq {
    status: OrderStatus,
    note: Option<String>,
}

/// Move an order to its next status.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Updated order status successfully", body = StdResponse<OrderDetail, String>),
        (status = 400, description = "Invalid status transition")
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::update_order_status(conn, id, body.status, principal, body.note).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Updated order status successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct AssignDeliveryReq {
    driver_id: i32,
}

/// Assign a delivery driver to an order that is being prepared or is ready.
#[utoipa::path(
    post,
    path = "/{id}/assign-delivery",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    request_body = AssignDeliveryReq,
    responses(
        (status = 200, description = "Assigned delivery successfully", body = StdResponse<DeliveryEntity, String>)
    )
)]
async fn assign_delivery(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<AssignDeliveryReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let delivery = orders::assign_delivery(conn, id, body.driver_id).await?;

    Ok(StdResponse {
        data: Some(delivery),
        message: Some("Assigned delivery successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdatePaymentStatusReq {
    payment_status: PaymentStatus,
}

/// Record the payment state of an order.
#[utoipa::path(
    patch,
    path = "/{id}/payment",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    request_body = UpdatePaymentStatusReq,
    responses(
        (status = 200, description = "Updated payment status successfully", body = StdResponse<OrderEntity, String>)
    )
)]
async fn update_payment_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdatePaymentStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::update_payment_status(conn, id, body.payment_status).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Updated payment status successfully"),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn create_order_request_defaults_missing_charges_to_zero() {
        let req: CreateOrderReq = serde_json::from_str(
            r#"{"cartId": 3, "addressId": 9, "paymentMethod": "cash", "notes": "  "}"#,
        )
        .unwrap();
        let input: CreateOrderInput = req.into();

        assert_eq!(input.cart_id, 3);
        assert_eq!(input.address_id, 9);
        assert_eq!(input.payment_method, PaymentMethod::Cash);
        assert_eq!(input.notes, None);
        assert!(input.tax.is_zero());
        assert!(input.total_amount.is_none());
    }

    #[test]
    fn create_order_request_accepts_decimal_charges() {
        let req: CreateOrderReq = serde_json::from_str(
            r#"{"cartId": 1, "addressId": 2, "paymentMethod": "card",
                "tax": "2.50", "deliveryFee": "3.00", "discount": "0", "totalAmount": "30.50"}"#,
        )
        .unwrap();
        let input: CreateOrderInput = req.into();

        assert_eq!(input.tax, BigDecimal::from_str("2.50").unwrap());
        assert_eq!(
            input.total_amount,
            Some(BigDecimal::from_str("30.50").unwrap())
        );
    }

    #[test]
    fn status_request_rejects_unknown_status() {
        let result = serde_json::from_str::<UpdateOrderStatusReq>(r#"{"status": "shipped"}"#);
        assert!(result.is_err());
    }
}
