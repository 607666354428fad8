use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    domain::roles::Principal,
    middleware,
    models::{CartEntity, CartItemEntity},
    services::carts::{self, CartDetail},
};

/// Cart routes. Anonymous callers may work with unowned carts; carts opened by a signed-in user
/// are only reachable by that user.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let cart_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_cart))
        .routes(utoipa_axum::routes!(get_my_carts))
        .routes(utoipa_axum::routes!(get_cart))
        .routes(utoipa_axum::routes!(delete_cart))
        .routes(utoipa_axum::routes!(add_cart_item))
        .route_layer(axum::middleware::from_fn(middleware::identification));

    let cart_item_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(update_cart_item))
        .routes(utoipa_axum::routes!(remove_cart_item))
        .route_layer(axum::middleware::from_fn(middleware::identification));

    OpenApiRouter::new()
        .nest("/carts", cart_routes)
        .nest("/cart-items", cart_item_routes)
}

fn caller_id(principal: &Option<Principal>) -> Option<i32> {
    principal.as_ref().map(|principal| principal.id)
}

/// Open an empty cart against a restaurant.
#[utoipa::path(
    post,
    path = "/{id}",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Restaurant ID the cart is for")
    ),
    responses(
        (status = 200, description = "Created cart successfully", body = StdResponse<CartEntity, String>),
        (status = 404, description = "Restaurant not found"),
        (status = 409, description = "Caller already has a cart for this restaurant")
    )
)]
async fn create_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = carts::create_cart(conn, id, caller_id(&principal)).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Created cart successfully"),
    })
}

/// Fetch all carts belonging to the authenticated user.
#[utoipa::path(
    get,
    path = "/my-carts",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my carts", body = StdResponse<Vec<CartDetail>, String>),
        (status = 401, description = "Not signed in")
    )
)]
async fn get_my_carts(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<impl IntoResponse, AppError> {
    let principal = principal.ok_or(AppError::Unauthorized)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let carts = carts::get_my_carts(conn, principal.id).await?;

    Ok(StdResponse {
        data: Some(carts),
        message: Some("Get my carts successfully"),
    })
}

/// Fetch a cart with its items and subtotal.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Cart ID to fetch")
    ),
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<CartDetail, String>),
        (status = 404, description = "Cart not found")
    )
)]
async fn get_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = carts::get_cart(conn, id, caller_id(&principal)).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Get cart successfully"),
    })
}

/// Delete a cart and all of its items.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Cart ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted cart successfully", body = StdResponse<CartEntity, String>),
        (status = 404, description = "Cart not found")
    )
)]
async fn delete_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = carts::delete_cart(conn, id, caller_id(&principal)).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Deleted cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct AddCartItemReq {
    menu_item_id: i32,
    quantity: i32,
}

/// Add a menu item to a cart, merging with an existing line for the same item.
#[utoipa::path(
    post,
    path = "/{id}/items",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Cart ID")
    ),
    request_body = AddCartItemReq,
    responses(
        (status = 200, description = "Added cart item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 400, description = "Invalid quantity, unavailable item or item from another restaurant"),
        (status = 404, description = "Cart or menu item not found")
    )
)]
async fn add_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
    Json(body): Json<AddCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = carts::add_item(
        conn,
        id,
        caller_id(&principal),
        body.menu_item_id,
        body.quantity,
    )
    .await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Added cart item successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateCartItemReq {
    quantity: i32,
}

/// Change the quantity of a cart item.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Cart item ID")
    ),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Updated cart item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 404, description = "Cart item not found")
    )
)]
async fn update_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = carts::update_item(conn, id, caller_id(&principal), body.quantity).await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Updated cart item successfully"),
    })
}

/// Remove an item from its cart.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Removed cart item successfully", body = StdResponse<CartItemEntity, String>),
        (status = 404, description = "Cart item not found")
    )
)]
async fn remove_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = carts::remove_item(conn, id, caller_id(&principal)).await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Removed cart item successfully"),
    })
}
