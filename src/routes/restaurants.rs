use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    domain::roles::Principal,
    middleware,
    models::{
        CategoryEntity, CreateRestaurantEntity, MenuItemEntity, RestaurantEntity,
        UpdateMenuItemEntity,
    },
    services::catalog::{self, NewMenuItem, RestaurantMenu},
};

/// Catalog routes. Browsing is public; writes need an admin role.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(list_restaurants))
        .routes(utoipa_axum::routes!(get_restaurant));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_restaurant))
        .routes(utoipa_axum::routes!(create_category))
        .routes(utoipa_axum::routes!(create_menu_item))
        .route_layer(axum::middleware::from_fn(middleware::admin_authorization));

    let menu_item_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(update_menu_item))
        .route_layer(axum::middleware::from_fn(middleware::admin_authorization));

    OpenApiRouter::new()
        .nest("/restaurants", public_routes.merge(admin_routes))
        .nest("/menu-items", menu_item_routes)
}

/// List active restaurants.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Restaurants"],
    responses(
        (status = 200, description = "List restaurants", body = StdResponse<Vec<RestaurantEntity>, String>)
    )
)]
async fn list_restaurants(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let restaurants = catalog::list_restaurants(conn).await?;

    Ok(StdResponse {
        data: Some(restaurants),
        message: Some("Get restaurants successfully"),
    })
}

/// Fetch a restaurant with its menu.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Restaurants"],
    params(
        ("id" = i32, Path, description = "Restaurant ID")
    ),
    responses(
        (status = 200, description = "Get restaurant successfully", body = StdResponse<RestaurantMenu, String>),
        (status = 404, description = "Restaurant not found")
    )
)]
async fn get_restaurant(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let menu = catalog::get_restaurant(conn, id).await?;

    Ok(StdResponse {
        data: Some(menu),
        message: Some("Get restaurant successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateRestaurantReq {
    name: String,
    description: Option<String>,
    address: String,
    phone: Option<String>,
}

/// Register a restaurant owned by the caller.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Restaurants"],
    security(("bearerAuth" = [])),
    request_body = CreateRestaurantReq,
    responses(
        (status = 200, description = "Created restaurant successfully", body = StdResponse<RestaurantEntity, String>)
    )
)]
async fn create_restaurant(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateRestaurantReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.name.trim().is_empty() || body.address.trim().is_empty() {
        return Err(AppError::BadRequest("Name and address are required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let restaurant = catalog::create_restaurant(
        conn,
        CreateRestaurantEntity {
            owner_id: Some(principal.id),
            name: body.name,
            description: body.description,
            address: body.address,
            phone: body.phone,
        },
    )
    .await?;

    Ok(StdResponse {
        data: Some(restaurant),
        message: Some("Created restaurant successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateCategoryReq {
    name: String,
}

/// Add a menu category to a restaurant.
#[utoipa::path(
    post,
    path = "/{id}/categories",
    tags = ["Restaurants"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Restaurant ID")
    ),
    request_body = CreateCategoryReq,
    responses(
        (status = 200, description = "Created category successfully", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn create_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = catalog::create_category(conn, id, body.name).await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Created category successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateMenuItemReq {
    category_id: i32,
    name: String,
    description: Option<String>,
    #[schema(value_type = String, example = "10.00")]
    price: BigDecimal,
    is_available: Option<bool>,
    image_url: Option<String>,
}

/// Add a menu item to a restaurant.
#[utoipa::path(
    post,
    path = "/{id}/menu-items",
    tags = ["Restaurants"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Restaurant ID")
    ),
    request_body = CreateMenuItemReq,
    responses(
        (status = 200, description = "Created menu item successfully", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn create_menu_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<CreateMenuItemReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Menu item name is required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = catalog::create_menu_item(
        conn,
        id,
        NewMenuItem {
            category_id: body.category_id,
            name: body.name,
            description: body.description,
            price: body.price,
            is_available: body.is_available.unwrap_or(true),
            image_url: body.image_url,
        },
    )
    .await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Created menu item successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateMenuItemReq {
    category_id: Option<i32>,
    name: Option<String>,
    description: Option<String>,
    #[schema(value_type = Option<String>, example = "12.50")]
    price: Option<BigDecimal>,
    is_available: Option<bool>,
    image_url: Option<String>,
}

/// Update selected fields of a menu item.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Restaurants"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Menu item ID")
    ),
    request_body = UpdateMenuItemReq,
    responses(
        (status = 200, description = "Updated menu item successfully", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn update_menu_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateMenuItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = catalog::update_menu_item(
        conn,
        id,
        UpdateMenuItemEntity {
            category_id: body.category_id,
            name: body.name,
            description: body.description,
            price: body.price,
            is_available: body.is_available,
            image_url: body.image_url,
        },
    )
    .await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Updated menu item successfully"),
    })
}
