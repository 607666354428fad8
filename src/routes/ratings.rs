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
    models::ReviewResponseEntity,
    services::ratings::{self, RatingWithResponse},
};

/// Review browsing is public. Answering a review is for admin roles. Submitting a rating lives
/// with the order routes since it is scoped to an order.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(list_restaurant_ratings))
        .routes(utoipa_axum::routes!(list_menu_item_ratings));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(respond_to_review))
        .route_layer(axum::middleware::from_fn(middleware::admin_authorization));

    public_routes.merge(admin_routes)
}

/// Visible reviews of every item a restaurant serves.
#[utoipa::path(
    get,
    path = "/restaurants/{id}/ratings",
    tags = ["Ratings"],
    params(
        ("id" = i32, Path, description = "Restaurant ID")
    ),
    responses(
        (status = 200, description = "List restaurant ratings", body = StdResponse<Vec<RatingWithResponse>, String>)
    )
)]
async fn list_restaurant_ratings(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let ratings = ratings::list_restaurant_ratings(conn, id).await?;

    Ok(StdResponse {
        data: Some(ratings),
        message: Some("Get restaurant ratings successfully"),
    })
}

/// Visible reviews of one menu item.
#[utoipa::path(
    get,
    path = "/menu-items/{id}/ratings",
    tags = ["Ratings"],
    params(
        ("id" = i32, Path, description = "Menu item ID")
    ),
    responses(
        (status = 200, description = "List menu item ratings", body = StdResponse<Vec<RatingWithResponse>, String>)
    )
)]
async fn list_menu_item_ratings(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let ratings = ratings::list_menu_item_ratings(conn, id).await?;

    Ok(StdResponse {
        data: Some(ratings),
        message: Some("Get menu item ratings successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct RespondToReviewReq {
    response: String,
}

/// Reply to a review. A review carries at most one reply.
#[utoipa::path(
    post,
    path = "/ratings/{id}/response",
    tags = ["Ratings"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Rating ID")
    ),
    request_body = RespondToReviewReq,
    responses(
        (status = 200, description = "Responded to review successfully", body = StdResponse<ReviewResponseEntity, String>),
        (status = 400, description = "Review already has a response"),
        (status = 404, description = "Review not found")
    )
)]
async fn respond_to_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<RespondToReviewReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let response = ratings::respond_to_review(conn, id, principal.id, body.response).await?;

    Ok(StdResponse {
        data: Some(response),
        message: Some("Responded to review successfully"),
    })
}
