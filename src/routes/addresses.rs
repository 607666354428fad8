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
    models::AddressEntity,
    services::addresses::{self, NewAddress},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/addresses",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_addresses))
            .routes(utoipa_axum::routes!(create_address))
            .routes(utoipa_axum::routes!(set_primary_address))
            .route_layer(axum::middleware::from_fn(middleware::authorization)),
    )
}

/// Fetch the authenticated user's delivery addresses, primary first.
#[utoipa::path(
    get,
    path = "/my-addresses",
    tags = ["Addresses"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my addresses", body = StdResponse<Vec<AddressEntity>, String>)
    )
)]
async fn get_my_addresses(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let addresses = addresses::list_my_addresses(conn, principal.id).await?;

    Ok(StdResponse {
        data: Some(addresses),
        message: Some("Get my addresses successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateAddressReq {
    label: Option<String>,
    street: String,
    city: String,
    postal_code: Option<String>,
    #[serde(default)]
    is_primary: bool,
}

/// Add a delivery address for the authenticated user.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Addresses"],
    security(("bearerAuth" = [])),
    request_body = CreateAddressReq,
    responses(
        (status = 200, description = "Created address successfully", body = StdResponse<AddressEntity, String>)
    )
)]
async fn create_address(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateAddressReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let address = addresses::create_address(
        conn,
        principal.id,
        NewAddress {
            label: body.label,
            street: body.street,
            city: body.city,
            postal_code: body.postal_code,
            make_primary: body.is_primary,
        },
    )
    .await?;

    Ok(StdResponse {
        data: Some(address),
        message: Some("Created address successfully"),
    })
}

/// Make an address the authenticated user's primary address.
#[utoipa::path(
    patch,
    path = "/{id}/primary",
    tags = ["Addresses"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Address ID")
    ),
    responses(
        (status = 200, description = "Set primary address successfully", body = StdResponse<AddressEntity, String>),
        (status = 404, description = "Address not found")
    )
)]
async fn set_primary_address(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let address = addresses::set_primary_address(conn, principal.id, id).await?;

    Ok(StdResponse {
        data: Some(address),
        message: Some("Set primary address successfully"),
    })
}
