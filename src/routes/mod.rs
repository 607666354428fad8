use utoipa_axum::router::OpenApiRouter;

use crate::app_state::AppState;

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod ratings;
pub mod restaurants;

/// Every HTTP route of the service, with its OpenAPI description.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(restaurants::routes_with_openapi())
        .merge(carts::routes_with_openapi())
        .merge(orders::routes_with_openapi())
        .merge(ratings::routes_with_openapi())
        .merge(addresses::routes_with_openapi())
}
