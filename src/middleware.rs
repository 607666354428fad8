use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{
    app_error::AppError,
    domain::roles::{ADMIN_ROLES, Principal, Role},
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Reads the principal forwarded by the identity gateway.
///
/// `Ok(None)` when neither header is present; malformed or partial headers are rejected.
pub fn principal_from_headers(headers: &HeaderMap) -> Result<Option<Principal>, AppError> {
    let id = headers.get(USER_ID_HEADER);
    let role = headers.get(USER_ROLE_HEADER);

    let (id, role) = match (id, role) {
        (None, None) => return Ok(None),
        (Some(id), Some(role)) => (id, role),
        _ => return Err(AppError::Unauthorized),
    };

    let id: i32 = id
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or(AppError::Unauthorized)?;
    let role: Role = role
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or(AppError::Unauthorized)?;

    Ok(Some(Principal { id, role }))
}

fn require_roles(headers: &HeaderMap, allowed: &[Role]) -> Result<Principal, AppError> {
    let principal = principal_from_headers(headers)?.ok_or(AppError::Unauthorized)?;
    if !principal.has_any_role(allowed) {
        return Err(AppError::ForbiddenResource(format!(
            "Role {} is not permitted to access this resource",
            principal.role.as_str()
        )));
    }
    Ok(principal)
}

/// Any authenticated caller. Exposes `Extension<Principal>` to handlers.
pub async fn authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let principal = principal_from_headers(req.headers())?.ok_or(AppError::Unauthorized)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Admin and restaurant-admin callers only.
pub async fn admin_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let principal = require_roles(req.headers(), ADMIN_ROLES)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Anonymous callers are allowed through. Exposes `Extension<Option<Principal>>`.
pub async fn identification(mut req: Request, next: Next) -> Result<Response, AppError> {
    let principal = principal_from_headers(req.headers())?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
