//! Session authentication and role guards

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use common::role::Role;
use common::session::{self, SESSION_COOKIE};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Allow access to `owner`'s data for the owner and for admins
    pub fn ensure_self_or_admin(&self, owner: Uuid) -> Result<(), ApiError> {
        if self.id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You are not allowed to access this resource".to_string(),
            ))
        }
    }

    /// Allow access to `owner`'s data for the owner only
    pub fn ensure_self(&self, owner: Uuid) -> Result<(), ApiError> {
        if self.id == owner {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You are not allowed to access this resource".to_string(),
            ))
        }
    }
}

/// Session token from `Authorization: Bearer` or the session cookie
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// Verifies the session token, rejects revoked tokens and loads the account,
/// so the role seen by handlers is the one currently stored.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from_headers(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".to_string()))?;

    let claims = state.sessions.verify(&token).map_err(|e| {
        warn!("Failed to validate token: {}", e);
        ApiError::Unauthorized("Not authorized, invalid token".to_string())
    })?;

    let revoked = session::is_revoked(&state.redis_pool, &token)
        .await
        .map_err(|e| {
            error!("Failed to check session revocation: {}", e);
            ApiError::InternalServerError
        })?;
    if revoked {
        return Err(ApiError::Unauthorized(
            "Not authorized, session has ended".to_string(),
        ));
    }

    let user = state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, user not found".to_string()))?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        role: user.role,
    });

    Ok(next.run(req).await)
}

fn require_role(req: &Request, role: Role) -> Result<AuthUser, ApiError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("Not authorized".to_string()))?;

    if user.role != role {
        warn!(user_id = %user.id, role = %user.role, required = %role, "Role check failed");
        return Err(ApiError::Forbidden(format!(
            "Not authorized as {}",
            role
        )));
    }
    Ok(user)
}

/// Admin-only guard, layered after [`auth_middleware`]
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&req, Role::Admin)?;
    Ok(next.run(req).await)
}

/// Customer-only guard, layered after [`auth_middleware`]
pub async fn require_customer(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&req, Role::Customer)?;
    Ok(next.run(req).await)
}
