use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::{self, Role, User};

/// The authenticated user behind the request's bearer token.
pub struct Principal(pub User);

fn credentials_error() -> ApiError {
    ApiError::Unauthorized("Could not validate credentials".into())
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(credentials_error)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(credentials_error)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token)?;
        if claims.sub.is_empty() {
            return Err(credentials_error());
        }

        let user = repo::find_by_email(&state.db, &claims.sub)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| {
                warn!(email = %claims.sub, "token subject has no matching user");
                credentials_error()
            })?;
        Ok(Principal(user))
    }
}

/// Role allow-list gate. Absent principals pass; role checks apply only once
/// a principal has been resolved upstream.
pub fn require_role(principal: Option<&User>, allowed: &[Role]) -> Result<(), ApiError> {
    if let Some(user) = principal {
        if !allowed.contains(&user.role) {
            warn!(user_guid = %user.id, role = ?user.role, "role not permitted");
            return Err(ApiError::Unauthorized("Not authorized".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::mock_user;

    #[test]
    fn viewer_is_rejected_from_admin_operations() {
        let user = mock_user(Role::Viewer);
        let err = require_role(Some(&user), &[Role::Admin]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn viewer_and_admin_may_list() {
        let viewer = mock_user(Role::Viewer);
        let admin = mock_user(Role::Admin);
        assert!(require_role(Some(&viewer), &[Role::Admin, Role::Viewer]).is_ok());
        assert!(require_role(Some(&admin), &[Role::Admin, Role::Viewer]).is_ok());
    }

    #[test]
    fn absent_principal_passes() {
        assert!(require_role(None, &[Role::Admin]).is_ok());
    }
}
