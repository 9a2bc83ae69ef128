use axum::extract::FromRef;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::auth::dto::{LoginForm, TokenResponse};
use crate::auth::{password, JwtKeys};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::{self, User};

/// Check credentials against the stored hash. `None` means authentication
/// failed, either because no user carries that email or because the password
/// does not match.
pub async fn authenticate(
    db: &PgPool,
    email: &str,
    password_plain: &str,
) -> Result<Option<User>, ApiError> {
    let Some(user) = repo::find_by_email(db, email).await.map_err(ApiError::from)? else {
        return Ok(None);
    };
    let matches = password::verify_password(password_plain, &user.hashed_password)
        .map_err(ApiError::internal)?;
    Ok(matches.then_some(user))
}

/// Authenticate and issue a bearer token. The raw token is mirrored into the
/// cache under a per-user key with the same TTL; the signature remains the
/// source of truth.
pub async fn login(state: &AppState, form: LoginForm) -> Result<TokenResponse, ApiError> {
    let user = authenticate(&state.db, &form.username, &form.password)
        .await?
        .ok_or_else(|| {
            warn!(email = %form.username, "login failed");
            ApiError::Unauthorized("Incorrect email or password".into())
        })?;

    let keys = JwtKeys::from_ref(state);
    let token = keys
        .sign(&user.email, user.id, Some(keys.ttl))
        .map_err(ApiError::internal)?;

    state
        .cache
        .set_ex(&format!("{}_auth_token", user.id), &token, keys.ttl.as_secs())
        .await
        .map_err(ApiError::internal)?;

    info!(user_guid = %user.id, email = %user.email, "user logged in");
    Ok(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
    })
}
