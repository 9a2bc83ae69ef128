use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::dto::{LoginForm, TokenResponse};
use crate::auth::{require_role, service as auth_service, Principal};
use crate::cache;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{CreateUserRequest, Pagination, UpdateUserRequest, UserResponse};
use crate::users::repo::{Role, User};
use crate::users::services::{self, USERS_CACHE_KEY, USERS_CACHE_TTL};

// Gate order per endpoint is fixed: the rate limiter runs at the transport
// edge (outermost layer in app.rs), the principal is resolved by the
// extractor, the role check runs first in the handler body, and only then
// does the transaction boundary or cache gateway engage.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/create", post(create_new_user))
        .route("/users/:user_guid", axum::routing::patch(update_user).delete(delete_user))
        .route("/users/token", post(get_access_token))
}

#[instrument(skip(state, principal))]
async fn get_users(
    State(state): State<AppState>,
    principal: Principal,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(Some(&principal.0), &[Role::Admin, Role::Viewer])?;

    let key = cache::paginated_key(USERS_CACHE_KEY, pagination.offset, pagination.limit);
    let users = cache::read_through::<User, UserResponse, _, _>(
        state.cache.as_ref(),
        &key,
        USERS_CACHE_TTL,
        || async { services::list_users(&state, pagination.offset, pagination.limit).await },
    )
    .await?;
    Ok(Json(users))
}

#[instrument(skip(state, user_form))]
async fn create_new_user(
    State(state): State<AppState>,
    Json(user_form): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let created = services::create_user(&state, user_form).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

#[instrument(skip(state, principal, user_form))]
async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_guid): Path<Uuid>,
    Json(user_form): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_role(Some(&principal.0), &[Role::Admin])?;
    let updated = services::update_user(&state, user_guid, user_form).await?;
    Ok(Json(UserResponse::from(updated)))
}

#[instrument(skip(state, principal))]
async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_guid): Path<Uuid>,
) -> Result<(StatusCode, Json<Uuid>), ApiError> {
    require_role(Some(&principal.0), &[Role::Admin])?;
    let deleted = services::delete_user(&state, user_guid).await?;
    Ok((StatusCode::ACCEPTED, Json(deleted)))
}

#[instrument(skip(state, form))]
async fn get_access_token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let token = auth_service::login(&state, form).await?;
    Ok((StatusCode::ACCEPTED, Json(token)))
}
