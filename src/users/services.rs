use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::auth::password;
use crate::cache::{self, InvalidationScope};
use crate::db::{self, Tx};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest};
use crate::users::repo::{self, User};

/// Base cache key for user listings; paginated reads append offset/limit.
pub const USERS_CACHE_KEY: &str = "users";
pub const USERS_CACHE_TTL: u64 = 3600;

/// Create a user: names are stored lower-cased, the password is hashed
/// before it touches the store, and the listing cache is cleared afterwards.
pub async fn create_user(state: &AppState, form: CreateUserRequest) -> Result<User, ApiError> {
    form.validate()?;
    let hashed_password = password::hash_password(&form.password).map_err(ApiError::internal)?;

    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        first_name: form.first_name.to_lowercase(),
        last_name: form.last_name.to_lowercase(),
        email: form.email.trim().to_string(),
        hashed_password,
        role: form.role,
        address: form.address,
        postal_code: form.postal_code,
        city: form.city,
        county: form.county,
        country: form.country,
        age: form.age,
        date_of_birth: form.date_of_birth,
        created_at: now,
        updated_at: now,
    };

    let created = db::with_transaction(&state.db, move |tx: &mut Tx| {
        Box::pin(async move { repo::insert(tx, &user).await.map_err(ApiError::from) })
    })
    .await?;

    cache::invalidate(state.cache.as_ref(), USERS_CACHE_KEY, InvalidationScope::Prefix).await?;
    info!(user_guid = %created.id, email = %created.email, "user created");
    Ok(created)
}

pub async fn delete_user(state: &AppState, user_guid: Uuid) -> Result<Uuid, ApiError> {
    let deleted = db::with_transaction(&state.db, move |tx: &mut Tx| {
        Box::pin(async move {
            let user = repo::find_by_id(tx, user_guid).await?.ok_or_else(|| {
                ApiError::NotFound(format!("User with guid '{user_guid}' not found"))
            })?;
            repo::delete(tx, user.id).await?;
            Ok(user.id)
        })
    })
    .await?;

    cache::invalidate(state.cache.as_ref(), USERS_CACHE_KEY, InvalidationScope::Prefix).await?;
    info!(user_guid = %deleted, "user deleted");
    Ok(deleted)
}

/// Update a user under a row lock, so concurrent updates to the same row
/// serialize (last writer wins). The update form overwrites its fields
/// wholesale; see `UpdateUserRequest`.
pub async fn update_user(
    state: &AppState,
    user_guid: Uuid,
    form: UpdateUserRequest,
) -> Result<User, ApiError> {
    let updated = db::with_transaction(&state.db, move |tx: &mut Tx| {
        Box::pin(async move {
            let mut user = repo::find_by_id_for_update(tx, user_guid)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("User with guid '{user_guid}' not found"))
                })?;
            form.apply(&mut user);
            user.updated_at = OffsetDateTime::now_utc();
            repo::update(tx, &user).await.map_err(ApiError::from)
        })
    })
    .await?;

    cache::invalidate(state.cache.as_ref(), USERS_CACHE_KEY, InvalidationScope::Prefix).await?;
    info!(user_guid = %updated.id, "user updated");
    Ok(updated)
}

pub async fn list_users(state: &AppState, offset: i64, limit: i64) -> Result<Vec<User>, ApiError> {
    repo::list(&state.db, offset, limit)
        .await
        .map_err(ApiError::from)
}
