use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Tx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Viewer,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: Role,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub country: Option<String>,
    pub age: Option<i32>,
    pub date_of_birth: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const USER_COLUMNS: &str = r#"id, first_name, last_name, email, hashed_password, role,
       address, postal_code, city, county, country, age, date_of_birth,
       created_at, updated_at"#;

pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn find_by_id(tx: &mut Tx, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
}

/// Like [`find_by_id`] but takes a row lock, so concurrent updates to the
/// same row serialize until this transaction completes.
pub async fn find_by_id_for_update(tx: &mut Tx, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn insert(tx: &mut Tx, user: &User) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, first_name, last_name, email, hashed_password, role,
                           address, postal_code, city, county, country, age,
                           date_of_birth, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.hashed_password)
    .bind(user.role)
    .bind(&user.address)
    .bind(&user.postal_code)
    .bind(&user.city)
    .bind(&user.county)
    .bind(&user.country)
    .bind(user.age)
    .bind(&user.date_of_birth)
    .bind(user.created_at)
    .bind(user.updated_at)
    .fetch_one(&mut **tx)
    .await
}

pub async fn update(tx: &mut Tx, user: &User) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET role = $2, address = $3, postal_code = $4, city = $5, county = $6,
            country = $7, updated_at = $8
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(user.role)
    .bind(&user.address)
    .bind(&user.postal_code)
    .bind(&user.city)
    .bind(&user.county)
    .bind(&user.country)
    .bind(user.updated_at)
    .fetch_one(&mut **tx)
    .await
}

pub async fn delete(tx: &mut Tx, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn list(db: &PgPool, offset: i64, limit: i64) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        ORDER BY created_at
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

#[cfg(test)]
pub fn mock_user(role: Role) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        first_name: "mock".into(),
        last_name: "mock".into(),
        email: "mock@one.com".into(),
        hashed_password: "hash".into(),
        role,
        address: None,
        postal_code: None,
        city: Some("Nottingham".into()),
        county: Some("Nottinghamshire".into()),
        country: Some("United Kingdom".into()),
        age: Some(32),
        date_of_birth: "01/01/1991".into(),
        created_at: now,
        updated_at: now,
    }
}
