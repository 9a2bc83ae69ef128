use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description, Date};
use uuid::Uuid;

use crate::error::ApiError;
use crate::users::repo::{Role, User};

const DOB_FORMAT: &[FormatItem<'static>] = format_description!("[day]/[month]/[year]");

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Date of birth must be a real calendar date in `DD/MM/YYYY` form.
pub fn validate_date_of_birth(value: &str) -> Result<(), ApiError> {
    Date::parse(value, DOB_FORMAT).map_err(|_| {
        ApiError::Validation(format!("'{value}' is not a valid DD/MM/YYYY date"))
    })?;
    Ok(())
}

fn default_city() -> Option<String> {
    Some("Nottingham".into())
}

fn default_county() -> Option<String> {
    Some("Nottinghamshire".into())
}

fn default_country() -> Option<String> {
    Some("United Kingdom".into())
}

fn default_role() -> Role {
    Role::Admin
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub age: Option<i32>,
    pub date_of_birth: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default = "default_city")]
    pub city: Option<String>,
    #[serde(default = "default_county")]
    pub county: Option<String>,
    #[serde(default = "default_country")]
    pub country: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_email(self.email.trim()) {
            return Err(ApiError::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        crate::auth::password::validate_strength(&self.password)?;
        if let Some(age) = self.age {
            if age < 1 {
                return Err(ApiError::Validation("Age must be at least 1".into()));
            }
        }
        validate_date_of_birth(&self.date_of_birth)
    }
}

/// Update form. Omitted optionals fall back to the documented defaults, not
/// to the stored values: updates are full overwrites of these fields.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default = "default_city")]
    pub city: Option<String>,
    #[serde(default = "default_county")]
    pub county: Option<String>,
    #[serde(default = "default_country")]
    pub country: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
}

impl UpdateUserRequest {
    pub fn apply(&self, user: &mut User) {
        user.address = self.address.clone();
        user.postal_code = self.postal_code.clone();
        user.city = self.city.clone();
        user.county = self.county.clone();
        user.country = self.country.clone();
        user.role = self.role;
    }
}

/// Wire projection of a user; this is also the shape stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub country: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            address: user.address,
            postal_code: user.postal_code,
            city: user.city,
            county: user.county,
            country: user.country,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> CreateUserRequest {
        serde_json::from_value(serde_json::json!({
            "first_name": "Mock",
            "last_name": "Mock",
            "email": "mock@one.com",
            "password": "TestTest123!",
            "age": 32,
            "date_of_birth": "01/01/1991"
        }))
        .expect("valid form")
    }

    #[test]
    fn creation_form_applies_address_defaults() {
        let form = valid_form();
        assert_eq!(form.city.as_deref(), Some("Nottingham"));
        assert_eq!(form.county.as_deref(), Some("Nottinghamshire"));
        assert_eq!(form.country.as_deref(), Some("United Kingdom"));
        assert_eq!(form.role, Role::Admin);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn creation_form_rejects_weak_password() {
        let mut form = valid_form();
        form.password = "short1!".into();
        assert!(form.validate().is_err());
        form.password = "alllowercase1!".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn creation_form_rejects_bad_email() {
        let mut form = valid_form();
        form.email = "not-an-email".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn creation_form_rejects_age_below_one() {
        let mut form = valid_form();
        form.age = Some(0);
        assert!(form.validate().is_err());
    }

    #[test]
    fn date_of_birth_must_be_a_real_dd_mm_yyyy_date() {
        assert!(validate_date_of_birth("01/01/1991").is_ok());
        assert!(validate_date_of_birth("1991-01-01").is_err());
        assert!(validate_date_of_birth("31/02/1991").is_err());
    }

    #[test]
    fn update_form_overwrites_omitted_fields_with_defaults() {
        let form: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "address": "1 High Street",
            "role": "VIEWER"
        }))
        .expect("valid update form");

        let mut user = crate::users::repo::mock_user(Role::Admin);
        user.city = Some("Derby".into());
        form.apply(&mut user);

        assert_eq!(user.address.as_deref(), Some("1 High Street"));
        assert_eq!(user.role, Role::Viewer);
        // full-overwrite semantics: omitted city resets to the default
        assert_eq!(user.city.as_deref(), Some("Nottingham"));
    }

    #[test]
    fn projection_omits_password_material() {
        let user = crate::users::repo::mock_user(Role::Admin);
        let projection = UserResponse::from(user);
        let json = serde_json::to_string(&projection).unwrap();
        assert!(!json.contains("hashed_password"));
        assert!(json.contains("mock@one.com"));
        assert!(json.contains("\"role\":\"ADMIN\""));
    }
}
