use std::str::FromStr;
use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub algorithm: Algorithm,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let cfg = &state.config.jwt;
        let algorithm = Algorithm::from_str(&cfg.algorithm).unwrap_or_else(|_| {
            warn!(algorithm = %cfg.algorithm, "unknown signing algorithm, falling back to HS256");
            Algorithm::HS256
        });
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm,
            ttl: Duration::from_secs(cfg.ttl_seconds),
        }
    }
}

impl JwtKeys {
    /// Sign a token for the given subject. `ttl` falls back to 15 minutes
    /// when unspecified.
    pub fn sign(&self, email: &str, user_guid: Uuid, ttl: Option<Duration>) -> anyhow::Result<String> {
        let ttl = ttl.unwrap_or(DEFAULT_TOKEN_TTL);
        let exp = OffsetDateTime::now_utc() + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            user_guid,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(user_guid = %user_guid, "jwt signed");
        Ok(token)
    }

    /// Decode and validate signature and expiry. Any decode failure is an
    /// unauthorized error.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(self.algorithm);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            warn!(error = %e, "token verification failed");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;
        debug!(user_guid = %data.claims.user_guid, "jwt verified");
        Ok(data.claims)
    }
}
