use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // subject email
    pub user_guid: Uuid, // user ID
    pub exp: usize,      // expires at (unix timestamp)
}
