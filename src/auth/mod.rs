mod claims;
pub mod dto;
pub mod jwt;
pub mod password;
mod principal;
pub mod service;

pub use claims::Claims;
pub use jwt::JwtKeys;
pub use principal::{require_role, Principal};
