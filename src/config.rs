use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(psw) => format!("redis://:{}@{}:{}", psw, self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_minutes: u64,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let redis = RedisConfig {
            host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: std::env::var("REDIS_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(6379),
            password: std::env::var("REDIS_PSW").ok().filter(|v| !v.is_empty()),
        };
        let jwt = JwtConfig {
            secret: std::env::var("SECRET_KEY")?,
            algorithm: std::env::var("ALGORITHM").unwrap_or_else(|_| "HS256".into()),
            ttl_seconds: std::env::var("ACCESS_TOKEN_EXPIRE_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(900),
        };
        let rate_limit = RateLimitConfig {
            window_minutes: std::env::var("RATE_LIMIT_DURATION")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1),
            max_requests: std::env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
        };
        Ok(Self {
            database_url,
            redis,
            jwt,
            rate_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_with_and_without_password() {
        let mut cfg = RedisConfig {
            host: "cache.local".into(),
            port: 6380,
            password: None,
        };
        assert_eq!(cfg.url(), "redis://cache.local:6380");
        cfg.password = Some("s3cret".into());
        assert_eq!(cfg.url(), "redis://:s3cret@cache.local:6380");
    }
}
