use anyhow::{bail, Context, Result};

/// Where card and user documents live.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    /// Process-local store. Data is lost on restart.
    Memory,
}

/// Object storage for Markdown report archives.
#[derive(Debug, Clone, PartialEq)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub redis_url: Option<String>,
    pub anthropic_api_key: String,
    pub jwt_secret_key: String,
    pub jwt_expire_minutes: i64,
    pub firebase_project_id: Option<String>,
    pub rate_limit_per_minute: u32,
    pub auth_rate_limit_per_minute: u32,
    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP` instead of the
    /// socket peer. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
    pub cors_allowed_origins: Vec<String>,
    pub s3: Option<S3Config>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let store_backend = match env.optional("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres {
                database_url: env.require("DATABASE_URL")?,
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        let s3 = match env.optional("S3_BUCKET") {
            Some(bucket) => Some(S3Config {
                bucket,
                endpoint: env.require("S3_ENDPOINT")?,
                region: env
                    .optional("S3_REGION")
                    .unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: env.require("AWS_ACCESS_KEY_ID")?,
                secret_access_key: env.require("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        let cors_allowed_origins = env
            .optional("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            store_backend,
            redis_url: env.optional("REDIS_URL"),
            anthropic_api_key: env.require("ANTHROPIC_API_KEY")?,
            jwt_secret_key: env.require("JWT_SECRET_KEY")?,
            jwt_expire_minutes: env.parsed("JWT_EXPIRE_MINUTES", 60)?,
            firebase_project_id: env.optional("FIREBASE_PROJECT_ID"),
            rate_limit_per_minute: env.parsed("RATE_LIMIT_PER_MINUTE", 60)?,
            auth_rate_limit_per_minute: env.parsed("AUTH_RATE_LIMIT_PER_MINUTE", 5)?,
            trust_proxy_headers: env.parsed("TRUST_PROXY_HEADERS", false)?,
            cors_allowed_origins,
            s3,
            port: env.parsed("PORT", 8080)?,
            rust_log: env
                .optional("RUST_LOG")
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank values are treated the same.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.optional(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'")),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/skillcompass"),
        ("ANTHROPIC_API_KEY", "sk-test"),
        ("JWT_SECRET_KEY", "secret"),
    ];

    #[test]
    fn test_defaults_applied_when_optional_vars_missing() {
        let config = config_from(REQUIRED).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_expire_minutes, 60);
        assert_eq!(config.rate_limit_per_minute, 60);
        assert_eq!(config.auth_rate_limit_per_minute, 5);
        assert!(!config.trust_proxy_headers);
        assert_eq!(config.rust_log, "info");
        assert!(config.redis_url.is_none());
        assert!(config.s3.is_none());
        assert!(config.cors_allowed_origins.is_empty());
        assert_eq!(
            config.store_backend,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/skillcompass".to_string()
            }
        );
    }

    #[test]
    fn test_missing_jwt_secret_is_an_error() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/skillcompass"),
            ("ANTHROPIC_API_KEY", "sk-test"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET_KEY"));
    }

    #[test]
    fn test_memory_backend_does_not_need_database_url() {
        let config = config_from(&[
            ("STORE_BACKEND", "memory"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("JWT_SECRET_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("STORE_BACKEND", "firestore"));
        assert!(config_from(&pairs).is_err());
    }

    #[test]
    fn test_trust_proxy_headers_flag() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TRUST_PROXY_HEADERS", "true"));
        assert!(config_from(&pairs).unwrap().trust_proxy_headers);

        pairs.pop();
        pairs.push(("TRUST_PROXY_HEADERS", "sometimes"));
        assert!(config_from(&pairs).is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = config_from(&pairs).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_cors_origins_split_and_trimmed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((
            "CORS_ALLOWED_ORIGINS",
            "https://app.example.com, http://localhost:3000,",
        ));
        let config = config_from(&pairs).unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://app.example.com", "http://localhost:3000"]
        );
    }

    #[test]
    fn test_s3_bucket_requires_credentials() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("S3_BUCKET", "reports"));
        assert!(config_from(&pairs).is_err());

        pairs.push(("S3_ENDPOINT", "http://localhost:9000"));
        pairs.push(("AWS_ACCESS_KEY_ID", "minio"));
        pairs.push(("AWS_SECRET_ACCESS_KEY", "minio123"));
        let s3 = config_from(&pairs).unwrap().s3.unwrap();
        assert_eq!(s3.bucket, "reports");
        assert_eq!(s3.region, "us-east-1");
    }
}
