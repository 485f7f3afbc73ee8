/// Runtime configuration, read once at startup from the environment
/// (and a `.env` file when present).
use std::env;

const DEV_JWT_SECRET: &str = "storyhub-development-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cors: CorsConfig,
    /// Create demo users and stories on an empty database
    pub seed_demo_data: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// development, staging, production
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime in seconds
    pub expiration_secs: i64,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins, or `*`
    pub allowed_origins: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

impl CorsConfig {
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn allows_any(&self) -> bool {
        self.allowed_origins.trim() == "*"
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Missing .env is fine, the variables may come from the process env
        let _ = dotenvy::dotenv();

        let app = AppConfig {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: env::var("STORYHUB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("STORYHUB_PORT", 3000)?,
        };

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if app.is_production() => {
                return Err("JWT_SECRET must be set in production".to_string());
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let allowed_origins = env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if app.is_production() && allowed_origins.trim() == "*" {
            return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
        }

        let expiration_secs = parse_var("JWT_EXPIRATION_SECS", 86_400)?;
        if expiration_secs <= 0 {
            return Err("JWT_EXPIRATION_SECS must be positive".to_string());
        }

        Ok(Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://storyhub.db".to_string()),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expiration_secs,
            },
            cors: CorsConfig { allowed_origins },
            seed_demo_data: parse_var("SEED_DEMO_DATA", false)?,
            app,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            app: AppConfig {
                env: "test".to_string(),
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiration_secs: 3600,
            },
            cors: CorsConfig {
                allowed_origins: "*".to_string(),
            },
            seed_demo_data: false,
        }
    }
}
