use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Reads configuration from the process environment. Call `bootstrap::init_env` first so
/// values from `.env` are visible.
pub fn load() -> Result<AppConfig> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
        Ok(raw) => raw
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
        Err(_) => 10,
    };

    let host = std::env::var("SERVER_HOST").unwrap_or("0.0.0.0".to_string());
    let port = match std::env::var("SERVER_PORT") {
        Ok(raw) => raw.parse().context("SERVER_PORT must be a valid port")?,
        Err(_) => 3000,
    };

    Ok(AppConfig {
        server: ServerConfig { host, port },
        database: DatabaseConfig {
            url,
            max_connections,
        },
    })
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
