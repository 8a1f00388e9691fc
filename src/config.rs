use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Upper bound of the Postgres connection pool.
    pub db_max_connections: u32,
    /// Base URL of the primary registry (ReceitaWS).
    pub receitaws_base_url: String,
    /// Base URL of the secondary registry (BrasilAPI).
    pub brasilapi_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a positive number"))?,
            receitaws_base_url: std::env::var("RECEITAWS_BASE_URL")
                .unwrap_or_else(|_| "https://www.receitaws.com.br/v1".to_string()),
            brasilapi_base_url: std::env::var("BRASILAPI_BASE_URL")
                .unwrap_or_else(|_| "https://brasilapi.com.br".to_string()),
        };

        if !config.receitaws_base_url.starts_with("http://")
            && !config.receitaws_base_url.starts_with("https://")
        {
            anyhow::bail!("RECEITAWS_BASE_URL must start with http:// or https://");
        }
        if !config.brasilapi_base_url.starts_with("http://")
            && !config.brasilapi_base_url.starts_with("https://")
        {
            anyhow::bail!("BRASILAPI_BASE_URL must start with http:// or https://");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("ReceitaWS Base URL: {}", config.receitaws_base_url);
        tracing::debug!("BrasilAPI Base URL: {}", config.brasilapi_base_url);
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("DB pool max connections: {}", config.db_max_connections);

        Ok(config)
    }
}
