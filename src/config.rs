use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path of the local SQLite file holding sessions, messages and the cache
    pub sqlite_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Similarity threshold as a percentage (0-100)
    pub similarity_threshold: u32,
    /// Default TTL for new cache entries, in seconds (0 = never expires)
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env first so the overrides below can see it
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("storage.sqlite_path", "./app_data.sqlite")?
            .set_default("llm.gateway_url", "http://localhost:8080")?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.temperature", 0.6)?
            .set_default("cache.similarity_threshold", 90)?
            .set_default("cache.ttl_seconds", 86400)?
            .set_default("logging.level", "info")?;

        // Load from environment variables
        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(8000))?;
        }

        if let Ok(sqlite_path) = env::var("SQLITE_PATH") {
            builder = builder.set_override("storage.sqlite_path", sqlite_path)?;
        }

        if let Ok(gateway_url) = env::var("LLM_GATEWAY_URL") {
            builder = builder.set_override("llm.gateway_url", gateway_url)?;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            builder = builder.set_override("llm.api_key", api_key)?;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            builder = builder.set_override("llm.model", model)?;
        }

        if let Ok(temperature) = env::var("LLM_TEMPERATURE") {
            builder = builder.set_override("llm.temperature", temperature.parse::<f32>().unwrap_or(0.6) as f64)?;
        }

        if let Ok(threshold) = env::var("CACHE_SIMILARITY_THRESHOLD") {
            builder = builder.set_override("cache.similarity_threshold", threshold.parse::<u32>().unwrap_or(90))?;
        }

        if let Ok(ttl) = env::var("CACHE_TTL_SECONDS") {
            builder = builder.set_override("cache.ttl_seconds", ttl.parse::<i64>().unwrap_or(86400))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
