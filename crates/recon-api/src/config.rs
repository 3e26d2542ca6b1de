use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub database_url: String,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub groq_api_key: String,
    #[serde(default)]
    pub notion_token: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// "gemini" or "groq"
    pub provider: String,
    /// Model name; for gemini this heads the discovery candidate list.
    pub model: String,
    pub max_payload_bytes: Option<usize>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: String::new(),
            max_payload_bytes: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    pub embedding_model: String,
    pub qdrant_url: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_model: "BAAI/bge-small-en-v1.5".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    pub scrape_timeout_secs: u64,
    pub search_timeout_secs: u64,
    /// Disable in Docker/CI environments.
    pub browser_sandbox: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            scrape_timeout_secs: 60,
            search_timeout_secs: 30,
            browser_sandbox: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsConfig {
    pub notion_parent_page_id: Option<String>,
    pub email_endpoint: Option<String>,
    pub email_to: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, LLM_, MEMORY_, TOOLS_, LOG_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::default()
                    .prefix("SERVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LLM")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("MEMORY")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("TOOLS")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LOG")
                    .separator("_")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Secrets come from ENV, never from TOML.
        cfg.database_url = std::env::var("DATABASE_URL").map_err(|_| {
            ConfigError::Message("DATABASE_URL environment variable is required".to_string())
        })?;
        cfg.gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        cfg.groq_api_key = std::env::var("GROQ_API_KEY").unwrap_or_default();
        cfg.notion_token = std::env::var("NOTION_TOKEN").ok();
        cfg.api_key = std::env::var("API_KEY").ok();

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_structure() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 8000

            [cors]
            enabled = true
            origins = ["http://localhost:3000"]

            [llm]
            provider = "groq"
            model = "llama-3.3-70b-versatile"
            timeout_secs = 60

            [memory]
            embedding_model = "BAAI/bge-small-en-v1.5"
            qdrant_url = "http://localhost:6334"
            chunk_size = 1000
            chunk_overlap = 150

            [tools]
            scrape_timeout_secs = 60
            search_timeout_secs = 30
            browser_sandbox = false

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.provider, "groq");
        assert!(!config.tools.browser_sandbox);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.memory.embedding_model, "BAAI/bge-small-en-v1.5");
        assert_eq!(config.tools.scrape_timeout_secs, 60);
        assert_eq!(config.llm.provider, "gemini");
    }
}
