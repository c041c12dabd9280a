//! Configuration management for Topica.
//!
//! Configuration is layered, lowest to highest precedence:
//! - Built-in defaults
//! - YAML config file (`.topica/config.yaml` in the workspace, or `--config`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: the document store and prompt
//! overrides live under `.topica/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Embedding providers understood by the knowledge crate.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .topica/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Chat model used for answer synthesis
    pub llm: LlmSettings,

    /// Embedding provider used for queries and ingestion
    pub embedding: EmbeddingSettings,

    /// Retrieval tuning
    pub retriever: RetrieverSettings,

    /// Document store location and pooling
    pub database: DatabaseSettings,
}

/// Chat LLM settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "gpt-oss:20b".to_string(),
            timeout_secs: 60,
            temperature: None,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider name: "ollama" or "mock"
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Expected vector length. `None` lets the first embedding fix it.
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout_secs: 60,
            dimensions: None,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrieverSettings {
    /// Default number of documents when the caller gives no hint
    pub top_k: u32,
    /// Excerpt budget per document, in characters (floored at 200)
    pub context_char_limit: usize,
    /// Run the full-text search when the vector search finds nothing
    pub text_fallback: bool,
    /// Optional similarity floor; vector hits below it are discarded
    pub min_similarity: Option<f32>,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_char_limit: 800,
            text_fallback: true,
            min_similarity: None,
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// SQLite file; defaults to `.topica/topics.sqlite` in the workspace
    pub path: Option<PathBuf>,
    pub pool_size: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 4,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    retriever: Option<RetrieverSettings>,
    database: Option<DatabaseSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            retriever: RetrieverSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `TOPICA_WORKSPACE`: Override workspace path
    /// - `TOPICA_CONFIG`: Path to config file
    /// - `TOPICA_DATABASE`: SQLite file
    /// - `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `OLLAMA_TIMEOUT_SECONDS`: chat model
    /// - `OLLAMA_EMBED_MODEL`, `EMBEDDING_PROVIDER`, `EMBEDDING_DIM`: embeddings
    /// - `RETRIEVER_TOP_K`, `RETRIEVER_CONTEXT_CHAR_LIMIT`: retrieval
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use topica_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with an explicit environment lookup.
    pub fn load_with<F>(env: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(workspace) = env("TOPICA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = env("TOPICA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.topica_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env(env)?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(retriever) = config_file.retriever {
            result.retriever = retriever;
        }
        if let Some(database) = config_file.database {
            result.database = database;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply environment overrides on top of file settings.
    fn apply_env<F>(&mut self, env: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env("TOPICA_DATABASE") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(url) = env("OLLAMA_BASE_URL") {
            self.llm.endpoint = url.clone();
            self.embedding.endpoint = url;
        }
        if let Some(model) = env("OLLAMA_MODEL") {
            self.llm.model = model;
        }
        if let Some(timeout) = env("OLLAMA_TIMEOUT_SECONDS") {
            let secs = parse_env::<f64>("OLLAMA_TIMEOUT_SECONDS", &timeout)?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(AppError::Config(format!(
                    "OLLAMA_TIMEOUT_SECONDS must be positive, got {}",
                    timeout
                )));
            }
            let secs = secs.ceil() as u64;
            self.llm.timeout_secs = secs;
            self.embedding.timeout_secs = secs;
        }

        if let Some(model) = env("OLLAMA_EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Some(provider) = env("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Some(dim) = env("EMBEDDING_DIM") {
            let dim = parse_env::<usize>("EMBEDDING_DIM", &dim)?;
            // 0 keeps the dimension lazy
            self.embedding.dimensions = (dim > 0).then_some(dim);
        }

        if let Some(top_k) = env("RETRIEVER_TOP_K") {
            self.retriever.top_k = parse_env("RETRIEVER_TOP_K", &top_k)?;
        }
        if let Some(limit) = env("RETRIEVER_CONTEXT_CHAR_LIMIT") {
            self.retriever.context_char_limit = parse_env("RETRIEVER_CONTEXT_CHAR_LIMIT", &limit)?;
        }

        if let Some(level) = env("RUST_LOG") {
            self.log_level = Some(level);
        }
        if env("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the environment and the file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .topica directory.
    pub fn topica_dir(&self) -> PathBuf {
        self.workspace.join(".topica")
    }

    /// Ensure the .topica directory exists.
    pub fn ensure_topica_dir(&self) -> AppResult<()> {
        let dir = self.topica_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .topica directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved SQLite path for the document store.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| self.topica_dir().join("topics.sqlite"))
    }

    /// Validate the loaded configuration.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.llm.timeout_secs == 0 || self.embedding.timeout_secs == 0 {
            return Err(AppError::Config(
                "Provider timeouts must be at least one second".to_string(),
            ));
        }

        if self.database.pool_size == 0 {
            return Err(AppError::Config(
                "Database pool size must be at least 1".to_string(),
            ));
        }

        if let Some(floor) = self.retriever.min_similarity {
            if !(0.0..=1.0).contains(&floor) {
                return Err(AppError::Config(format!(
                    "retriever.minSimilarity must be within [0, 1], got {}",
                    floor
                )));
            }
        }

        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        AppError::Config(format!("Invalid value for {}: '{}' ({})", key, value, e))
    })
}
