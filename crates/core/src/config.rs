//! Configuration management for AskDoc.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - YAML config file (`askdoc.yaml` in the working directory, or `ASKDOC_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "askdoc.yaml";

/// Embedding providers the knowledge crate knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["hash", "ollama", "gemini"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root under which each collection keeps its raw files
    pub data_root: PathBuf,

    /// Root under which each collection keeps its persisted index
    pub index_root: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// API key for credentialed providers (GOOGLE_API_KEY / GEMINI_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSettings {
    /// Provider name: "hash", "ollama" or "gemini"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum number of texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Provider endpoint override (Ollama URL, Gemini API base)
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_batch_size() -> usize {
    100
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(), // Offline-first default
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: default_batch_size(),
            endpoint: None,
        }
    }
}

impl EmbeddingSettings {
    /// Settings matching a provider's usual model, used when only the provider is named.
    pub fn for_provider(provider: &str) -> Self {
        match provider {
            "gemini" => Self {
                provider: "gemini".to_string(),
                model: "text-embedding-004".to_string(),
                dimensions: 768,
                ..Self::default()
            },
            "ollama" => Self {
                provider: "ollama".to_string(),
                model: "nomic-embed-text".to_string(),
                dimensions: 768,
                ..Self::default()
            },
            other => Self {
                provider: other.to_string(),
                ..Self::default()
            },
        }
    }
}

/// YAML config file structure. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    storage: Option<StorageSection>,
    chunking: Option<ChunkingSection>,
    embedding: Option<EmbeddingSettings>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageSection {
    data_dir: Option<PathBuf>,
    index_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkingSection {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            index_root: PathBuf::from("./vector_index"),
            config_file: None,
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding: EmbeddingSettings::default(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `ASKDOC_CONFIG`: Path to config file
    /// - `ASKDOC_DATA_DIR`, `ASKDOC_INDEX_DIR`: Storage roots
    /// - `ASKDOC_CHUNK_SIZE`, `ASKDOC_CHUNK_OVERLAP`: Chunking parameters
    /// - `ASKDOC_EMBEDDING_PROVIDER`, `ASKDOC_EMBEDDING_MODEL`: Embedding selection
    /// - `GOOGLE_API_KEY` or `GEMINI_API_KEY`: Credential for the gemini provider
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use askdoc_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Data root: {:?}", config.data_root);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(config_file) = std::env::var("ASKDOC_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(dir) = std::env::var("ASKDOC_DATA_DIR") {
            config.data_root = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("ASKDOC_INDEX_DIR") {
            config.index_root = PathBuf::from(dir);
        }

        if let Ok(size) = std::env::var("ASKDOC_CHUNK_SIZE") {
            config.chunk_size = parse_env_usize("ASKDOC_CHUNK_SIZE", &size)?;
        }

        if let Ok(overlap) = std::env::var("ASKDOC_CHUNK_OVERLAP") {
            config.chunk_overlap = parse_env_usize("ASKDOC_CHUNK_OVERLAP", &overlap)?;
        }

        if let Ok(provider) = std::env::var("ASKDOC_EMBEDDING_PROVIDER") {
            if provider != config.embedding.provider {
                config.embedding = EmbeddingSettings::for_provider(provider.trim());
            }
        }

        if let Ok(model) = std::env::var("ASKDOC_EMBEDDING_MODEL") {
            config.embedding.model = model.trim().to_string();
        }

        config.api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(storage) = config_file.storage {
            if let Some(dir) = storage.data_dir {
                result.data_root = dir;
            }
            if let Some(dir) = storage.index_dir {
                result.index_root = dir;
            }
        }

        if let Some(chunking) = config_file.chunking {
            if let Some(size) = chunking.chunk_size {
                result.chunk_size = size;
            }
            if let Some(overlap) = chunking.chunk_overlap {
                result.chunk_overlap = overlap;
            }
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        data_root: Option<PathBuf>,
        index_root: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(data_root) = data_root {
            self.data_root = data_root;
        }

        if let Some(index_root) = index_root {
            self.index_root = index_root;
        }

        if let Some(provider) = provider {
            if provider != self.embedding.provider {
                self.embedding = EmbeddingSettings::for_provider(&provider);
            }
        }

        if let Some(model) = model {
            self.embedding.model = model;
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

    /// Validate configuration before any collection work starts.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be greater than 0".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding dimensions and batch_size must be greater than 0".to_string(),
            ));
        }

        if provider == "gemini" && self.api_key.is_none() {
            return Err(AppError::Config(
                "API key not found. Set GOOGLE_API_KEY or GEMINI_API_KEY".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env_usize(var: &str, value: &str) -> AppResult<usize> {
    value.trim().parse().map_err(|e| {
        AppError::Config(format!("Invalid value for {}: {:?} ({})", var, value, e))
    })
}
