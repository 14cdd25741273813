//! Configuration module for the asset codification pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CODARA_` and use double
//! underscores to separate nested levels:
//! - `CODARA_RETRIEVAL__TOP_K=10` sets `retrieval.top_k`
//! - `CODARA_CHAT__MODEL=llama-3.3-70b-versatile` sets `chat.model`
//! - `CODARA_SERVICE__MAX_RETRIES=5` sets `service.max_retries`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Vector index artifact settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding service settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat (extraction/arbitration/translation) service settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Candidate retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Secondary-language enrichment settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Shared external-service behavior
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Directory holding catalog.vec and catalog.jsonl
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama-style embedding endpoint
    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector dimension; must match the index artifacts
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatConfig {
    /// Base URL of the OpenAI-compatible chat endpoint
    #[serde(default = "default_chat_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Number of nearest neighbors to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Similarity threshold for candidate filtering
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranslationConfig {
    /// Enable secondary-language enrichment
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Target language for translated fields
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Per-call HTTP timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Whole-request deadline in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Bounded retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_true() -> bool {
    true
}
fn default_index_dir() -> PathBuf {
    PathBuf::from(".codara/index")
}
fn default_embedding_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_embedding_dimension() -> usize {
    768
}
fn default_chat_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_chat_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.6
}
fn default_target_language() -> String {
    "Arabic".to_string()
}
fn default_call_timeout() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
            retrieval: RetrievalConfig::default(),
            translation: TranslationConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_url(),
            model: default_chat_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_language: default_target_language(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".codara/settings.toml"));

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with CODARA_ prefix
            // Use double underscore (__) to separate nested levels
            .merge(Env::prefixed("CODARA_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CODARA_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the workspace root by looking for a .codara directory,
    /// searching from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".codara");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Resolve the chat API key from the configured environment variable
    pub fn chat_api_key(&self) -> Result<String, String> {
        match std::env::var(&self.chat.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(format!(
                "{} not set. Export it or change chat.api_key_env in settings.toml",
                self.chat.api_key_env
            )),
        }
    }
}
