//! Service configuration: defaults, JSON file loading, and `MM_*` environment overrides.

use crate::error::{MmError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MM_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub embedding: EmbeddingConfig,
    pub answer: AnswerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory holding the image files.
    pub path: PathBuf,
    /// Allowed file extensions, compared case-insensitively and without the leading dot.
    pub extensions: Vec<String>,
    /// Embedding cache file. Unchanged files reuse their cached vector on rebuild.
    pub cache_path: Option<PathBuf>,
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub max_query_chars: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./image_library"),
            extensions: ["jpg", "jpeg", "png", "bmp", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cache_path: None,
            default_top_k: 5,
            max_top_k: 50,
            max_query_chars: 512,
        }
    }
}

impl LibraryConfig {
    /// Whether `path` carries one of the allowed extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Remote embedding sidecar reached over HTTP.
    Http,
    /// Deterministic feature-hashing embedder, no model required.
    Hash,
}

impl ProviderKind {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" | "remote" => Some(Self::Http),
            "hash" | "hashing" | "offline" => Some(Self::Hash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    /// Output dimension of the hashing provider. Ignored for `http`.
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Http,
            base_url: "http://127.0.0.1:9000".into(),
            dimension: 512,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// `None` disables `/vqa`.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl ServiceConfig {
    /// Load configuration. An explicit path must exist; otherwise the user
    /// config directory is tried, then built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `MM_*` overrides resolved through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("MM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("MM_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| MmError::InvalidConfig(format!("MM_PORT is not a port: {port}")))?;
        }
        if let Some(path) = lookup("MM_LIBRARY_PATH") {
            self.library.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("MM_CACHE_PATH") {
            self.library.cache_path = Some(PathBuf::from(path));
        }
        if let Some(kind) = lookup("MM_EMBEDDING_PROVIDER") {
            self.embedding.provider = ProviderKind::from_str_loose(&kind)
                .ok_or_else(|| MmError::InvalidConfig(format!("unknown embedding provider: {kind}")))?;
        }
        if let Some(url) = lookup("MM_EMBEDDING_URL") {
            self.embedding.base_url = url;
        }
        if let Some(url) = lookup("MM_ANSWER_URL") {
            self.answer.base_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(level) = lookup("MM_LOG") {
            self.log.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(MmError::InvalidConfig("server.port must be non-zero".into()));
        }
        if self.library.extensions.is_empty() {
            return Err(MmError::InvalidConfig("library.extensions must not be empty".into()));
        }
        if self.library.max_top_k == 0 {
            return Err(MmError::InvalidConfig("library.max_top_k must be at least 1".into()));
        }
        if self.library.default_top_k == 0 || self.library.default_top_k > self.library.max_top_k {
            return Err(MmError::InvalidConfig(format!(
                "library.default_top_k must be in 1..={}",
                self.library.max_top_k
            )));
        }
        if self.library.max_query_chars == 0 {
            return Err(MmError::InvalidConfig("library.max_query_chars must be at least 1".into()));
        }
        if self.embedding.provider == ProviderKind::Hash && self.embedding.dimension == 0 {
            return Err(MmError::InvalidConfig("embedding.dimension must be non-zero".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `<config dir>/mm-retrieval/config.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mm-retrieval").join("config.json"))
}
