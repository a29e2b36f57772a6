use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::semantic::DEFAULT_MODEL;

/// Candidates fetched from the embedding index per query.
const DEFAULT_INITIAL_TOP_K: usize = 50;

/// Recommendations returned per query.
const DEFAULT_FINAL_TOP_K: usize = 16;

const DEFAULT_BOOKS_FILE: &str = "books_with_emotions.csv";
const DEFAULT_CORPUS_FILE: &str = "tagged_description.txt";

/// Embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name, e.g. "all-MiniLM-L6-v2"
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Recommendation pipeline settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendConfig {
    #[serde(default = "default_initial_top_k")]
    pub initial_top_k: usize,

    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            initial_top_k: DEFAULT_INITIAL_TOP_K,
            final_top_k: DEFAULT_FINAL_TOP_K,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_initial_top_k() -> usize {
    DEFAULT_INITIAL_TOP_K
}

fn default_final_top_k() -> usize {
    DEFAULT_FINAL_TOP_K
}

fn default_books_file() -> String {
    DEFAULT_BOOKS_FILE.to_string()
}

fn default_corpus_file() -> String {
    DEFAULT_CORPUS_FILE.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Book catalog CSV, relative to the data directory.
    #[serde(default = "default_books_file")]
    pub books_file: String,

    /// Tagged-description corpus, relative to the data directory.
    #[serde(default = "default_corpus_file")]
    pub corpus_file: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub recommend: RecommendConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            books_file: default_books_file(),
            corpus_file: default_corpus_file(),
            embedding: EmbeddingConfig::default(),
            recommend: RecommendConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.books_file.trim().is_empty() {
            bail!("books_file must not be empty");
        }
        if self.corpus_file.trim().is_empty() {
            bail!("corpus_file must not be empty");
        }
        if self.recommend.final_top_k == 0 {
            bail!("recommend.final_top_k must be at least 1");
        }
        if self.recommend.initial_top_k < self.recommend.final_top_k {
            bail!(
                "recommend.initial_top_k ({}) must not be smaller than final_top_k ({})",
                self.recommend.initial_top_k,
                self.recommend.final_top_k
            );
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        Ok(())
    }

    /// Load `config.yaml` from the data directory, creating it with
    /// defaults on first run. Re-saves when the on-disk shape is missing
    /// fields the current version carries.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("creating data dir {base_path:?}"))?;
        let config_path = base_path.join("config.yaml");

        if !config_path.exists() {
            let defaults = serde_yml::to_string(&Self::default())?;
            write_atomic(&config_path, defaults.as_bytes())?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {config_path:?}"))?;
        let mut config: Self =
            serde_yml::from_str(&config_str).context("config.yaml is malformed")?;
        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case the config shape needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(self)?;
        write_atomic(&self.base_path.join("config.yaml"), config_str.as_bytes())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn books_path(&self) -> PathBuf {
        self.base_path.join(&self.books_file)
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.base_path.join(&self.corpus_file)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, data)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(tmp.path()).unwrap();

        assert!(tmp.path().join("config.yaml").exists());
        assert_eq!(config.books_file, DEFAULT_BOOKS_FILE);
        assert_eq!(config.recommend.initial_top_k, 50);
        assert_eq!(config.recommend.final_top_k, 16);
        assert_eq!(config.embedding.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_reload_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let _ = Config::load_with(tmp.path()).unwrap();
        let reloaded = Config::load_with(tmp.path()).unwrap();
        assert_eq!(reloaded.books_file, DEFAULT_BOOKS_FILE);
    }

    #[test]
    fn test_partial_config_gets_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.yaml"), "books_file: mine.csv\n").unwrap();

        let config = Config::load_with(tmp.path()).unwrap();
        assert_eq!(config.books_file, "mine.csv");
        assert_eq!(config.corpus_file, DEFAULT_CORPUS_FILE);
        assert_eq!(config.recommend.final_top_k, 16);
    }

    #[test]
    fn test_invalid_top_k_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.yaml"),
            "recommend:\n  initial_top_k: 5\n  final_top_k: 16\n",
        )
        .unwrap();

        assert!(Config::load_with(tmp.path()).is_err());
    }

    #[test]
    fn test_zero_final_top_k_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.yaml"),
            "recommend:\n  initial_top_k: 50\n  final_top_k: 0\n",
        )
        .unwrap();

        assert!(Config::load_with(tmp.path()).is_err());
    }

    #[test]
    fn test_paths_join_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(tmp.path()).unwrap();

        assert_eq!(config.books_path(), tmp.path().join(DEFAULT_BOOKS_FILE));
        assert_eq!(config.corpus_path(), tmp.path().join(DEFAULT_CORPUS_FILE));
    }
}
