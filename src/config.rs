use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use sift_index::{GateConfig, IndexerConfig, RetrievalConfig};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root for per-project index directories and the tracker database.
    pub data_dir: PathBuf,
    pub index: IndexerConfig,
    pub retrieval: RetrievalConfig,
    pub gate: GateConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            index: IndexerConfig::default(),
            retrieval: RetrievalConfig::default(),
            gate: GateConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if any subsystem config fails validation.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = std::env::var("SIFT_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SIFT_GATE_TIMEOUT_MS") {
            self.gate.timeout_ms = v
                .parse()
                .context("SIFT_GATE_TIMEOUT_MS must be an integer")?;
        }
        Ok(())
    }

    /// Validate every subsystem config.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.index.validate().context("index config")?;
        self.retrieval.validate().context("retrieval config")?;
        self.gate.validate().context("gate config")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let config = EngineConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.retrieval.rank_fusion_constant, 60);
        assert_eq!(config.gate.timeout_ms, 5000);
        config.validate().unwrap();
    }

    #[test]
    fn parse_valid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sift.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/tmp/sift-data"

[index.chunker]
max_chars_per_chunk = 800
chunk_overlap = 100

[retrieval]
hybrid_max_results = 5
rank_fusion_constant = 30

[gate]
timeout_ms = 2000
"#,
        )
        .unwrap();

        for key in ["SIFT_DATA_DIR", "SIFT_GATE_TIMEOUT_MS"] {
            unsafe { std::env::remove_var(key) };
        }

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sift-data"));
        assert_eq!(config.index.chunker.max_chars_per_chunk, 800);
        assert_eq!(config.retrieval.hybrid_max_results, 5);
        assert_eq!(config.retrieval.rank_fusion_constant, 30);
        assert_eq!(config.gate.timeout_ms, 2000);
        // unspecified sections keep defaults
        assert_eq!(config.retrieval.vector_max_results, 20);
    }

    #[test]
    fn invalid_config_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sift.toml");
        std::fs::write(
            &path,
            r"
[retrieval]
rank_fusion_constant = 0
",
        )
        .unwrap();

        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn env_overrides() {
        let mut config = EngineConfig::default();

        unsafe { std::env::set_var("SIFT_DATA_DIR", "/tmp/override") };
        config.apply_env_overrides().unwrap();
        unsafe { std::env::remove_var("SIFT_DATA_DIR") };

        assert_eq!(config.data_dir, PathBuf::from("/tmp/override"));
    }
}
