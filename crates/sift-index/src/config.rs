//! Per-subsystem configuration, validated at load time.

use serde::Deserialize;

use crate::error::{IndexError, Result};

/// Chunking configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk (default: 1000).
    pub max_chars_per_chunk: usize,
    /// Overlap between consecutive chunks in characters, capped at a quarter
    /// of the effective maximum (default: 200).
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars_per_chunk: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// # Errors
    ///
    /// Returns an error if the maximum chunk size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_chars_per_chunk == 0 {
            return Err(IndexError::Config(
                "max_chars_per_chunk must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// File discovery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files larger than this are skipped outright (default: 10 MiB).
    pub max_file_bytes: u64,
    /// Extensions eligible for indexing.
    pub supported_extensions: Vec<String>,
    /// Extensions never read as text.
    pub binary_extensions: Vec<String>,
    /// Exact file names always skipped.
    pub exclude_file_names: Vec<String>,
    /// Directory names skipped in any project.
    pub common_excludes: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let mut supported_extensions: Vec<String> = [
            "md", "markdown", "txt", "rst", "adoc", "org", "csv", "tsv", "json", "yaml", "yml",
            "toml", "xml", "html", "htm", "tex", "log", "ini", "cfg", "conf",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        #[cfg(feature = "pdf")]
        supported_extensions.push("pdf".to_string());

        Self {
            max_file_bytes: 10 * 1024 * 1024,
            supported_extensions,
            binary_extensions: [
                "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "mp3", "mp4", "wav",
                "avi", "mov", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "exe", "dll", "so",
                "dylib", "bin", "o", "a", "class", "jar", "pyc", "wasm", "db", "sqlite",
                "woff", "woff2", "ttf", "otf", "eot",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            exclude_file_names: [
                "package-lock.json",
                "yarn.lock",
                "pnpm-lock.yaml",
                "Cargo.lock",
                "poetry.lock",
                "composer.lock",
                "Gemfile.lock",
                ".DS_Store",
                "Thumbs.db",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            common_excludes: [
                ".git",
                ".svn",
                ".hg",
                ".idea",
                ".vscode",
                "node_modules",
                "target",
                "dist",
                "build",
                "out",
                "__pycache__",
                ".venv",
                "venv",
                ".tox",
                ".cache",
                "coverage",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

impl ScanConfig {
    /// # Errors
    ///
    /// Returns an error if the size limit is zero or no extension is
    /// supported.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_bytes == 0 {
            return Err(IndexError::Config("max_file_bytes must be positive".into()));
        }
        if self.supported_extensions.is_empty() {
            return Err(IndexError::Config(
                "supported_extensions must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Indexer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    pub scan: ScanConfig,
    /// Progress is published every N processed files, plus once at the end.
    pub progress_update_every: ProgressStride,
}

/// Newtype so serde defaults can give the stride a non-zero value.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(transparent)]
pub struct ProgressStride(pub usize);

impl Default for ProgressStride {
    fn default() -> Self {
        Self(10)
    }
}

impl IndexerConfig {
    /// # Errors
    ///
    /// Returns an error if any sub-config is invalid.
    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        self.scan.validate()?;
        if self.progress_update_every.0 == 0 {
            return Err(IndexError::Config(
                "progress_update_every must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum hits fetched from the vector store before fusion.
    pub vector_max_results: usize,
    /// Minimum cosine similarity accepted, applied before ranks are assigned.
    pub vector_min_score: f32,
    /// Maximum hits fetched from the keyword store before fusion.
    pub keyword_max_results: usize,
    /// Final result count after fusion.
    pub hybrid_max_results: usize,
    /// Rank fusion constant `k`; smaller sharpens the weight of early ranks.
    pub rank_fusion_constant: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_max_results: 20,
            vector_min_score: 0.25,
            keyword_max_results: 20,
            hybrid_max_results: 10,
            rank_fusion_constant: 60,
        }
    }
}

impl RetrievalConfig {
    /// # Errors
    ///
    /// Returns an error for zero limits, a zero fusion constant, or a score
    /// threshold outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        if self.vector_max_results == 0 || self.keyword_max_results == 0 {
            return Err(IndexError::Config(
                "retriever result limits must be positive".into(),
            ));
        }
        if self.hybrid_max_results == 0 {
            return Err(IndexError::Config(
                "hybrid_max_results must be positive".into(),
            ));
        }
        if self.rank_fusion_constant == 0 {
            return Err(IndexError::Config(
                "rank_fusion_constant must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vector_min_score) {
            return Err(IndexError::Config(
                "vector_min_score must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Intent gate configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Classification call deadline in milliseconds.
    pub timeout_ms: u64,
    /// Prior conversation turns included in the classifier context.
    pub history_turns: usize,
    /// Per-turn character cap applied before sending.
    pub max_turn_chars: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            history_turns: 3,
            max_turn_chars: 500,
        }
    }
}

impl GateConfig {
    /// # Errors
    ///
    /// Returns an error if the timeout or the turn cap is zero.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(IndexError::Config("timeout_ms must be positive".into()));
        }
        if self.max_turn_chars == 0 {
            return Err(IndexError::Config("max_turn_chars must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        IndexerConfig::default().validate().unwrap();
        RetrievalConfig::default().validate().unwrap();
        GateConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let config = ChunkerConfig {
            max_chars_per_chunk: 0,
            chunk_overlap: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_fusion_constant_rejected() {
        let config = RetrievalConfig {
            rank_fusion_constant: 0,
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_min_score_rejected() {
        let config = RetrievalConfig {
            vector_min_score: 1.5,
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_stride_is_positive() {
        assert!(IndexerConfig::default().progress_update_every.0 > 0);
    }

    #[test]
    fn common_excludes_cover_vcs_and_build_dirs() {
        let scan = ScanConfig::default();
        assert!(scan.common_excludes.iter().any(|d| d == ".git"));
        assert!(scan.common_excludes.iter().any(|d| d == "node_modules"));
        assert!(scan.common_excludes.iter().any(|d| d == "target"));
    }
}
