use anyhow::{Context, Result};
use repo_index_core::ChunkerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    /// Repositories live at `<source_root>/<repo_id>`.
    pub source_root: PathBuf,
    pub repositories: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Force every discovered file to be reindexed.
    #[serde(default)]
    pub reindex: bool,
    /// Files larger than this are not discovered. 0 disables the cap.
    #[serde(default)]
    pub max_file_bytes: u64,
    #[serde(default = "default_hash_concurrency")]
    pub hash_concurrency: usize,
}

fn default_hash_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_chunk: usize,
    #[serde(default = "default_overlap")]
    pub overlap_lines: usize,
    #[serde(default = "default_summary_chars")]
    pub file_summary_max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens(),
            overlap_lines: default_overlap(),
            file_summary_max_chars: default_summary_chars(),
        }
    }
}

fn default_max_tokens() -> usize {
    6500
}
fn default_overlap() -> usize {
    6
}
fn default_summary_chars() -> usize {
    32767
}

impl ChunkingConfig {
    pub fn to_chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_tokens_per_chunk: self.max_tokens_per_chunk,
            overlap_lines: self.overlap_lines,
            file_summary_max_chars: self.file_summary_max_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Chunk output directory, relative to each repository root unless absolute.
    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            chunks_dir: default_chunks_dir(),
        }
    }
}

fn default_chunks_dir() -> PathBuf {
    PathBuf::from(".nuvos/chunks")
}

impl Config {
    pub fn repo_root(&self, repo_id: &str) -> PathBuf {
        self.ingestion.source_root.join(repo_id)
    }

    /// Repositories to process: `only` if given, otherwise all configured ones.
    pub fn selected_repositories(&self, only: Option<&str>) -> Result<Vec<String>> {
        match only {
            None => Ok(self.ingestion.repositories.clone()),
            Some(id) => {
                if !self.ingestion.repositories.iter().any(|r| r == id) {
                    anyhow::bail!(
                        "Unknown repository: '{}'. Configured: {}",
                        id,
                        self.ingestion.repositories.join(", ")
                    );
                }
                Ok(vec![id.to_string()])
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.ingestion.repositories.is_empty() {
        anyhow::bail!("ingestion.repositories must list at least one repository");
    }
    if config
        .ingestion
        .repositories
        .iter()
        .any(|r| r.trim().is_empty())
    {
        anyhow::bail!("ingestion.repositories must not contain empty ids");
    }
    if config.ingestion.hash_concurrency == 0 {
        anyhow::bail!("ingestion.hash_concurrency must be >= 1");
    }

    if config.chunking.max_tokens_per_chunk == 0 {
        anyhow::bail!("chunking.max_tokens_per_chunk must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[ingestion]
source_root = "/src"
repositories = ["co.core"]
"#;

    #[test]
    fn defaults_apply() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.ingestion.hash_concurrency, 4);
        assert!(!config.ingestion.reindex);
        assert!(config.ingestion.include.is_empty());
        assert_eq!(config.chunking.max_tokens_per_chunk, 6500);
        assert_eq!(config.chunking.overlap_lines, 6);
        assert_eq!(config.output.chunks_dir, PathBuf::from(".nuvos/chunks"));
        assert_eq!(config.repo_root("co.core"), PathBuf::from("/src/co.core"));
    }

    #[test]
    fn reindex_must_be_a_boolean() {
        let text = MINIMAL.replace(
            "repositories = [\"co.core\"]",
            "repositories = [\"co.core\"]\nreindex = \"true\"",
        );
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse_config("[ingestion]\nsource_root = \"/s\"\nrepositories = []").is_err());
        let zero = format!("{}\n[chunking]\nmax_tokens_per_chunk = 0\n", MINIMAL);
        assert!(parse_config(&zero).is_err());
        let conc = MINIMAL.replace("[\"co.core\"]", "[\"co.core\"]\nhash_concurrency = 0");
        assert!(parse_config(&conc).is_err());
    }

    #[test]
    fn selected_repositories_filters() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.selected_repositories(None).unwrap(), vec!["co.core"]);
        assert_eq!(
            config.selected_repositories(Some("co.core")).unwrap(),
            vec!["co.core"]
        );
        assert!(config.selected_repositories(Some("other")).is_err());
    }
}
