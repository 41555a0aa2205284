//! TOML configuration.
//!
//! Every section except `[db]` has defaults, so a minimal config is just a
//! database path. [`load_config`] parses the file and validates it; the
//! `*_params` helpers convert sections into the core crate's parameter types.

use anyhow::{bail, Context, Result};
use plu_extract_core::chunk::ChunkingParams;
use plu_extract_core::embedding::Metric;
use plu_extract_core::facts::MalformedPolicy;
use plu_extract_core::prompt::PromptTemplate;
use plu_extract_core::retrieve::RetrievalParams;
use plu_extract_core::SessionOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::repository::InsertMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub questions: QuestionsConfig,
    #[serde(default)]
    pub facts: FactsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
        }
    }
}

fn default_chunk_size() -> usize {
    4096
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default)]
    pub metric: Metric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: default_score_threshold(),
            metric: Metric::default(),
        }
    }
}

fn default_k() -> usize {
    1
}
fn default_score_threshold() -> f32 {
    0.6
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            timeout_secs: default_generation_timeout(),
            seed: None,
        }
    }
}

fn default_generation_provider() -> String {
    "ollama".to_string()
}
fn default_generation_model() -> String {
    "llama2".to_string()
}
fn default_generation_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptConfig {
    /// Replaces the built-in instruction template.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuestionsConfig {
    #[serde(default = "default_hauteur_question")]
    pub hauteur: String,
    #[serde(default = "default_emprise_question")]
    pub emprise: String,
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self {
            hauteur: default_hauteur_question(),
            emprise: default_emprise_question(),
        }
    }
}

fn default_hauteur_question() -> String {
    "Quelle est la hauteur maximum des constructions dans la zone {zone} ?".to_string()
}
fn default_emprise_question() -> String {
    "Quelle est l'emprise au sol maximale des constructions dans la zone {zone} ?".to_string()
}

impl QuestionsConfig {
    pub fn hauteur_for(&self, zone: &str) -> String {
        self.hauteur.replace("{zone}", zone)
    }

    pub fn emprise_for(&self, zone: &str) -> String {
        self.emprise.replace("{zone}", zone)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FactsConfig {
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
    #[serde(default)]
    pub insert_mode: InsertMode,
}

impl Config {
    /// Config with every section at its default and the database at `db_path`.
    pub fn with_db(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            prompt: PromptConfig::default(),
            questions: QuestionsConfig::default(),
            facts: FactsConfig::default(),
        }
    }

    pub fn chunking_params(&self) -> ChunkingParams {
        ChunkingParams {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
        }
    }

    pub fn retrieval_params(&self) -> RetrievalParams {
        RetrievalParams {
            k: self.retrieval.k,
            score_threshold: self.retrieval.score_threshold,
            metric: self.retrieval.metric,
        }
    }

    pub fn prompt_template(&self) -> Result<PromptTemplate> {
        match &self.prompt.template {
            Some(t) => Ok(PromptTemplate::new(t.as_str())?),
            None => Ok(PromptTemplate::default()),
        }
    }

    pub fn session_options(&self) -> Result<SessionOptions> {
        Ok(SessionOptions {
            chunking: self.chunking_params(),
            retrieval: self.retrieval_params(),
            embed_batch_size: self.embedding.batch_size,
            template: self.prompt_template()?,
            seed: self.generation.seed,
        })
    }

    /// Check every section. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        self.chunking_params()
            .validate()
            .context("invalid [chunking] section")?;
        self.retrieval_params()
            .validate()
            .context("invalid [retrieval] section")?;
        self.prompt_template().context("invalid [prompt] section")?;

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if self.embedding.timeout_secs == 0 {
            bail!("embedding.timeout_secs must be > 0");
        }
        match self.embedding.provider.as_str() {
            "local" => {}
            "ollama" | "openai" => {
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            "hashing" => {
                if self.embedding.dims == Some(0) {
                    bail!("embedding.dims must be > 0 when provider is 'hashing'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, ollama, openai, or hashing.",
                other
            ),
        }

        match self.generation.provider.as_str() {
            "ollama" | "openai" | "disabled" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be ollama, openai, or disabled.",
                other
            ),
        }
        if self.generation.model.trim().is_empty() {
            bail!("generation.model must not be empty");
        }
        if self.generation.timeout_secs == 0 {
            bail!("generation.timeout_secs must be > 0");
        }

        for (name, question) in [
            ("hauteur", &self.questions.hauteur),
            ("emprise", &self.questions.emprise),
        ] {
            if !question.contains("{zone}") {
                bail!("questions.{} must contain the {{zone}} placeholder", name);
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[db]\npath = \"./data/plu.sqlite\"\n").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 4096);
        assert_eq!(cfg.chunking.chunk_overlap, 0);
        assert_eq!(cfg.retrieval.k, 1);
        assert_eq!(cfg.retrieval.score_threshold, 0.6);
        assert_eq!(cfg.retrieval.metric, Metric::Cosine);
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.generation.provider, "ollama");
        assert_eq!(cfg.generation.model, "llama2");
        assert_eq!(cfg.facts.on_malformed, MalformedPolicy::Reject);
        assert_eq!(cfg.facts.insert_mode, InsertMode::Insert);
        assert_eq!(
            cfg.questions.hauteur_for("U1"),
            "Quelle est la hauteur maximum des constructions dans la zone U1 ?"
        );
    }

    #[test]
    fn test_full_config() {
        let cfg = parse(
            r#"
[db]
path = "plu.sqlite"

[chunking]
chunk_size = 1000
chunk_overlap = 100

[retrieval]
k = 3
score_threshold = 0.5
metric = "euclidean"

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
url = "http://gpu:11434"

[generation]
provider = "openai"
model = "gpt-4o-mini"
seed = 42

[facts]
on_malformed = "unknown"
insert_mode = "upsert"
"#,
        )
        .unwrap();
        assert_eq!(cfg.retrieval.metric, Metric::Euclidean);
        assert_eq!(cfg.session_options().unwrap().seed, Some(42));
        assert_eq!(cfg.facts.on_malformed, MalformedPolicy::Unknown);
        assert_eq!(cfg.facts.insert_mode, InsertMode::Upsert);
    }

    #[test]
    fn test_rejects_invalid_sections() {
        let base = "[db]\npath = \"x.sqlite\"\n";
        for extra in [
            "[chunking]\nchunk_size = 0\n",
            "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
            "[retrieval]\nk = 0\n",
            "[retrieval]\nscore_threshold = 1.5\n",
            "[embedding]\nprovider = \"bert\"\n",
            "[embedding]\nprovider = \"openai\"\n",
            "[embedding]\nprovider = \"ollama\"\nmodel = \"m\"\ndims = 0\n",
            "[generation]\nprovider = \"gpt\"\n",
            "[prompt]\ntemplate = \"no placeholders\"\n",
            "[questions]\nhauteur = \"Hauteur ?\"\n",
        ] {
            let toml_str = format!("{}{}", base, extra);
            assert!(parse(&toml_str).is_err(), "accepted:\n{}", toml_str);
        }
    }

    #[test]
    fn test_rejects_unknown_policy_value() {
        assert!(parse("[db]\npath = \"x\"\n[facts]\non_malformed = \"ignore\"\n").is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/plu.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
