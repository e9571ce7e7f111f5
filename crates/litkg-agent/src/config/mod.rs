//! Configuration loading for litkg.
//! Reads litkg.toml from the current directory or path in LITKG_CONFIG env var.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use litkg_ingestion::{PipelineConfig, DEFAULT_BENCHMARK_SIZE};
use litkg_ner::{AnnotationProperties, CoreNlpConfig, GatewayConfig, LaunchConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub annotator: AnnotatorConfig,
    #[serde(default)]
    pub linker: LinkerConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: String::new(), max_connections: default_max_connections() }
    }
}

fn default_max_connections() -> u32 { 4 }

// ── Annotation server ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold_percent: f32,
    #[serde(default = "default_restart_cooldown")]
    pub restart_cooldown_secs: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_annotators")]
    pub annotators: String,
    /// Launch a local server when none is answering on `endpoint`.
    pub launch: Option<LaunchSection>,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            memory_threshold_percent: default_memory_threshold(),
            restart_cooldown_secs: default_restart_cooldown(),
            threads: default_threads(),
            annotators: default_annotators(),
            launch: None,
        }
    }
}

fn default_endpoint()           -> String { "http://localhost:9000".to_string() }
fn default_timeout_ms()         -> u64    { 60_000 }
fn default_startup_timeout_ms() -> u64    { 120_000 }
fn default_memory_threshold()   -> f32    { 90.0 }
fn default_restart_cooldown()   -> u64    { 30 }
fn default_annotators()         -> String { "tokenize,ssplit,pos,lemma,depparse,openie".to_string() }

fn default_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSection {
    #[serde(default = "default_command")]
    pub command: String,
    pub classpath: String,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_server_class")]
    pub server_class: String,
}

fn default_command()      -> String { "java".to_string() }
fn default_memory()       -> String { "8G".to_string() }
fn default_server_class() -> String { "edu.stanford.nlp.pipeline.StanfordCoreNLPServer".to_string() }

impl AnnotatorConfig {
    pub fn service_config(&self) -> CoreNlpConfig {
        CoreNlpConfig {
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
            threads: self.threads,
            properties: AnnotationProperties::openie(&self.annotators, self.threads),
            launch: self.launch.as_ref().map(|l| LaunchConfig {
                command: l.command.clone(),
                classpath: l.classpath.clone(),
                memory: l.memory.clone(),
                server_class: l.server_class.clone(),
            }),
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            memory_threshold_percent: self.memory_threshold_percent,
            restart_cooldown: Duration::from_secs(self.restart_cooldown_secs),
        }
    }
}

// ── Entity linking ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkerConfig {
    /// One endpoint per model. Later endpoints win on overlapping entities.
    #[serde(default = "default_linker_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_linker_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self { endpoints: default_linker_endpoints(), timeout_ms: default_linker_timeout_ms() }
    }
}

fn default_linker_endpoints()  -> Vec<String> { vec!["http://localhost:8080/link".to_string()] }
fn default_linker_timeout_ms() -> u64         { 30_000 }

// ── Extraction ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_shard_directory")]
    pub shard_directory: PathBuf,
    /// When false, rows are built but never written.
    #[serde(default = "bool_true")]
    pub db_insert: bool,
    #[serde(default = "bool_true")]
    pub threaded_inserts: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            shard_directory: default_shard_directory(),
            db_insert: true,
            threaded_inserts: true,
        }
    }
}

fn default_batch_size()      -> usize   { 1000 }
fn default_shard_directory() -> PathBuf { PathBuf::from("shards") }
fn bool_true()               -> bool    { true }

// ── Partitioning ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default = "default_benchmark_size")]
    pub benchmark_size: usize,
    #[serde(default = "default_max_per_shard")]
    pub max_per_shard: usize,
    #[serde(default = "default_available_nodes")]
    pub available_nodes: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            benchmark_size: default_benchmark_size(),
            max_per_shard: default_max_per_shard(),
            available_nodes: default_available_nodes(),
        }
    }
}

fn default_benchmark_size()  -> usize { DEFAULT_BENCHMARK_SIZE }
fn default_max_per_shard()   -> usize { 5000 }
fn default_available_nodes() -> usize { 1 }


fn config_path() -> PathBuf {
    PathBuf::from(std::env::var("LITKG_CONFIG").unwrap_or_else(|_| "litkg.toml".to_string()))
}

impl Config {
    /// Load configuration from litkg.toml.
    /// Checks LITKG_CONFIG env var first, then current directory.
    /// LITKG_DATABASE_URL, when set, replaces `database.url`.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy litkg.example.toml to litkg.toml and edit it.",
                path.display()
            );
        }

        Ok(Self::read(&path)?.with_database_url(std::env::var("LITKG_DATABASE_URL").ok()))
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config = Self::read_or_default(&config_path())?;
        Ok(config.with_database_url(std::env::var("LITKG_DATABASE_URL").ok()))
    }

    pub fn read_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::read(path)
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.database.url = url;
        }
        self
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        if self.database.url.is_empty() {
            anyhow::bail!("No database URL: set database.url or LITKG_DATABASE_URL");
        }
        Ok(&self.database.url)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.extraction.batch_size,
            threads: self.annotator.threads,
            threaded_inserts: self.extraction.threaded_inserts,
        }
    }
}
