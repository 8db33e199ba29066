//! AdventBench configuration types and loading

use eyre::{Context, Result, bail, eyre};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main AdventBench configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level for the file log (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Model providers by name; the name is the model id prefix
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Run parameters
    pub eval: EvalConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .adventbench.yml
        let local_config = PathBuf::from(".adventbench.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/adventbench/adventbench.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("adventbench").join("adventbench.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Provider by name; configured entries shadow the built-in ones
    pub fn provider(&self, name: &str) -> Option<ProviderConfig> {
        self.providers
            .get(name)
            .cloned()
            .or_else(|| default_providers().remove(name))
    }

    /// Names of every known provider
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = default_providers().into_keys().collect();
        names.extend(self.providers.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    /// Resolve a `<provider>/<model>` id into everything needed to build a client
    pub fn resolve(&self, model_id: &str) -> Result<ResolvedModel> {
        let (provider_name, model) = split_model_id(model_id)?;
        let provider = self.provider(provider_name).ok_or_else(|| {
            eyre!(
                "Unknown provider '{}' in model id '{}'. Known providers: {}",
                provider_name,
                model_id,
                self.provider_names().join(", ")
            )
        })?;
        let api_key = std::env::var(&provider.api_key_env).map_err(|_| {
            eyre!(
                "API key for provider '{}' not found. Set the {} environment variable.",
                provider_name,
                provider.api_key_env
            )
        })?;

        Ok(ResolvedModel {
            id: model_id.to_string(),
            provider_name: provider_name.to_string(),
            model: model.to_string(),
            kind: provider.kind,
            base_url: provider.base_url,
            api_key,
        })
    }

    /// Check everything a run needs before any run starts
    pub fn validate_run(&self, models: &[ModelEntry]) -> Result<Vec<ResolvedModel>> {
        if self.eval.token_limit == 0 {
            bail!("token-limit must be greater than 0");
        }
        if self.eval.max_attempts == 0 {
            bail!("max-attempts must be at least 1");
        }
        if models.is_empty() {
            bail!("No models to run. Pass --model or list models in the models file.");
        }
        models.iter().map(|m| self.resolve(&m.name)).collect()
    }
}

/// Which wire protocol a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Anthropic,
}

/// One model provider endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    BTreeMap::from([
        (
            "openrouter".to_string(),
            ProviderConfig {
                kind: ProviderKind::Openai,
                base_url: "https://openrouter.ai/api".to_string(),
                api_key_env: "OPENROUTER_API_KEY".to_string(),
            },
        ),
        (
            "openai".to_string(),
            ProviderConfig {
                kind: ProviderKind::Openai,
                base_url: "https://api.openai.com".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
            },
        ),
        (
            "anthropic".to_string(),
            ProviderConfig {
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com".to_string(),
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
            },
        ),
    ])
}

/// A model id resolved against its provider
#[derive(Clone)]
pub struct ResolvedModel {
    /// Full `<provider>/<model>` id as recorded in run records
    pub id: String,
    pub provider_name: String,
    /// Id sent to the provider
    pub model: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Split `<provider>/<model>`; the model part may itself contain slashes
pub fn split_model_id(model_id: &str) -> Result<(&str, &str)> {
    match model_id.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok((provider, model)),
        _ => bail!(
            "Invalid model id '{}'. Expected <provider>/<model>, e.g. openrouter/google/gemini-2.5-flash",
            model_id
        ),
    }
}

/// Run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Cumulative token budget per run
    #[serde(rename = "token-limit")]
    pub token_limit: u64,

    /// Attempts per model call, first one included
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Initial retry backoff in milliseconds
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,

    /// Per-call timeout in milliseconds
    #[serde(rename = "call-timeout-ms")]
    pub call_timeout_ms: u64,

    #[serde(rename = "shell-max-tokens")]
    pub shell_max_tokens: u32,

    #[serde(rename = "structured-max-tokens")]
    pub structured_max_tokens: u32,

    /// Runs executing at once under --all
    #[serde(rename = "max-concurrent-runs")]
    pub max_concurrent_runs: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            token_limit: 50_000,
            max_attempts: 3,
            backoff_ms: 1000,
            call_timeout_ms: 120_000,
            shell_max_tokens: 64,
            structured_max_tokens: 256,
            max_concurrent_runs: 1,
        }
    }
}

impl EvalConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for run records; `~/` is expanded
    #[serde(rename = "log-dir")]
    pub log_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: runledger::config::default_log_dir().to_string_lossy().into_owned(),
        }
    }
}

impl StorageConfig {
    pub fn expanded_log_dir(&self) -> PathBuf {
        expand_home(&self.log_dir)
    }
}

/// Resolve a leading `~/` against the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// One model to evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// `<provider>/<model>` id
    pub name: String,

    /// Display label; defaults to the last path segment of the id
    #[serde(default)]
    pub label: Option<String>,
}

impl ModelEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
        }
    }

    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.name.rsplit('/').next().unwrap_or(&self.name).to_string())
    }
}

/// Ordered list of models for `--all`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsFile {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl ModelsFile {
    /// Fallback chain: explicit path, ./models.yaml, ~/.config/adventbench/models.yaml
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path).context(format!("Failed to load models from {}", path.display()));
        }

        let candidates = [
            Some(PathBuf::from("models.yaml")),
            dirs::config_dir().map(|d| d.join("adventbench").join("models.yaml")),
        ];
        for candidate in candidates.iter().flatten() {
            if candidate.exists() {
                return Self::load_from_file(candidate)
                    .context(format!("Failed to load models from {}", candidate.display()));
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read models file")?;
        let models: Self = serde_yaml::from_str(&content).context("Failed to parse models file")?;
        Ok(models)
    }

    /// Entry for a model id, or a bare entry when it is not listed
    pub fn entry_for(&self, model_id: &str) -> ModelEntry {
        self.models
            .iter()
            .find(|m| m.name == model_id)
            .cloned()
            .unwrap_or_else(|| ModelEntry::new(model_id))
    }
}
