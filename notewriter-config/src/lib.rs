//! Loader for bot configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: field defaults, YAML sources in the order they
//! were added, then `NOTEWRITER__`-prefixed environment variables
//! (`NOTEWRITER__RUN__CONCURRENCY=4`, `NOTEWRITER__LLM__API_KEY=...`).
//! `${VAR}` placeholders in any string are expanded after merging; unknown
//! variables are left as written and treated as unset by the accessors.
//!
//! ```yaml
//! run:     { num_posts: 20, concurrency: 1, dry_run: false, test_mode: true }
//! llm:     { provider: gemini, api_key: "${GEMINI_API_KEY}", model: gemini-2.5-flash-lite }
//! search:  { brave_api_key: "${BRAVE_API_KEY}", max_results: 8, cache_ttl_secs: 300 }
//! verify:  { max_urls: 10, fetch_timeout_secs: 10, max_page_bytes: 51200 }
//! x_api:   { bearer_token: "${X_BEARER_TOKEN}", base_url: "https://api.x.com" }
//! store:   { path: ~/.local/share/notewriter/processed.json }
//! logging: { format: text, stderr: true, dir: null }
//! ```
use config::{Config, ConfigError, Environment, File};
use notewriter_common::LlmConfig;
use notewriter_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "NOTEWRITER";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_X_API_BASE: &str = "https://api.x.com";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NoteWriterConfig {
    pub run: RunSettings,
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub verify: VerifySettings,
    pub x_api: XApiSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub num_posts: u32,
    pub concurrency: usize,
    pub dry_run: bool,
    /// Submit notes in the platform's test mode.
    pub test_mode: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            num_posts: 20,
            concurrency: 1,
            dry_run: false,
            test_mode: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub min_request_interval_ms: u64,
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            api_key: Some("${GEMINI_API_KEY}".into()),
            model: DEFAULT_MODEL.into(),
            base_url: None,
            min_request_interval_ms: 1000,
            max_retries: 3,
        }
    }
}

impl LlmSettings {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub brave_api_key: Option<String>,
    pub max_results: usize,
    pub cache_ttl_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            max_results: 8,
            cache_ttl_secs: 300,
        }
    }
}

impl SearchSettings {
    pub fn brave_api_key(&self) -> Option<&str> {
        resolved(self.brave_api_key.as_deref())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub max_urls: usize,
    pub fetch_timeout_secs: u64,
    pub max_page_bytes: usize,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            max_urls: 10,
            fetch_timeout_secs: 10,
            max_page_bytes: 50 * 1024,
        }
    }
}

impl VerifySettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XApiSettings {
    pub bearer_token: Option<String>,
    pub base_url: String,
}

impl Default for XApiSettings {
    fn default() -> Self {
        Self {
            bearer_token: Some("${X_BEARER_TOKEN}".into()),
            base_url: DEFAULT_X_API_BASE.into(),
        }
    }
}

impl XApiSettings {
    pub fn bearer_token(&self) -> Option<&str> {
        resolved(self.bearer_token.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON file of processed post ids; in-memory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub stderr: bool,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            stderr: true,
            dir: None,
        }
    }
}

impl NoteWriterConfig {
    /// Provider configuration for the LLM crate. Fails when the selected
    /// provider is missing its key.
    pub fn llm_config(&self) -> Result<LlmConfig, ConfigError> {
        match self.llm.provider {
            LlmProvider::Gemini => {
                let api_key = resolved(self.llm.api_key.as_deref()).ok_or_else(|| {
                    ConfigError::Message(
                        "llm.api_key is required for the gemini provider (set GEMINI_API_KEY)"
                            .into(),
                    )
                })?;
                Ok(LlmConfig::Gemini {
                    api_key: api_key.to_string(),
                    model: self.llm.model.clone(),
                    base_url: self.llm.base_url.clone(),
                })
            }
            LlmProvider::None => Ok(LlmConfig::None),
        }
    }

    /// Check cross-field requirements that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.concurrency == 0 {
            return Err(ConfigError::Message("run.concurrency must be at least 1".into()));
        }
        if self.run.num_posts == 0 {
            return Err(ConfigError::Message("run.num_posts must be at least 1".into()));
        }
        if self.x_api.bearer_token().is_none() {
            return Err(ConfigError::Message(
                "x_api.bearer_token is required (set X_BEARER_TOKEN)".into(),
            ));
        }
        self.llm_config().map(|_| ())
    }
}

/// A value that is present, non-blank, and not an unexpanded `${VAR}`.
fn resolved(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.contains("${"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Expand a single field. Defaults never pass through the merged tree, so
/// their placeholders are resolved here.
fn expand_field(field: &mut Option<String>) {
    if let Some(raw) = field.take() {
        let mut v = Value::String(raw);
        expand_env_in_value(&mut v);
        *field = v.as_str().map(str::to_string);
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct NoteWriterConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for NoteWriterConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteWriterConfigLoader {
    /// An empty loader: defaults plus the environment overlay.
    ///
    /// ```
    /// use notewriter_config::NoteWriterConfigLoader;
    ///
    /// let cfg = NoteWriterConfigLoader::new()
    ///     .with_yaml_str("run:\n  concurrency: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.run.concurrency, 3);
    /// assert_eq!(cfg.run.num_posts, 20);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a file that must exist; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing, for environment-only deployments.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge the sources, expand `${VAR}` placeholders, and deserialize.
    pub fn load(self) -> Result<NoteWriterConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);
        let mut typed: NoteWriterConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        expand_field(&mut typed.llm.api_key);
        expand_field(&mut typed.search.brave_api_key);
        expand_field(&mut typed.x_api.bearer_token);
        if let Some(path) = typed.store.path.take() {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            typed.store.path = Some(PathBuf::from(expanded));
        }

        Ok(typed)
    }
}
