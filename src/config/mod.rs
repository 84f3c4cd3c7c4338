//! Tracker configuration loaded from YAML
//!
//! ```yaml
//! custom_prompt: |
//!   Focus on architecture decisions.
//! participants:
//!   - name: Alice
//!     role: CEO
//!   - Bob
//! participants_explicit: true
//! agreement_rules:
//!   Tech:
//!     requires_all: [Alice, Bob]
//! backend:
//!   executable: claude
//! pipeline:
//!   max_workers: 4
//!   max_retries: 3
//! ```

pub mod framework;

use crate::manifest::{fingerprint_text, Fingerprint};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use framework::{merge_frameworks, Framework};

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "groundtruth.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A decision-maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ParticipantEntry")]
pub struct ParticipantConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Decision types or categories requiring this person's agreement
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_for: Vec<String>,
}

impl ParticipantConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: String::new(),
            required_for: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn required_for(mut self, keys: &[&str]) -> Self {
        self.required_for = keys.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// Participants may be written as a bare name or a full mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum ParticipantEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        role: String,
        #[serde(default)]
        required_for: Vec<String>,
    },
}

impl From<ParticipantEntry> for ParticipantConfig {
    fn from(entry: ParticipantEntry) -> Self {
        match entry {
            ParticipantEntry::Name(name) => ParticipantConfig::named(name.trim()),
            ParticipantEntry::Full {
                name,
                role,
                required_for,
            } => ParticipantConfig {
                name: name.trim().to_string(),
                role,
                required_for,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A decision type, the axis agreement rules and `required_for` are keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TypeEntry")]
pub struct TypeConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TypeEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        description: String,
    },
}

impl From<TypeEntry> for TypeConfig {
    fn from(entry: TypeEntry) -> Self {
        let (name, description) = match entry {
            TypeEntry::Name(name) => (name, String::new()),
            TypeEntry::Full { name, description } => (name, description),
        };
        TypeConfig {
            name: name.trim().to_string(),
            description,
        }
    }
}

/// Who must agree for a decision of a given type or category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_any: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Calling convention of the backend executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// `<exe> --print --output-format json <prompt>`
    #[default]
    ClaudeCode,
    /// Prompt on stdin, JSON on stdout
    Command,
}

/// How the CLI backend is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub provider: Provider,
    /// Executable name or path
    pub executable: String,
    /// Passed as `--model` when set
    pub model: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            provider: Provider::ClaudeCode,
            executable: "claude".to_string(),
            model: None,
        }
    }
}

/// Concurrency, retry and timeout knobs for a processing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_workers: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Responses shorter than this are treated as empty
    pub min_response_chars: usize,
    pub extraction_timeout_secs: u64,
    /// Participant detection is lighter and gives up sooner
    pub detection_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_retries: 3,
            base_delay_ms: 2000,
            min_response_chars: 10,
            extraction_timeout_secs: 300,
            detection_timeout_secs: 120,
        }
    }
}

impl PipelineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
            .with_min_response_chars(self.min_response_chars)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_secs(self.detection_timeout_secs)
    }
}

/// Full configuration for a tracker run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Extra extraction instructions
    pub custom_prompt: String,
    pub participants: Vec<ParticipantConfig>,
    /// Participants are pinned; never auto-detect
    pub participants_explicit: bool,
    pub categories: Vec<CategoryConfig>,
    pub types: Vec<TypeConfig>,
    /// Keyed by type or category. A config file without rules has none.
    #[serde(default)]
    pub agreement_rules: BTreeMap<String, AgreementRule>,
    pub backend: BackendSettings,
    pub pipeline: PipelineSettings,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            custom_prompt: String::new(),
            participants: default_participants(),
            participants_explicit: false,
            categories: default_categories(),
            types: default_types(),
            agreement_rules: default_agreement_rules(),
            backend: BackendSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

/// The subset of the config that changes what gets extracted.
#[derive(Serialize)]
struct ExtractionInputs<'a> {
    custom_prompt: &'a str,
    participants: &'a [ParticipantConfig],
    participants_explicit: bool,
    categories: &'a [CategoryConfig],
    types: &'a [TypeConfig],
    agreement_rules: &'a BTreeMap<String, AgreementRule>,
    model: &'a Option<String>,
}

impl TrackerConfig {
    /// Parse YAML text. Empty lists fall back to the defaults.
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: TrackerConfig = serde_yaml::from_str(text)?;
        if config.participants.is_empty() {
            config.participants = default_participants();
        }
        if config.categories.is_empty() {
            config.categories = default_categories();
        }
        if config.types.is_empty() {
            config.types = default_types();
        }
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from `explicit`, else the first config found by [`discover_config`].
    pub fn load_or_default(explicit: Option<&Path>) -> ConfigResult<Self> {
        match explicit.map(Path::to_path_buf).or_else(discover_config) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.pipeline.max_workers == 0 {
            return Err(ConfigError::Invalid("pipeline.max_workers must be at least 1".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.participants {
            if p.name.is_empty() {
                return Err(ConfigError::Invalid("participant with empty name".into()));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate participant '{}'", p.name)));
            }
        }
        Ok(())
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    pub fn type_names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    pub fn participant_names(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    /// Pin the participant list, as `--deciders` does.
    pub fn set_explicit_participants(&mut self, names: &[String]) {
        self.participants = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(ParticipantConfig::named)
            .collect();
        self.participants_explicit = true;
    }

    /// Fold a merged framework into this config.
    pub fn apply_framework(&mut self, framework: &Framework) {
        if !framework.participants.is_empty() {
            self.participants = framework.participants.clone();
            self.participants_explicit = true;
        }
        if !framework.custom_prompt.is_empty() {
            self.custom_prompt = if self.custom_prompt.is_empty() {
                framework.custom_prompt.clone()
            } else {
                format!("{}\n\n{}", self.custom_prompt, framework.custom_prompt)
            };
        }
        for (key, rule) in &framework.agreement_rules {
            self.agreement_rules.insert(key.clone(), rule.clone());
        }
    }

    /// Canonical text of everything that shapes extraction output.
    ///
    /// Concurrency and retry settings are left out: they change how fast a
    /// run goes, not what it produces.
    pub fn fingerprint_text(&self) -> String {
        let inputs = ExtractionInputs {
            custom_prompt: &self.custom_prompt,
            participants: &self.participants,
            participants_explicit: self.participants_explicit,
            categories: &self.categories,
            types: &self.types,
            agreement_rules: &self.agreement_rules,
            model: &self.backend.model,
        };
        serde_yaml::to_string(&inputs).unwrap_or_default()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_text(&self.fingerprint_text())
    }

    /// Commented template written by `groundtruth init`.
    pub fn template_yaml(&self) -> ConfigResult<String> {
        let body = serde_yaml::to_string(self)?;
        Ok(format!(
            "# Groundtruth configuration\n\
             #\n\
             # participants: decision-makers tracked in the Agreed columns\n\
             # participants_explicit: true pins them; false lets each transcript\n\
             #   detect its own participants\n\
             # custom_prompt: extra extraction instructions\n\
             # agreement_rules: who must agree on what\n\
             # pipeline: worker count, retries and timeouts\n\
             \n{}",
            body
        ))
    }
}

/// Config search order: `./groundtruth.yaml`, then the user config dir.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("groundtruth").join("config.yaml");
    user.exists().then_some(user)
}

pub fn default_participants() -> Vec<ParticipantConfig> {
    vec![
        ParticipantConfig::named("Ryan").with_role("CTO").required_for(&["Tech"]),
        ParticipantConfig::named("Ajit")
            .with_role("CEO")
            .required_for(&["Tech", "Strategy"]),
        ParticipantConfig::named("Milkana")
            .with_role("Product Manager")
            .required_for(&["GTM", "Marketing"]),
    ]
}

pub fn default_types() -> Vec<TypeConfig> {
    [
        ("Tech", "Technical implementation, architecture, tooling"),
        ("Legal", "Contracts, liability, terms of service, IP"),
        ("Compliance", "SOC 2, HIPAA, GDPR, regulatory requirements"),
        ("GTM", "Go-to-market, launch, distribution, partnerships"),
        ("Strategy", "Company direction, positioning, competitive"),
        ("Marketing", "Messaging, branding, content, campaigns"),
    ]
    .into_iter()
    .map(|(name, description)| TypeConfig {
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

pub fn default_agreement_rules() -> BTreeMap<String, AgreementRule> {
    BTreeMap::from([
        (
            "Tech".to_string(),
            AgreementRule {
                requires_all: names(&["Ryan", "Ajit"]),
                requires_any: Vec::new(),
                description: "Technical decisions require both CEO and CTO agreement".to_string(),
            },
        ),
        (
            "GTM".to_string(),
            AgreementRule {
                requires_all: names(&["Milkana"]),
                requires_any: names(&["Ajit", "Ryan"]),
                description: "GTM decisions require PM and either CEO or CTO".to_string(),
            },
        ),
    ])
}

pub fn default_categories() -> Vec<CategoryConfig> {
    [
        ("Go-to-Market", "Launch strategy, market positioning, pricing"),
        ("Product Tiers", "Offline/single-player/multiplayer/enterprise modes, feature gating"),
        ("Technical Architecture", "Caching, data flow, server vs client, API and system design"),
        ("Data & Privacy", "Telemetry, privacy levels, what data is collected or shared, retention"),
        ("Security", "Authentication, authorization, access control, secrets"),
        ("Terminology", "Naming conventions, taxonomy definitions, vocabulary alignment"),
        ("Process", "Development workflow, deployment, team coordination, meetings"),
    ]
    .into_iter()
    .map(|(name, description)| CategoryConfig {
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}
