//! Process paths and the DNA configuration file.
//!
//! `client_config.json` carries the persona (`dna_identity`), the generation
//! settings (`dna_synapse`), the document source (`dna_memory`) and the
//! per-channel overrides (`channel_mutations`). An absent or unparseable file
//! degrades to a built-in default identity with the degradation made explicit
//! through [`ConfigSource`]; a file that parses but fails validation is a
//! hard load error.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::identity::{ChannelMutation, IdentityConfig};

pub const CONFIG_FILE_NAME: &str = "client_config.json";
pub const INDEX_DIR_NAME: &str = "memory_index";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub index_dir: PathBuf,
    pub history_db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let data_dir = discover_data_dir(&project_root);
        let log_dir = data_dir.join("logs");
        let index_dir = data_dir.join(INDEX_DIR_NAME);
        let history_db_path = data_dir.join("conversations.db");
        let config_path = env::var("PARADIGM_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| project_root.join(CONFIG_FILE_NAME));

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            data_dir,
            log_dir,
            index_dir,
            history_db_path,
            config_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("PARADIGM_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join(CONFIG_FILE_NAME).exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("PARADIGM_DATA_DIR") {
        return PathBuf::from(dir);
    }
    project_root.to_path_buf()
}

/// Where the running configuration came from. Degradation is a value the
/// caller can observe and log, not a swallowed exception.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Loaded(PathBuf),
    DefaultFallback { reason: String },
}

impl ConfigSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ConfigSource::DefaultFallback { .. })
    }
}

/// Document source settings (`dna_memory`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    pub source_directory: PathBuf,
    #[serde(default)]
    pub active_documents: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("documents"),
            active_documents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DnaIdentitySection {
    ci_name: String,
    business_name: String,
    #[serde(default = "default_role")]
    role: String,
    base_personality: String,
    core_directive: String,
}

fn default_role() -> String {
    "Assistant".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DnaSynapseSection {
    model: String,
    creativity_index: f64,
}

/// On-disk shape of `client_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DnaFile {
    dna_identity: DnaIdentitySection,
    dna_synapse: DnaSynapseSection,
    #[serde(default)]
    dna_memory: MemoryConfig,
    #[serde(default)]
    channel_mutations: HashMap<String, ChannelMutation>,
}

/// The validated runtime configuration.
#[derive(Debug, Clone)]
pub struct CiConfig {
    pub identity: IdentityConfig,
    pub memory: MemoryConfig,
    pub mutations: HashMap<String, ChannelMutation>,
    pub source: ConfigSource,
}

impl CiConfig {
    /// Load and validate the config file at `path`.
    ///
    /// Missing or JSON-unparseable files fall back to [`default_identity`];
    /// files that parse but violate the schema or the identity invariants
    /// are errors.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                return Ok(Self::fallback(format!(
                    "config file {} unreadable: {}",
                    path.display(),
                    err
                )));
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                return Ok(Self::fallback(format!(
                    "config file {} is not valid JSON: {}",
                    path.display(),
                    err
                )));
            }
        };

        let file: DnaFile = serde_json::from_value(value)
            .map_err(|e| ApiError::BadRequest(format!("invalid config: {}", e)))?;

        let config = Self {
            identity: IdentityConfig {
                ci_name: file.dna_identity.ci_name,
                business_name: file.dna_identity.business_name,
                role: file.dna_identity.role,
                base_personality: file.dna_identity.base_personality,
                core_directive: file.dna_identity.core_directive,
                model_name: file.dna_synapse.model,
                temperature: file.dna_synapse.creativity_index,
            },
            memory: file.dna_memory,
            mutations: file.channel_mutations,
            source: ConfigSource::Loaded(path.to_path_buf()),
        };
        config.validate()?;
        Ok(config)
    }

    fn fallback(reason: String) -> Self {
        Self {
            identity: default_identity(),
            memory: MemoryConfig::default(),
            mutations: HashMap::new(),
            source: ConfigSource::DefaultFallback { reason },
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        if self.identity.ci_name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "dna_identity.ci_name must not be empty".to_string(),
            ));
        }
        if self.identity.core_directive.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "dna_identity.core_directive must not be empty".to_string(),
            ));
        }
        validate_temperature(self.identity.temperature, "dna_synapse.creativity_index")?;
        for (channel, mutation) in &self.mutations {
            if let Some(t) = mutation.temperature {
                validate_temperature(t, &format!("channel_mutations.{}.temperature", channel))?;
            }
            for (field, value) in [
                ("ci_name", &mutation.ci_name),
                ("core_directive", &mutation.core_directive),
            ] {
                if value.as_ref().is_some_and(|v| v.trim().is_empty()) {
                    return Err(ApiError::BadRequest(format!(
                        "channel_mutations.{}.{} must not be empty",
                        channel, field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Persist the configuration back to `path`, used by ingestion to record
    /// the discovered document list. Fully rewrites the file.
    pub fn write(&self, path: &Path) -> Result<(), ApiError> {
        let file = DnaFile {
            dna_identity: DnaIdentitySection {
                ci_name: self.identity.ci_name.clone(),
                business_name: self.identity.business_name.clone(),
                role: self.identity.role.clone(),
                base_personality: self.identity.base_personality.clone(),
                core_directive: self.identity.core_directive.clone(),
            },
            dna_synapse: DnaSynapseSection {
                model: self.identity.model_name.clone(),
                creativity_index: self.identity.temperature,
            },
            dna_memory: self.memory.clone(),
            channel_mutations: self.mutations.clone(),
        };

        let json = serde_json::to_string_pretty(&file).map_err(ApiError::internal)?;
        fs::write(path, json).map_err(ApiError::internal)?;
        Ok(())
    }
}

fn validate_temperature(value: f64, field: &str) -> Result<(), ApiError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )));
    }
    Ok(())
}

/// Minimal identity used when no config file is available.
pub fn default_identity() -> IdentityConfig {
    IdentityConfig {
        ci_name: "Paradigm".to_string(),
        business_name: "Paradigm".to_string(),
        role: "Assistant".to_string(),
        base_personality: "concise, professional, and direct".to_string(),
        core_directive: "Assist users accurately using the provided context.".to_string(),
        model_name: "llama-3.3-70b-versatile".to_string(),
        temperature: 0.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, body).unwrap();
        path
    }

    const VALID: &str = r#"{
        "dna_identity": {
            "ci_name": "Paradigm",
            "business_name": "Acme",
            "role": "Support Bot",
            "base_personality": "warm",
            "core_directive": "Help customers."
        },
        "dna_synapse": { "model": "llama-3.3-70b-versatile", "creativity_index": 0.2 },
        "dna_memory": { "source_directory": "docs", "active_documents": ["a.txt"] },
        "channel_mutations": { "B": { "role": "Sales Bot" } }
    }"#;

    #[test]
    fn loads_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), VALID);

        let config = CiConfig::load(&path).unwrap();
        assert_eq!(config.identity.ci_name, "Paradigm");
        assert_eq!(config.identity.model_name, "llama-3.3-70b-versatile");
        assert_eq!(config.identity.temperature, 0.2);
        assert_eq!(config.memory.active_documents, vec!["a.txt"]);
        assert_eq!(
            config.mutations.get("B").unwrap().role.as_deref(),
            Some("Sales Bot")
        );
        assert_eq!(config.source, ConfigSource::Loaded(path));
    }

    #[test]
    fn missing_file_falls_back_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let config = CiConfig::load(&dir.path().join("nope.json")).unwrap();

        assert!(config.source.is_fallback());
        assert_eq!(config.identity.ci_name, "Paradigm");
        assert!(config.mutations.is_empty());
    }

    #[test]
    fn unparseable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "{ not json");

        let config = CiConfig::load(&path).unwrap();
        assert!(config.source.is_fallback());
    }

    #[test]
    fn out_of_range_temperature_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = VALID.replace("0.2", "1.7");
        let path = write_config(dir.path(), &body);

        assert!(CiConfig::load(&path).is_err());
    }

    #[test]
    fn unknown_top_level_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = VALID.replacen("\"dna_identity\"", "\"dna_extra\": {}, \"dna_identity\"", 1);
        let path = write_config(dir.path(), &body);

        assert!(CiConfig::load(&path).is_err());
    }

    #[test]
    fn empty_directive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = VALID.replace("Help customers.", "  ");
        let path = write_config(dir.path(), &body);

        assert!(CiConfig::load(&path).is_err());
    }

    #[test]
    fn write_then_load_round_trips_active_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), VALID);

        let mut config = CiConfig::load(&path).unwrap();
        config.memory.active_documents = vec!["b.txt".to_string(), "c.txt".to_string()];
        config.write(&path).unwrap();

        let reloaded = CiConfig::load(&path).unwrap();
        assert_eq!(reloaded.memory.active_documents, vec!["b.txt", "c.txt"]);
        assert_eq!(reloaded.identity, config.identity);
    }
}
