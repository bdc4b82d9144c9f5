//! Persona resolution.
//!
//! The base identity comes from `dna_identity`/`dna_synapse` in the config
//! file. A channel mutation is a partial override applied on top of the base
//! for one channel, so the same assistant can present differently per
//! surface. The merge is a pure shallow field overwrite.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The persona and behavioral rules governing responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub ci_name: String,
    pub business_name: String,
    pub role: String,
    pub base_personality: String,
    pub core_directive: String,
    pub model_name: String,
    pub temperature: f64,
}

/// The identity in effect for one request. Recomputed per request, never
/// persisted.
pub type EffectiveIdentity = IdentityConfig;

/// Partial identity override for a single channel.
///
/// Every field is optional; absent fields keep the base value. Unknown keys
/// in the config file are rejected at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelMutation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_directive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl ChannelMutation {
    fn apply(&self, target: &mut IdentityConfig) {
        if let Some(v) = &self.ci_name {
            target.ci_name = v.clone();
        }
        if let Some(v) = &self.business_name {
            target.business_name = v.clone();
        }
        if let Some(v) = &self.role {
            target.role = v.clone();
        }
        if let Some(v) = &self.base_personality {
            target.base_personality = v.clone();
        }
        if let Some(v) = &self.core_directive {
            target.core_directive = v.clone();
        }
        if let Some(v) = &self.model_name {
            target.model_name = v.clone();
        }
        if let Some(v) = self.temperature {
            target.temperature = v;
        }
    }
}

/// Compute the identity in effect for `channel_id`.
///
/// Unknown channel ids are valid and yield the base unchanged. The base is
/// never mutated, so concurrent requests across channels cannot leak
/// overrides into each other.
pub fn resolve(
    base: &IdentityConfig,
    mutations: &HashMap<String, ChannelMutation>,
    channel_id: &str,
) -> EffectiveIdentity {
    let mut effective = base.clone();
    if let Some(mutation) = mutations.get(channel_id) {
        mutation.apply(&mut effective);
    }
    effective
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> IdentityConfig {
        IdentityConfig {
            ci_name: "Paradigm".to_string(),
            business_name: "Paradigm Labs".to_string(),
            role: "Support Bot".to_string(),
            base_personality: "concise and professional".to_string(),
            core_directive: "Assist users accurately.".to_string(),
            model_name: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.1,
        }
    }

    #[test]
    fn mutation_overrides_only_named_fields() {
        let mut mutations = HashMap::new();
        mutations.insert(
            "B".to_string(),
            ChannelMutation {
                role: Some("Sales Bot".to_string()),
                ..Default::default()
            },
        );

        let resolved = resolve(&base(), &mutations, "B");
        assert_eq!(resolved.role, "Sales Bot");
        assert_eq!(resolved.ci_name, "Paradigm");
        assert_eq!(resolved.temperature, 0.1);
    }

    #[test]
    fn unknown_channel_returns_base_unchanged() {
        let mut mutations = HashMap::new();
        mutations.insert(
            "B".to_string(),
            ChannelMutation {
                role: Some("Sales Bot".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(resolve(&base(), &mutations, "C"), base());
    }

    #[test]
    fn resolution_is_isolated_across_channels() {
        let original = base();
        let mut mutations = HashMap::new();

        let before = resolve(&original, &mutations, "A");
        mutations.insert(
            "B".to_string(),
            ChannelMutation {
                ci_name: Some("Vector".to_string()),
                ..Default::default()
            },
        );
        let after = resolve(&original, &mutations, "A");

        assert_eq!(before, after);
        assert_eq!(original, base());
    }

    #[test]
    fn mutation_rejects_unknown_keys() {
        let err = serde_json::from_str::<ChannelMutation>(r#"{"persona": "x"}"#);
        assert!(err.is_err());
    }
}
