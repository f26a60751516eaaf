use crate::error::EngineError;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix for environment overrides, e.g. `NEWSVEC_SIMILARITY_CUTOFF=0`.
pub const ENV_PREFIX: &str = "NEWSVEC_";

/// Tunables of the vocabulary builder, normalizer and ranker.
///
/// Loaded from defaults, then an optional TOML file, then `NEWSVEC_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A term enters the vocabulary only if its corpus frequency is strictly greater than this.
    pub min_occurrence: u32,
    /// Ranked results must score strictly above this.
    pub similarity_cutoff: f64,
    /// Corpus-specific filler, applied on top of the English stop words.
    pub custom_stop_words: Vec<String>,
    /// Replace category member tokens with their label before lemmatizing.
    pub semantic_categories: bool,
    /// Category label -> member tokens.
    pub categories: BTreeMap<String, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_occurrence: 1,
            similarity_cutoff: 0.1,
            custom_stop_words: to_strings(&[
                "post", "today", "news", "portal", "aarthiknews", "nepal", "kathmandu", "along",
                "two", "take", "nepali", "economic", "march", "one",
            ]),
            semantic_categories: true,
            categories: default_categories(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(EngineError::InvalidConfig(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        let config: EngineConfig = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_occurrence < 1 {
            return Err(EngineError::InvalidConfig("min_occurrence must be at least 1".into()));
        }
        if !self.similarity_cutoff.is_finite() || self.similarity_cutoff < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "similarity_cutoff must be a finite non-negative number, got {}",
                self.similarity_cutoff
            )));
        }
        Ok(())
    }
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_categories() -> BTreeMap<String, Vec<String>> {
    let mut table = BTreeMap::new();
    table.insert(
        "game".to_string(),
        to_strings(&[
            "run", "wicket", "icc", "cricket", "bat", "bowl", "series", "match", "cup", "sport",
            "odi", "t20", "toss",
        ]),
    );
    table.insert(
        "finance".to_string(),
        to_strings(&["gold", "tola", "silver", "rs", "billion", "price", "market", "tourist"]),
    );
    table.insert(
        "politics".to_string(),
        to_strings(&[
            "election", "government", "minister", "maoist", "congress", "rpp", "nc", "party",
        ]),
    );
    table.insert(
        "environment".to_string(),
        to_strings(&[
            "pollution", "fire", "forest", "polluted", "evs", "ev", "park", "earthquake",
            "earthquakes",
        ]),
    );
    table
}
