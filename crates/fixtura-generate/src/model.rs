use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Named synthesis behavior profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    /// Plausible human-looking data.
    #[default]
    Realistic,
    /// Maximally diverse and edge-biased data.
    Creative,
    /// Smallest values and fewest optional links that still satisfy constraints.
    Minimal,
}

impl Flavor {
    pub const ALL: [Flavor; 3] = [Flavor::Realistic, Flavor::Creative, Flavor::Minimal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Realistic => "realistic",
            Flavor::Creative => "creative",
            Flavor::Minimal => "minimal",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Flavor::ALL
            .into_iter()
            .find(|flavor| flavor.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                format!("unknown flavor '{value}' (expected realistic, creative or minimal)")
            })
    }
}

/// Per-call session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed seed for reproducible output; absent means fresh entropy per session.
    pub seed: Option<u64>,
    pub flavor: Flavor,
    pub locale: String,
    /// Hand the batch to a persistence adapter after generation.
    pub persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: None,
            flavor: Flavor::Realistic,
            locale: "en_US".to_string(),
            persist: false,
        }
    }
}

impl SessionConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

/// Tunables shared by every flavor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationPolicy {
    /// Attempts per unique value before giving up.
    pub max_unique_attempts: u32,
    /// Base probability of null for nullable fields.
    pub null_probability: f64,
    /// Upper bound of links drawn for a to-many relationship.
    pub to_many_max: u32,
    /// Anchor for temporal values.
    pub base_date: NaiveDate,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            max_unique_attempts: 100,
            null_probability: 0.05,
            to_many_max: 3,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }
}

/// Summary for one model in a generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelReport {
    pub model: String,
    pub requested: u64,
    pub generated: u64,
    /// Instances created only to satisfy another model's relationships.
    pub auxiliary: u64,
    pub unique_retries: u64,
    pub nulls: u64,
    pub overrides_applied: u64,
    pub links: u64,
}

/// Report for a generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationReport {
    pub seed: u64,
    pub flavor: Flavor,
    pub locale: String,
    pub count: u64,
    pub models: BTreeMap<String, ModelReport>,
    pub retries_total: u64,
    pub instances_total: u64,
    pub warnings: Vec<String>,
}

impl GenerationReport {
    pub fn new(seed: u64, flavor: Flavor, locale: &str, count: u64) -> Self {
        Self {
            seed,
            flavor,
            locale: locale.to_string(),
            count,
            models: BTreeMap::new(),
            retries_total: 0,
            instances_total: 0,
            warnings: Vec::new(),
        }
    }

    fn entry(&mut self, model: &str) -> &mut ModelReport {
        self.models
            .entry(model.to_string())
            .or_insert_with(|| ModelReport {
                model: model.to_string(),
                ..ModelReport::default()
            })
    }

    pub fn record_requested(&mut self, model: &str, count: u64) {
        self.entry(model).requested = count;
    }

    pub fn record_instance(&mut self, model: &str, auxiliary: bool) {
        let entry = self.entry(model);
        entry.generated += 1;
        if auxiliary {
            entry.auxiliary += 1;
        }
        self.instances_total += 1;
    }

    pub fn record_retries(&mut self, model: &str, retries: u64) {
        if retries == 0 {
            return;
        }
        self.entry(model).unique_retries += retries;
        self.retries_total += retries;
    }

    pub fn record_null(&mut self, model: &str) {
        self.entry(model).nulls += 1;
    }

    pub fn record_override(&mut self, model: &str) {
        self.entry(model).overrides_applied += 1;
    }

    pub fn record_links(&mut self, model: &str, links: u64) {
        self.entry(model).links += links;
    }

    pub fn record_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
