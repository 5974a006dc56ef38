use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fixtura_core::Value;

/// Stable identity of an instance within a session: `Model#ordinal`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceKey {
    pub model: String,
    pub ordinal: u64,
}

impl InstanceKey {
    pub fn new(model: impl Into<String>, ordinal: u64) -> Self {
        Self {
            model: model.into(),
            ordinal,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model, self.ordinal)
    }
}

impl FromStr for InstanceKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (model, ordinal) = value
            .rsplit_once('#')
            .ok_or_else(|| format!("instance key '{value}' must look like Model#0"))?;
        if model.is_empty() {
            return Err(format!("instance key '{value}' has no model"));
        }
        let ordinal = ordinal
            .parse::<u64>()
            .map_err(|_| format!("instance key '{value}' has a non-numeric ordinal"))?;
        Ok(Self::new(model, ordinal))
    }
}

impl TryFrom<String> for InstanceKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstanceKey> for String {
    fn from(key: InstanceKey) -> Self {
        key.to_string()
    }
}

/// Resolved end of a relationship.
///
/// Serializes as `null`, a single key or an array of keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    One(Option<InstanceKey>),
    Many(Vec<InstanceKey>),
}

impl Link {
    pub fn targets(&self) -> Vec<&InstanceKey> {
        match self {
            Link::One(target) => target.iter().collect(),
            Link::Many(targets) => targets.iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Link::One(target) => target.is_none(),
            Link::Many(targets) => targets.is_empty(),
        }
    }
}

/// One materialized object: field values plus resolved links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedInstance {
    pub key: InstanceKey,
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, Link>,
}

impl GeneratedInstance {
    pub fn new(key: InstanceKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.key.model
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.get(name)
    }
}

/// Instances produced by one generation call, in creation order.
///
/// Creation order is dependency order: every instance appears after the
/// instances its required relationships point at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratedBatch {
    instances: Vec<GeneratedInstance>,
    #[serde(skip)]
    index: BTreeMap<InstanceKey, usize>,
    requested: Vec<String>,
}

impl GeneratedBatch {
    pub(crate) fn new(requested: Vec<String>) -> Self {
        Self {
            instances: Vec::new(),
            index: BTreeMap::new(),
            requested,
        }
    }

    pub(crate) fn push(&mut self, instance: GeneratedInstance) {
        self.index.insert(instance.key.clone(), self.instances.len());
        self.instances.push(instance);
    }

    pub(crate) fn get_mut(&mut self, key: &InstanceKey) -> Option<&mut GeneratedInstance> {
        let position = *self.index.get(key)?;
        self.instances.get_mut(position)
    }

    pub fn get(&self, key: &InstanceKey) -> Option<&GeneratedInstance> {
        self.index
            .get(key)
            .and_then(|position| self.instances.get(*position))
    }

    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedInstance> {
        self.instances.iter()
    }

    pub fn instances_of<'a>(&'a self, model: &str) -> impl Iterator<Item = &'a GeneratedInstance> {
        self.instances
            .iter()
            .filter(move |instance| instance.model_name() == model)
    }

    /// Models the caller asked for, as opposed to auxiliary dependencies.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn is_requested(&self, model: &str) -> bool {
        self.requested.iter().any(|name| name == model)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instances grouped by model name.
    pub fn grouped(&self) -> BTreeMap<String, Vec<GeneratedInstance>> {
        let mut grouped: BTreeMap<String, Vec<GeneratedInstance>> = BTreeMap::new();
        for instance in &self.instances {
            grouped
                .entry(instance.model_name().to_string())
                .or_default()
                .push(instance.clone());
        }
        grouped
    }

    pub fn into_instances(self) -> Vec<GeneratedInstance> {
        self.instances
    }
}
