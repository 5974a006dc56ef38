use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fixtura_core::{ModelSpec, RelationshipKind, RelationshipSpec, Value};

use crate::errors::GenerationError;
use crate::instance::{InstanceKey, Link};

/// Caller-supplied literal values, keyed by `field` or `Model.field`.
///
/// Keys naming a field replace the synthesized value verbatim. Keys naming a
/// relationship pin its link: `null` unlinks, a `"Model#n"` key links one
/// instance, an array of keys sets a to-many link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overrides {
    entries: BTreeMap<String, Value>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Parse a `key=value` assignment; the value is JSON, or plain text when it is not.
    pub fn parse_assignment(assignment: &str) -> Result<(String, Value), String> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("override '{assignment}' must look like field=value"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("override '{assignment}' has an empty field name"));
        }
        let value = serde_json::from_str::<serde_json::Value>(raw)
            .map(Value::from_json)
            .unwrap_or_else(|_| Value::Text(raw.to_string()));
        Ok((key.to_string(), value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Bind every key to the requested models it applies to.
    ///
    /// `Model.name` targets one model; a bare `name` applies to every
    /// requested model declaring it. Keys that match nothing are rejected.
    pub(crate) fn scope(&self, models: &[&ModelSpec]) -> Result<ScopedOverrides, GenerationError> {
        let mut scoped = ScopedOverrides::default();
        let target_label = models
            .iter()
            .map(|model| model.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        for (key, value) in &self.entries {
            let mut matched = false;
            for model in models {
                let name = match key.split_once('.') {
                    Some((model_name, name)) if model_name == model.name => name,
                    Some(_) => continue,
                    None => key.as_str(),
                };
                let Some(entry) = bind(model, key, name, value)? else {
                    continue;
                };
                scoped
                    .by_model
                    .entry(model.name.clone())
                    .or_default()
                    .insert(name.to_string(), entry);
                matched = true;
            }
            if !matched {
                return Err(GenerationError::invalid_override(
                    &target_label,
                    key,
                    "no field or relationship with this name",
                ));
            }
        }
        Ok(scoped)
    }
}

fn bind(
    model: &ModelSpec,
    key: &str,
    name: &str,
    value: &Value,
) -> Result<Option<OverrideEntry>, GenerationError> {
    if let Some(rel) = model.relationship(name) {
        return link_override(model, key, rel, value).map(Some);
    }
    if model.field(name).is_some() {
        return Ok(Some(OverrideEntry::Field(value.clone())));
    }
    Ok(None)
}

fn link_override(
    model: &ModelSpec,
    key: &str,
    rel: &RelationshipSpec,
    value: &Value,
) -> Result<OverrideEntry, GenerationError> {
    let invalid = |reason: String| GenerationError::invalid_override(&model.name, key, reason);
    let parse_key = |raw: &str| -> Result<InstanceKey, GenerationError> {
        let target: InstanceKey = raw.parse().map_err(invalid)?;
        if target.model != rel.target {
            return Err(invalid(format!(
                "'{target}' is not an instance of {}",
                rel.target
            )));
        }
        Ok(target)
    };

    match (rel.kind, value) {
        (RelationshipKind::ToOneRequired, Value::Null) => Err(invalid(
            "a required relationship cannot be unlinked".to_string(),
        )),
        (RelationshipKind::ToOneOptional, Value::Null) => Ok(OverrideEntry::Link(Link::One(None))),
        (RelationshipKind::ToMany, Value::Null) => Ok(OverrideEntry::Link(Link::Many(Vec::new()))),
        (RelationshipKind::ToMany, Value::Text(raw)) => {
            Ok(OverrideEntry::Link(Link::Many(vec![parse_key(raw)?])))
        }
        (_, Value::Text(raw)) => Ok(OverrideEntry::Link(Link::One(Some(parse_key(raw)?)))),
        (RelationshipKind::ToMany, Value::Json(serde_json::Value::Array(items))) => {
            let mut keys = Vec::with_capacity(items.len());
            for item in items {
                let raw = item.as_str().ok_or_else(|| {
                    invalid(format!("expected instance keys, found {item}"))
                })?;
                let target = parse_key(raw)?;
                if !keys.contains(&target) {
                    keys.push(target);
                }
            }
            Ok(OverrideEntry::Link(Link::Many(keys)))
        }
        (_, other) => Err(invalid(format!(
            "expected an instance key for relationship {}, found {other}",
            rel.name
        ))),
    }
}

/// Override applied to one field or relationship of one model.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OverrideEntry {
    Field(Value),
    Link(Link),
}

/// Overrides bound to the models of one generation call.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScopedOverrides {
    by_model: BTreeMap<String, BTreeMap<String, OverrideEntry>>,
}

impl ScopedOverrides {
    pub(crate) fn field(&self, model: &str, name: &str) -> Option<&Value> {
        match self.by_model.get(model)?.get(name)? {
            OverrideEntry::Field(value) => Some(value),
            OverrideEntry::Link(_) => None,
        }
    }

    pub(crate) fn link(&self, model: &str, name: &str) -> Option<&Link> {
        match self.by_model.get(model)?.get(name)? {
            OverrideEntry::Link(link) => Some(link),
            OverrideEntry::Field(_) => None,
        }
    }

    pub(crate) fn covers(&self, model: &str, name: &str) -> bool {
        self.by_model
            .get(model)
            .is_some_and(|entries| entries.contains_key(name))
    }
}
