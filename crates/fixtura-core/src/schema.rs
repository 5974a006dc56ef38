use schemars::JsonSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::validation::{validate_catalog, validate_field, validate_model};
use crate::value::Value;

/// Semantic category of a field; drives the synthesis strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Text,
    Numeric,
    Boolean,
    Temporal,
    Identifier,
    StructuredBlob,
    /// Holds the key of the instance linked through the relationship of the same name.
    Relational,
}

/// Normalized description of one data field and its constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FieldSpec {
    pub name: String,
    pub category: FieldCategory,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    /// Allowed values in declaration order; empty means unconstrained.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<serde_json::Value>")]
    pub choices: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Numeric scale; absent means integral unless a currency heuristic applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    pub default: Option<Value>,
}

impl FieldSpec {
    /// Unconstrained, non-null, non-unique field.
    pub fn new(name: impl Into<String>, category: FieldCategory) -> Self {
        Self {
            name: name.into(),
            category,
            nullable: false,
            unique: false,
            choices: Vec::new(),
            max_length: None,
            min: None,
            max: None,
            decimal_places: None,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_decimal_places(mut self, places: u32) -> Self {
        self.decimal_places = Some(places);
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Finish construction, rejecting inconsistent constraints.
    pub fn validated(self) -> Result<Self> {
        validate_field("<field>", &self)?;
        Ok(self)
    }

    /// Number of distinct non-null values this field can take, when finite.
    pub fn domain_size(&self) -> Option<u64> {
        if !self.choices.is_empty() {
            let mut keys: Vec<String> = self.choices.iter().map(Value::key).collect();
            keys.sort();
            keys.dedup();
            return Some(keys.len() as u64);
        }
        match self.category {
            FieldCategory::Boolean => Some(2),
            FieldCategory::Numeric if self.decimal_places.is_none() => {
                let (min, max) = (self.min?, self.max?);
                let low = min.ceil();
                let high = max.floor();
                if high < low {
                    Some(0)
                } else {
                    Some(((high - low) as u64).saturating_add(1))
                }
            }
            _ => None,
        }
    }
}

/// Cardinality and optionality of a relationship.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    ToOneRequired,
    ToOneOptional,
    ToMany,
}

/// Link from one model to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct RelationshipSpec {
    pub name: String,
    pub kind: RelationshipKind,
    /// Name of the target model.
    pub target: String,
    /// Join model label for to-many links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
    /// To-many only: link existing instances, never synthesize targets.
    #[serde(default)]
    pub pool_only: bool,
}

impl RelationshipSpec {
    fn with_kind(name: impl Into<String>, kind: RelationshipKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            through: None,
            pool_only: false,
        }
    }

    pub fn required(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, RelationshipKind::ToOneRequired, target)
    }

    pub fn optional(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, RelationshipKind::ToOneOptional, target)
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, RelationshipKind::ToMany, target)
    }

    pub fn through(mut self, join: impl Into<String>) -> Self {
        self.through = Some(join.into());
        self
    }

    pub fn pool_only(mut self) -> Self {
        self.pool_only = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.kind == RelationshipKind::ToOneRequired
    }
}

/// Normalized description of one entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ModelSpec {
    pub name: String,
    /// Namespace label the model belongs to.
    #[serde(default)]
    pub app: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipSpec>,
}

impl ModelSpec {
    pub fn new(
        app: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldSpec>,
        relationships: Vec<RelationshipSpec>,
    ) -> Result<Self> {
        let model = Self {
            name: name.into(),
            app: app.into(),
            fields,
            relationships,
        };
        validate_model(&model)?;
        Ok(model)
    }

    /// `app.Name`, or the bare name when the model has no namespace.
    pub fn path(&self) -> String {
        if self.app.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.app, self.name)
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSpec> {
        self.relationships.iter().find(|rel| rel.name == name)
    }

    /// Relationship a relational field carries the key of.
    pub fn bound_relationship(&self, field: &FieldSpec) -> Option<&RelationshipSpec> {
        if field.category != FieldCategory::Relational {
            return None;
        }
        self.relationship(&field.name).or_else(|| {
            field
                .name
                .strip_suffix("_id")
                .and_then(|stem| self.relationship(stem))
        })
    }

    pub fn required_targets(&self) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(|rel| rel.is_required())
            .map(|rel| rel.target.as_str())
    }
}

/// Validated collection of models extracted by a schema source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SchemaCatalog {
    /// Contract version for this document format.
    pub schema_version: String,
    pub models: Vec<ModelSpec>,
}

impl SchemaCatalog {
    pub fn new(models: Vec<ModelSpec>) -> Result<Self> {
        let catalog = Self {
            schema_version: crate::SCHEMA_VERSION.to_string(),
            models,
        };
        validate_catalog(&catalog)?;
        Ok(catalog)
    }

    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|model| model.name == name)
    }

    /// Look a model up by `app.Name` or bare name; model names match case-insensitively.
    pub fn resolve_model_by_path(&self, path: &str) -> Result<&ModelSpec> {
        let path = path.trim();
        let found = match path.rsplit_once('.') {
            Some((app, name)) => self
                .models
                .iter()
                .find(|model| model.app == app && model.name.eq_ignore_ascii_case(name)),
            None => self
                .model(path)
                .or_else(|| {
                    self.models
                        .iter()
                        .find(|model| model.name.eq_ignore_ascii_case(path))
                }),
        };
        found.ok_or_else(|| Error::UnknownModel(path.to_string()))
    }

    pub fn models_in_app<'a>(&'a self, app: &'a str) -> impl Iterator<Item = &'a ModelSpec> {
        self.models.iter().filter(move |model| model.app == app)
    }

    pub fn apps(&self) -> Vec<&str> {
        let mut apps: Vec<&str> = self.models.iter().map(|model| model.app.as_str()).collect();
        apps.sort_unstable();
        apps.dedup();
        apps
    }

    /// SHA-256 over the canonical JSON rendering of the catalog.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// Emit the JSON Schema for catalog documents.
pub fn catalog_json_schema() -> RootSchema {
    schema_for!(SchemaCatalog)
}
