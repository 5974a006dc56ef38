use std::collections::BTreeSet;

use chrono::DateTime;

use crate::error::{Error, Result};
use crate::schema::{FieldCategory, FieldSpec, ModelSpec, RelationshipKind, SchemaCatalog};
use crate::value::Value;

/// Validate the constraints declared on a single field.
///
/// This checks:
/// - `min <= max`
/// - every choice fits `max_length` and the numeric bounds
/// - the default is one of the choices when choices are declared
/// - the default fits `max_length` and the numeric bounds
/// - temporal bounds are representable timestamps
pub fn validate_field(model: &str, field: &FieldSpec) -> Result<()> {
    if field.name.trim().is_empty() {
        return Err(Error::SchemaValidation(format!(
            "empty field name in model {model}"
        )));
    }

    if let (Some(min), Some(max)) = (field.min, field.max)
        && min > max
    {
        return Err(Error::SchemaValidation(format!(
            "min {min} greater than max {max}: {model}.{}",
            field.name
        )));
    }

    if let Some(max_length) = field.max_length {
        let longest = field
            .choices
            .iter()
            .filter(|choice| !choice.is_null())
            .map(Value::char_len)
            .max();
        if let Some(longest) = longest
            && longest > max_length
        {
            return Err(Error::SchemaValidation(format!(
                "longest choice ({longest} chars) exceeds max_length {max_length}: {model}.{}",
                field.name
            )));
        }
    }

    if field.category == FieldCategory::Numeric {
        for choice in &field.choices {
            let Some(number) = choice.as_f64() else {
                continue;
            };
            let below = field.min.is_some_and(|min| number < min);
            let above = field.max.is_some_and(|max| number > max);
            if below || above {
                return Err(Error::SchemaValidation(format!(
                    "choice {number} outside declared bounds: {model}.{}",
                    field.name
                )));
            }
        }
    }

    if let Some(default) = &field.default
        && !field.choices.is_empty()
        && !default.is_null()
        && !field.choices.iter().any(|choice| choice.key() == default.key())
    {
        return Err(Error::SchemaValidation(format!(
            "default '{default}' is not one of the choices: {model}.{}",
            field.name
        )));
    }

    if let Some(default) = field.default.as_ref().filter(|default| !default.is_null()) {
        let textual = !matches!(default, Value::Bool(_) | Value::Int(_) | Value::Float(_));
        if let Some(max_length) = field.max_length
            && textual
            && default.char_len() > max_length
        {
            return Err(Error::SchemaValidation(format!(
                "default '{default}' exceeds max_length {max_length}: {model}.{}",
                field.name
            )));
        }
        if field.category == FieldCategory::Numeric
            && let Some(number) = default.as_f64()
            && (field.min.is_some_and(|min| number < min) || field.max.is_some_and(|max| number > max))
        {
            return Err(Error::SchemaValidation(format!(
                "default {number} outside declared bounds: {model}.{}",
                field.name
            )));
        }
    }

    if field.category == FieldCategory::Temporal {
        for bound in [field.min, field.max].into_iter().flatten() {
            if !representable_timestamp(bound) {
                return Err(Error::SchemaValidation(format!(
                    "temporal bound {bound} is not a representable epoch timestamp: {model}.{}",
                    field.name
                )));
            }
        }
    }

    Ok(())
}

// Temporal bounds are Unix epoch seconds.
fn representable_timestamp(seconds: f64) -> bool {
    seconds.is_finite()
        && seconds >= i64::MIN as f64
        && seconds < i64::MAX as f64
        && DateTime::from_timestamp(seconds as i64, 0).is_some()
}

/// Validate internal consistency of a model.
///
/// This checks:
/// - field and relationship names are unique
/// - relational fields bind to a to-one relationship
/// - a relationship name only shadows the relational field bound to it
/// - join labels and pool-only flags appear on to-many relationships only
pub fn validate_model(model: &ModelSpec) -> Result<()> {
    if model.name.trim().is_empty() {
        return Err(Error::SchemaValidation("empty model name".to_string()));
    }

    let mut field_names = BTreeSet::new();
    for field in &model.fields {
        validate_field(&model.name, field)?;
        if !field_names.insert(field.name.as_str()) {
            return Err(Error::SchemaValidation(format!(
                "duplicate field name: {}.{}",
                model.name, field.name
            )));
        }
    }

    let mut relationship_names = BTreeSet::new();
    for rel in &model.relationships {
        if !relationship_names.insert(rel.name.as_str()) {
            return Err(Error::SchemaValidation(format!(
                "duplicate relationship name: {}.{}",
                model.name, rel.name
            )));
        }
        if let Some(field) = model.field(&rel.name)
            && field.category != FieldCategory::Relational
        {
            return Err(Error::SchemaValidation(format!(
                "relationship name clashes with field: {}.{}",
                model.name, rel.name
            )));
        }
        if rel.kind != RelationshipKind::ToMany && (rel.through.is_some() || rel.pool_only) {
            return Err(Error::SchemaValidation(format!(
                "through/pool_only only apply to to-many relationships: {}.{}",
                model.name, rel.name
            )));
        }
    }

    for field in &model.fields {
        if field.category != FieldCategory::Relational {
            continue;
        }
        match model.bound_relationship(field) {
            None => {
                return Err(Error::SchemaValidation(format!(
                    "relational field has no relationship: {}.{}",
                    model.name, field.name
                )));
            }
            Some(rel) if rel.kind == RelationshipKind::ToMany => {
                return Err(Error::SchemaValidation(format!(
                    "relational field bound to a to-many relationship: {}.{}",
                    model.name, field.name
                )));
            }
            Some(rel)
                if rel.kind == RelationshipKind::ToOneOptional
                    && !field.nullable
                    && field.default.is_none() =>
            {
                return Err(Error::SchemaValidation(format!(
                    "field bound to an optional relationship must be nullable or have a default: {}.{}",
                    model.name, field.name
                )));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Validate a catalog: every model, unique model names, resolvable targets.
pub fn validate_catalog(catalog: &SchemaCatalog) -> Result<()> {
    let mut names = BTreeSet::new();
    for model in &catalog.models {
        validate_model(model)?;
        if !names.insert(model.name.as_str()) {
            return Err(Error::SchemaValidation(format!(
                "duplicate model name: {}",
                model.name
            )));
        }
    }

    for model in &catalog.models {
        for rel in &model.relationships {
            if !names.contains(rel.target.as_str()) {
                return Err(Error::SchemaValidation(format!(
                    "relationship target not found: {}.{} -> {}",
                    model.name, rel.name, rel.target
                )));
            }
        }
    }

    Ok(())
}
