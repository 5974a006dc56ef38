use std::collections::BTreeMap;

use fixtura_core::{FieldCategory, FieldSpec, ModelSpec, Value};

use crate::errors::GenerationError;
use crate::instance::{GeneratedInstance, InstanceKey, Link};
use crate::model::GenerationReport;
use crate::overrides::ScopedOverrides;
use crate::seed::derive_subseed;
use crate::synth::{SeenValues, Synthesizer};

/// Seen values per `(model, field)`, owned by one generation call.
pub type SeenSets = BTreeMap<(String, String), SeenValues>;

/// Combines overrides, resolved links and synthesized values into instances.
pub struct Assembler<'a> {
    synth: Synthesizer<'a>,
    seed: u64,
    overrides: &'a ScopedOverrides,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(synth: Synthesizer<'a>, seed: u64, overrides: &'a ScopedOverrides) -> Self {
        Self {
            synth,
            seed,
            overrides,
        }
    }

    /// Build one complete instance or fail; nothing partial is returned.
    ///
    /// Field precedence: explicit override, then the resolved link for
    /// relational fields, then a synthesized value, then the field default.
    pub fn assemble(
        &self,
        model: &ModelSpec,
        key: InstanceKey,
        links: BTreeMap<String, Link>,
        seen: &mut SeenSets,
        report: &mut GenerationReport,
    ) -> Result<GeneratedInstance, GenerationError> {
        let mut instance = GeneratedInstance::new(key);
        instance.links = links;

        for field in &model.fields {
            if let Some(value) = self.overrides.field(&model.name, &field.name) {
                instance.fields.insert(field.name.clone(), value.clone());
                report.record_override(&model.name);
                continue;
            }

            let value = if field.category == FieldCategory::Relational {
                let link = model
                    .bound_relationship(field)
                    .and_then(|rel| instance.links.get(&rel.name));
                let value = relational_value(field, link);
                if field.unique && !value.is_null() {
                    let seen = seen_for(seen, &model.name, &field.name);
                    if !seen.insert(&value) {
                        return Err(GenerationError::unsatisfiable(
                            &model.name,
                            &field.name,
                            seen.len() as u64 + 1,
                            format!("{value} is already linked by another instance"),
                        ));
                    }
                }
                value
            } else {
                let subseed =
                    derive_subseed(self.seed, &model.name, &field.name, instance.key.ordinal);
                let synthesized = self.synth.synthesize(
                    &model.name,
                    field,
                    subseed,
                    seen_for(seen, &model.name, &field.name),
                )?;
                report.record_retries(&model.name, u64::from(synthesized.retries));
                synthesized.value
            };

            if value.is_null() {
                report.record_null(&model.name);
            }
            instance.fields.insert(field.name.clone(), value);
        }

        Ok(instance)
    }

    /// Refresh relational fields after soft links were resolved.
    ///
    /// Overridden fields are left alone. A unique field whose target is
    /// already taken loses the link instead of duplicating it.
    pub fn rebind_relational_fields(
        &self,
        model: &ModelSpec,
        instance: &mut GeneratedInstance,
        seen: &mut SeenSets,
    ) {
        for field in &model.fields {
            if field.category != FieldCategory::Relational
                || self.overrides.covers(&model.name, &field.name)
            {
                continue;
            }
            let Some(rel) = model.bound_relationship(field) else {
                continue;
            };
            if rel.is_required() {
                continue;
            }
            let mut value = relational_value(field, instance.links.get(&rel.name));
            if field.unique && !value.is_null() {
                let seen = seen_for(seen, &model.name, &field.name);
                if !seen.insert(&value) {
                    instance.links.insert(rel.name.clone(), Link::One(None));
                    value = relational_value(field, None);
                }
            }
            instance.fields.insert(field.name.clone(), value);
        }
    }
}

fn seen_for<'s>(seen: &'s mut SeenSets, model: &str, field: &str) -> &'s mut SeenValues {
    seen.entry((model.to_string(), field.to_string()))
        .or_default()
}

fn relational_value(field: &FieldSpec, link: Option<&Link>) -> Value {
    match link {
        Some(Link::One(Some(target))) => Value::Text(target.to_string()),
        _ => field.default.clone().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locales::LocaleKey;
    use crate::model::{Flavor, GenerationPolicy};
    use crate::overrides::Overrides;
    use crate::provider::FakeValueProvider;
    use fixtura_core::RelationshipSpec;

    fn product() -> ModelSpec {
        ModelSpec::new(
            "shop",
            "Product",
            vec![
                FieldSpec::new("title", FieldCategory::Text),
                FieldSpec::new("price", FieldCategory::Numeric)
                    .with_range(Some(1.0), Some(10.0))
                    .with_decimal_places(2),
                FieldSpec::new("category_id", FieldCategory::Relational),
            ],
            vec![RelationshipSpec::required("category", "Category")],
        )
        .expect("product")
    }

    #[test]
    fn overrides_beat_synthesis_and_skip_clamping() {
        let policy = GenerationPolicy::default();
        let model = product();
        let scoped = Overrides::new()
            .with("price", 999.0)
            .scope(&[&model])
            .expect("scoped");
        let assembler = Assembler::new(
            Synthesizer::new(&FakeValueProvider, &policy, Flavor::Realistic, LocaleKey::EnUs),
            42,
            &scoped,
        );
        let mut links = BTreeMap::new();
        links.insert(
            "category".to_string(),
            Link::One(Some(InstanceKey::new("Category", 0))),
        );
        let mut report = GenerationReport::new(42, Flavor::Realistic, "en_US", 1);
        let instance = assembler
            .assemble(
                &model,
                InstanceKey::new("Product", 0),
                links,
                &mut SeenSets::new(),
                &mut report,
            )
            .expect("instance");

        assert_eq!(instance.field("price"), Some(&Value::Float(999.0)));
        assert_eq!(
            instance.field("category_id"),
            Some(&Value::Text("Category#0".to_string()))
        );
        assert!(instance.field("title").is_some_and(|title| !title.is_null()));
        assert_eq!(report.models["Product"].overrides_applied, 1);
    }
}
