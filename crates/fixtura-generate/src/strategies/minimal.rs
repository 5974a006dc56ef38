use rand::RngCore;
use serde_json::json;

use fixtura_core::{FieldSpec, Value};

use super::{Strategy, SynthContext, base_timestamp, offset_seconds, temporal_value};
use crate::heuristics;
use crate::model::Flavor;

/// Smallest values that satisfy the declared constraints.
///
/// Draws are sequence based rather than random, so unique fields walk
/// `x0`, `x1`, ... and non-unique fields repeat one value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalStrategy;

fn sequence(ctx: &SynthContext<'_>) -> u64 {
    if ctx.field.unique { ctx.sequence } else { 0 }
}

impl Strategy for MinimalStrategy {
    fn flavor(&self) -> Flavor {
        Flavor::Minimal
    }

    fn defers_to_default(&self, field: &FieldSpec) -> bool {
        field.default.is_some() && !field.unique
    }

    fn optional_link_probability(&self) -> f64 {
        0.0
    }

    fn to_many_range(&self, max: u32) -> (u32, u32) {
        (0, max.min(1))
    }

    fn shares_dependencies(&self) -> bool {
        true
    }

    fn text(&self, ctx: &SynthContext<'_>, _rng: &mut dyn RngCore) -> String {
        let prefix = ctx
            .field
            .name
            .chars()
            .find(|ch| ch.is_alphabetic())
            .map(|ch| ch.to_ascii_lowercase())
            .unwrap_or('x');
        if ctx.field.unique {
            format!("{prefix}{}", ctx.sequence)
        } else {
            prefix.to_string()
        }
    }

    fn numeric(&self, ctx: &SynthContext<'_>, _rng: &mut dyn RngCore) -> Value {
        let step = sequence(ctx) as f64;
        // Walk away from the only bound that is declared.
        let value = match (ctx.field.min, ctx.field.max) {
            (Some(min), _) => min + step,
            (None, Some(max)) if max < 0.0 => max - step,
            _ => step,
        };
        match ctx.field.decimal_places {
            Some(_) => Value::Float(value),
            None if ctx.field.min.is_some() => Value::Int(value.ceil() as i64),
            None => Value::Int(value.floor() as i64),
        }
    }

    fn boolean(&self, ctx: &SynthContext<'_>, _rng: &mut dyn RngCore) -> bool {
        sequence(ctx) % 2 == 1
    }

    fn temporal(&self, ctx: &SynthContext<'_>, _rng: &mut dyn RngCore) -> Value {
        let shape = heuristics::temporal_shape(&ctx.field.name);
        let at = offset_seconds(base_timestamp(ctx.policy), sequence(ctx) as i64 * 86_400);
        temporal_value(shape, at)
    }

    fn identifier(&self, ctx: &SynthContext<'_>, _rng: &mut dyn RngCore) -> Value {
        Value::Int(ctx.sequence as i64 + 1)
    }

    fn blob(&self, ctx: &SynthContext<'_>, _rng: &mut dyn RngCore) -> serde_json::Value {
        if ctx.field.unique {
            json!({ "n": ctx.sequence })
        } else {
            json!({})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locales::LocaleKey;
    use crate::model::GenerationPolicy;
    use crate::provider::FakeValueProvider;
    use crate::seed::rng_for;
    use crate::synth::{SeenValues, Synthesizer};
    use fixtura_core::FieldCategory;

    fn ctx<'a>(field: &'a FieldSpec, policy: &'a GenerationPolicy, sequence: u64) -> SynthContext<'a> {
        SynthContext {
            model: "Item",
            field,
            locale: LocaleKey::EnUs,
            provider: &FakeValueProvider,
            policy,
            sequence,
        }
    }

    #[test]
    fn unique_text_walks_a_sequence() {
        let policy = GenerationPolicy::default();
        let field = FieldSpec::new("code", FieldCategory::Text).unique();
        let first = MinimalStrategy.text(&ctx(&field, &policy, 0), &mut rng_for(1));
        let second = MinimalStrategy.text(&ctx(&field, &policy, 1), &mut rng_for(1));
        assert_eq!(first, "c0");
        assert_eq!(second, "c1");
    }

    #[test]
    fn numbers_start_at_the_lower_bound() {
        let policy = GenerationPolicy::default();
        let field = FieldSpec::new("qty", FieldCategory::Numeric).with_range(Some(3.0), Some(9.0));
        let value = MinimalStrategy.numeric(&ctx(&field, &policy, 5), &mut rng_for(1));
        assert_eq!(value, Value::Int(3));
    }

    #[test]
    fn defers_to_defaults_for_plain_fields() {
        let field = FieldSpec::new("status", FieldCategory::Text).with_default("draft");
        assert!(MinimalStrategy.defers_to_default(&field));
        assert!(!MinimalStrategy.defers_to_default(&field.clone().unique()));
    }

    #[test]
    fn deferred_defaults_stay_within_declared_limits() {
        let rejected = FieldSpec::new("status", FieldCategory::Text)
            .with_max_length(3)
            .with_default("archived")
            .validated();
        assert!(rejected.is_err());

        let policy = GenerationPolicy::default();
        let synth = Synthesizer::new(&FakeValueProvider, &policy, Flavor::Minimal, LocaleKey::EnUs);
        let qty = FieldSpec::new("qty", FieldCategory::Numeric)
            .with_range(Some(10.0), Some(20.0))
            .with_default(15_i64)
            .validated()
            .expect("default inside bounds");
        let value = synth
            .synthesize("Item", &qty, 7, &mut SeenValues::new())
            .expect("value")
            .value;
        assert_eq!(value, Value::Int(15));

        // Specs built without validation still come out inside their limits.
        let mut status = FieldSpec::new("status", FieldCategory::Text).with_max_length(3);
        status.default = Some(Value::from("archived"));
        let value = synth
            .synthesize("Item", &status, 7, &mut SeenValues::new())
            .expect("value")
            .value;
        assert!(value.char_len() <= 3);
    }
}
