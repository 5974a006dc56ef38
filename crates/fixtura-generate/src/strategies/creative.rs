use rand::{Rng, RngCore};
use serde_json::{Map, json};

use fixtura_core::Value;

use super::{
    Strategy, SynthContext, base_timestamp, numeric_bounds, offset_seconds, random_uuid,
    round_to, sample_number, temporal_value,
};
use crate::heuristics;
use crate::model::Flavor;
use crate::provider::SemanticKind;

const SPREAD: (f64, f64) = (-1_000_000.0, 1_000_000.0);
const EXOTIC: &[&str] = &["ä", "ß", "ø", "ñ", "é", "ł", "ç", "漢", "ж", "λ", "🙂"];
const KINDS: &[SemanticKind] = &[
    SemanticKind::Word,
    SemanticKind::Company,
    SemanticKind::City,
    SemanticKind::JobTitle,
    SemanticKind::Sentence,
    SemanticKind::Username,
];
const CENTURY: i64 = 100 * 365 * 86_400;

/// Maximally diverse values, biased toward declared boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreativeStrategy;

impl Strategy for CreativeStrategy {
    fn flavor(&self) -> Flavor {
        Flavor::Creative
    }

    fn null_probability(&self, base: f64) -> f64 {
        base * 2.0
    }

    fn optional_link_probability(&self) -> f64 {
        0.5
    }

    fn to_many_range(&self, max: u32) -> (u32, u32) {
        (1, max.saturating_add(2))
    }

    fn text(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> String {
        let kind = KINDS[rng.random_range(0..KINDS.len())];
        let mut value = ctx
            .provider
            .provide(kind, ctx.locale, rng)
            .unwrap_or_default();
        if rng.random_bool(0.5) {
            value.push_str(EXOTIC[rng.random_range(0..EXOTIC.len())]);
        }
        if rng.random_bool(0.3) {
            value = value.to_uppercase();
        }
        format!("{value}-{:x}", rng.random::<u32>())
    }

    fn numeric(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value {
        let (min, max) = numeric_bounds(ctx.field, SPREAD);
        let places = ctx.field.decimal_places;
        match rng.random_range(0..10) {
            0 => edge(min, places, true),
            1 => edge(max, places, false),
            _ => sample_number(rng, min, max, places),
        }
    }

    fn boolean(&self, _ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> bool {
        rng.random_bool(0.5)
    }

    fn temporal(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value {
        let shape = heuristics::temporal_shape(&ctx.field.name);
        let seconds = rng.random_range(-CENTURY / 2..=CENTURY / 2);
        temporal_value(shape, offset_seconds(base_timestamp(ctx.policy), seconds))
    }

    fn identifier(&self, _ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value {
        Value::Uuid(random_uuid(rng))
    }

    fn blob(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> serde_json::Value {
        nested(ctx, rng, 2)
    }
}

fn edge(bound: f64, places: Option<u32>, lower: bool) -> Value {
    match places {
        Some(places) => Value::Float(round_to(bound, places)),
        None if lower => Value::Int(bound.ceil() as i64),
        None => Value::Int(bound.floor() as i64),
    }
}

fn nested(ctx: &SynthContext<'_>, rng: &mut dyn RngCore, depth: u32) -> serde_json::Value {
    let mut map = Map::new();
    for _ in 0..rng.random_range(1..=4) {
        let key = ctx
            .provider
            .provide(SemanticKind::Word, ctx.locale, rng)
            .unwrap_or_else(|| "key".to_string());
        let value = match rng.random_range(0..5) {
            0 if depth > 0 => nested(ctx, rng, depth - 1),
            1 => json!(rng.random::<i32>()),
            2 => json!(rng.random_bool(0.5)),
            3 => serde_json::Value::Null,
            _ => json!(EXOTIC[rng.random_range(0..EXOTIC.len())]),
        };
        map.insert(key, value);
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locales::LocaleKey;
    use crate::model::GenerationPolicy;
    use crate::provider::FakeValueProvider;
    use crate::seed::rng_for;
    use fixtura_core::{FieldCategory, FieldSpec};

    #[test]
    fn bounded_numbers_hit_the_edges() {
        let policy = GenerationPolicy::default();
        let field = FieldSpec::new("level", FieldCategory::Numeric).with_range(Some(1.0), Some(9.0));
        let ctx = SynthContext {
            model: "Player",
            field: &field,
            locale: LocaleKey::EnUs,
            provider: &FakeValueProvider,
            policy: &policy,
            sequence: 0,
        };
        let values: Vec<i64> = (0..200)
            .filter_map(|seed| CreativeStrategy.numeric(&ctx, &mut rng_for(seed)).as_i64())
            .collect();
        assert_eq!(values.len(), 200);
        assert!(values.iter().all(|value| (1..=9).contains(value)));
        assert!(values.contains(&1));
        assert!(values.contains(&9));
    }

    #[test]
    fn to_many_always_links_at_least_one() {
        assert_eq!(CreativeStrategy.to_many_range(3), (1, 5));
    }
}
