use rand::{Rng, RngCore};
use serde_json::json;

use fixtura_core::Value;

use super::{
    Strategy, SynthContext, base_timestamp, numeric_bounds, offset_seconds, random_uuid,
    sample_number, temporal_value,
};
use crate::heuristics::{self, TemporalShape};
use crate::model::Flavor;
use crate::provider::SemanticKind;

const DAY: i64 = 86_400;

/// Plausible, human-looking values guided by field names.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealisticStrategy;

impl Strategy for RealisticStrategy {
    fn flavor(&self) -> Flavor {
        Flavor::Realistic
    }

    fn optional_link_probability(&self) -> f64 {
        0.8
    }

    fn to_many_range(&self, max: u32) -> (u32, u32) {
        (0, max)
    }

    fn text(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> String {
        if let Some(kind) = heuristics::semantic_kind(&ctx.field.name)
            && let Some(value) = ctx.provider.provide(kind, ctx.locale, rng)
        {
            return value;
        }
        // Short codes read better than truncated sentences.
        if ctx.field.max_length.is_some_and(|max| max <= 6) {
            let len = ctx.field.max_length.unwrap_or(6).max(1);
            return (0..len)
                .map(|_| char::from(b'A' + rng.random_range(0..26_u8)))
                .collect();
        }
        let count = rng.random_range(1..=3);
        (0..count)
            .filter_map(|_| ctx.provider.provide(SemanticKind::Word, ctx.locale, rng))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn numeric(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value {
        let shape = heuristics::numeric_shape(&ctx.field.name);
        let (min, max) = numeric_bounds(ctx.field, shape.default_range());
        let places = ctx
            .field
            .decimal_places
            .or_else(|| shape.default_decimal_places());
        sample_number(rng, min, max, places)
    }

    fn boolean(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> bool {
        rng.random_bool(heuristics::boolean_bias(&ctx.field.name))
    }

    fn temporal(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value {
        let base = base_timestamp(ctx.policy);
        let shape = heuristics::temporal_shape(&ctx.field.name);
        let seconds = match shape {
            TemporalShape::Timestamp => -rng.random_range(0..365 * DAY),
            TemporalShape::Date => rng.random_range(-365..=365) * DAY,
            TemporalShape::BirthDate => -rng.random_range(18 * 365..=80 * 365) * DAY,
        };
        temporal_value(shape, offset_seconds(base, seconds))
    }

    fn identifier(&self, _ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value {
        Value::Uuid(random_uuid(rng))
    }

    fn blob(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> serde_json::Value {
        let mut word = || {
            ctx.provider
                .provide(SemanticKind::Word, ctx.locale, rng)
                .unwrap_or_default()
        };
        let label = word();
        let tags = [word(), word()];
        json!({
            "label": label,
            "tags": tags,
            "version": rng.random_range(1..=5),
        })
    }
}
