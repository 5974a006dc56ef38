//! Flavor strategies: one strategy object per `Flavor`.

mod creative;
mod minimal;
mod realistic;

use chrono::{Duration, NaiveDateTime};
use rand::{Rng, RngCore};

use fixtura_core::{FieldCategory, FieldSpec, Value};

use crate::heuristics::TemporalShape;
use crate::locales::LocaleKey;
use crate::model::{Flavor, GenerationPolicy};
use crate::provider::ValueProvider;

pub use creative::CreativeStrategy;
pub use minimal::MinimalStrategy;
pub use realistic::RealisticStrategy;

/// Inputs shared by every candidate draw.
pub struct SynthContext<'a> {
    pub model: &'a str,
    pub field: &'a FieldSpec,
    pub locale: LocaleKey,
    pub provider: &'a dyn ValueProvider,
    pub policy: &'a GenerationPolicy,
    /// Values already accepted for this field plus the current retry attempt.
    pub sequence: u64,
}

/// Category-specific candidate generation plus the linking knobs of a flavor.
///
/// Candidates are not required to satisfy `max_length` or bounds; the
/// synthesizer repairs them afterwards.
pub trait Strategy: Send + Sync {
    fn flavor(&self) -> Flavor;

    fn null_probability(&self, base: f64) -> f64 {
        base
    }

    /// Use the declared default instead of drawing a candidate.
    fn defers_to_default(&self, _field: &FieldSpec) -> bool {
        false
    }

    fn optional_link_probability(&self) -> f64;

    /// Inclusive range of links drawn for a to-many relationship.
    fn to_many_range(&self, max: u32) -> (u32, u32);

    /// Reuse one synthesized dependency per target model for the whole call.
    fn shares_dependencies(&self) -> bool {
        false
    }

    fn text(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> String;
    fn numeric(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value;
    fn boolean(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> bool;
    fn temporal(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value;
    fn identifier(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value;
    fn blob(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> serde_json::Value;

    fn candidate(&self, ctx: &SynthContext<'_>, rng: &mut dyn RngCore) -> Value {
        match ctx.field.category {
            FieldCategory::Text => Value::Text(self.text(ctx, rng)),
            FieldCategory::Numeric => self.numeric(ctx, rng),
            FieldCategory::Boolean => Value::Bool(self.boolean(ctx, rng)),
            FieldCategory::Temporal => self.temporal(ctx, rng),
            FieldCategory::Identifier | FieldCategory::Relational => self.identifier(ctx, rng),
            FieldCategory::StructuredBlob => Value::Json(self.blob(ctx, rng)),
        }
    }
}

static REALISTIC: RealisticStrategy = RealisticStrategy;
static CREATIVE: CreativeStrategy = CreativeStrategy;
static MINIMAL: MinimalStrategy = MinimalStrategy;

impl Flavor {
    pub fn strategy(self) -> &'static dyn Strategy {
        match self {
            Flavor::Realistic => &REALISTIC,
            Flavor::Creative => &CREATIVE,
            Flavor::Minimal => &MINIMAL,
        }
    }
}

pub(crate) fn random_uuid(rng: &mut dyn RngCore) -> String {
    let mut bytes = [0_u8; 16];
    rng.fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    uuid::Uuid::from_bytes(bytes).to_string()
}

/// Declared bounds, completed from `fallback` where the field is open.
pub(crate) fn numeric_bounds(field: &FieldSpec, fallback: (f64, f64)) -> (f64, f64) {
    let span = (fallback.1 - fallback.0).abs().max(1.0);
    match (field.min, field.max) {
        (Some(min), Some(max)) => (min, max),
        (Some(min), None) => (min, fallback.1.max(min + span)),
        (None, Some(max)) => (fallback.0.min(max - span), max),
        (None, None) => fallback,
    }
}

pub(crate) fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places.min(12) as i32);
    (value * factor).round() / factor
}

/// Uniform draw in `[min, max]`, integral unless `places` is set.
pub(crate) fn sample_number(
    rng: &mut dyn RngCore,
    min: f64,
    max: f64,
    places: Option<u32>,
) -> Value {
    match places {
        Some(places) => {
            let value = if max > min { rng.random_range(min..=max) } else { min };
            Value::Float(round_to(value, places))
        }
        None => {
            let low = min.ceil() as i64;
            let high = max.floor() as i64;
            if high > low {
                Value::Int(rng.random_range(low..=high))
            } else {
                Value::Int(low)
            }
        }
    }
}

pub(crate) fn base_timestamp(policy: &GenerationPolicy) -> NaiveDateTime {
    policy.base_date.and_time(chrono::NaiveTime::MIN)
}

pub(crate) fn temporal_value(shape: TemporalShape, at: NaiveDateTime) -> Value {
    match shape {
        TemporalShape::Timestamp => Value::Timestamp(at),
        TemporalShape::Date | TemporalShape::BirthDate => Value::Date(at.date()),
    }
}

pub(crate) fn offset_seconds(at: NaiveDateTime, seconds: i64) -> NaiveDateTime {
    at.checked_add_signed(Duration::seconds(seconds))
        .unwrap_or(at)
}
