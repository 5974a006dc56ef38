use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::{Rng, RngCore};
use tracing::debug;

use fixtura_core::{FieldSpec, Value};

use crate::errors::GenerationError;
use crate::locales::LocaleKey;
use crate::model::{Flavor, GenerationPolicy};
use crate::provider::ValueProvider;
use crate::seed::{attempt_seed, rng_for};
use crate::strategies::{SynthContext, round_to};

/// Values already produced for one unique field during a session.
#[derive(Debug, Clone, Default)]
pub struct SeenValues {
    keys: HashSet<String>,
}

impl SeenValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.keys.contains(&value.key())
    }

    /// Record `value`; returns false when it was already present. Nulls are never recorded.
    pub fn insert(&mut self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        self.keys.insert(value.key())
    }
}

/// Outcome of one synthesized value.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub value: Value,
    /// Collisions with earlier unique values before this one was accepted.
    pub retries: u32,
}

/// Produces constraint-respecting field values for one flavor and locale.
pub struct Synthesizer<'a> {
    provider: &'a dyn ValueProvider,
    policy: &'a GenerationPolicy,
    flavor: Flavor,
    locale: LocaleKey,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        provider: &'a dyn ValueProvider,
        policy: &'a GenerationPolicy,
        flavor: Flavor,
        locale: LocaleKey,
    ) -> Self {
        Self {
            provider,
            policy,
            flavor,
            locale,
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Draw a value for `field` from the coordinate `subseed`.
    ///
    /// Each attempt reseeds from `(subseed, attempt)`, so a retry never
    /// depends on what earlier attempts consumed. Unique fields retry on
    /// collision with `seen` up to `max_unique_attempts` times.
    pub fn synthesize(
        &self,
        model: &str,
        field: &FieldSpec,
        subseed: u64,
        seen: &mut SeenValues,
    ) -> Result<Synthesized, GenerationError> {
        let strategy = self.flavor.strategy();
        let attempts = if field.unique {
            self.policy.max_unique_attempts.max(1)
        } else {
            1
        };
        let null_probability = strategy
            .null_probability(self.policy.null_probability)
            .clamp(0.0, 1.0);

        for attempt in 0..attempts {
            let seed = attempt_seed(subseed, attempt);
            let mut rng = rng_for(seed);

            if field.nullable && rng.random_bool(null_probability) {
                return Ok(Synthesized {
                    value: Value::Null,
                    retries: attempt,
                });
            }

            let candidate = if strategy.defers_to_default(field)
                && let Some(default) = &field.default
            {
                repair(model, field, default.clone(), seen.len() as u64 + 1)?
            } else if !field.choices.is_empty() {
                field.choices[(seed % field.choices.len() as u64) as usize].clone()
            } else {
                let ctx = SynthContext {
                    model,
                    field,
                    locale: self.locale,
                    provider: self.provider,
                    policy: self.policy,
                    sequence: seen.len() as u64 + u64::from(attempt),
                };
                let raw = strategy.candidate(&ctx, &mut rng as &mut dyn RngCore);
                repair(model, field, raw, seen.len() as u64 + 1)?
            };

            if !field.unique || seen.insert(&candidate) {
                return Ok(Synthesized {
                    value: candidate,
                    retries: attempt,
                });
            }
            debug!(model, field = %field.name, attempt, "unique collision, retrying");
        }

        Err(GenerationError::unsatisfiable(
            model,
            &field.name,
            seen.len() as u64 + 1,
            format!("no unused unique value after {attempts} attempts"),
        ))
    }
}

/// Bring a raw candidate inside the field's declared limits.
///
/// Text is truncated by characters, numbers and temporals are clamped and
/// structured blobs drop keys until they fit. Limits that admit no value at
/// all are reported instead of ignored.
pub fn repair(
    model: &str,
    field: &FieldSpec,
    value: Value,
    count: u64,
) -> Result<Value, GenerationError> {
    let fail = |reason: &str| GenerationError::unsatisfiable(model, &field.name, count, reason);
    match value {
        Value::Text(text) => Ok(Value::Text(truncate(text, field.max_length))),
        Value::Uuid(text) => match field.max_length {
            Some(max) if text.chars().count() > max => Ok(Value::Text(truncate(text, Some(max)))),
            _ => Ok(Value::Uuid(text)),
        },
        Value::Int(number) => {
            let low = field.min.map(|min| min.ceil() as i64);
            let high = field.max.map(|max| max.floor() as i64);
            if let (Some(low), Some(high)) = (low, high)
                && low > high
            {
                return Err(fail("no integer lies within the declared bounds"));
            }
            let number = low.map_or(number, |low| number.max(low));
            Ok(Value::Int(high.map_or(number, |high| number.min(high))))
        }
        Value::Float(number) => Ok(Value::Float(clamp_float(field, number))),
        Value::Date(date) => {
            let (low, high) = temporal_bounds(field).map_err(fail)?;
            let low = low.map(|at| {
                if at.time() == NaiveTime::MIN {
                    at.date()
                } else {
                    at.date() + Duration::days(1)
                }
            });
            let high = high.map(|at| at.date());
            if let (Some(low), Some(high)) = (low, high)
                && low > high
            {
                return Err(fail("no calendar date lies within the declared bounds"));
            }
            Ok(Value::Date(clamp_ord::<NaiveDate>(date, low, high)))
        }
        Value::Timestamp(at) => {
            let (low, high) = temporal_bounds(field).map_err(fail)?;
            Ok(Value::Timestamp(clamp_ord(at, low, high)))
        }
        Value::Json(blob) => match field.max_length {
            Some(max) => shrink_blob(blob, max).ok_or_else(|| {
                fail("max_length is too small for any structured value")
            }),
            None => Ok(Value::Json(blob)),
        },
        other => Ok(other),
    }
}

fn truncate(text: String, max_length: Option<usize>) -> String {
    match max_length {
        Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
        _ => text,
    }
}

fn clamp_float(field: &FieldSpec, number: f64) -> f64 {
    let mut value = number;
    if let Some(min) = field.min {
        value = value.max(min);
    }
    if let Some(max) = field.max {
        value = value.min(max);
    }
    let Some(places) = field.decimal_places else {
        return value;
    };
    let factor = 10_f64.powi(places.min(12) as i32);
    let rounded = round_to(value, places);
    match (field.min, field.max) {
        (_, Some(max)) if rounded > max => (max * factor).floor() / factor,
        (Some(min), _) if rounded < min => (min * factor).ceil() / factor,
        _ => rounded,
    }
}

fn clamp_ord<T: Ord>(value: T, low: Option<T>, high: Option<T>) -> T {
    let value = match low {
        Some(low) if value < low => low,
        _ => value,
    };
    match high {
        Some(high) if value > high => high,
        _ => value,
    }
}

// Temporal bounds are Unix epoch seconds.
fn bound_datetime(seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() || seconds < i64::MIN as f64 || seconds >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0).map(|at| at.naive_utc())
}

type TemporalBounds = (Option<NaiveDateTime>, Option<NaiveDateTime>);

fn temporal_bounds(field: &FieldSpec) -> Result<TemporalBounds, &'static str> {
    let convert = |bound: Option<f64>| match bound {
        Some(seconds) => bound_datetime(seconds)
            .map(Some)
            .ok_or("declared temporal bound is not a representable timestamp"),
        None => Ok(None),
    };
    Ok((convert(field.min)?, convert(field.max)?))
}

fn shrink_blob(mut blob: serde_json::Value, max: usize) -> Option<Value> {
    let fits = |blob: &serde_json::Value| blob.to_string().chars().count() <= max;
    while !fits(&blob) {
        let shrunk = match &mut blob {
            serde_json::Value::Object(map) => {
                let last = map.keys().next_back().cloned();
                last.and_then(|key| map.remove(&key)).is_some()
            }
            serde_json::Value::Array(items) => items.pop().is_some(),
            _ => false,
        };
        if !shrunk {
            break;
        }
    }
    fits(&blob).then_some(Value::Json(blob))
}
