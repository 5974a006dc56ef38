use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rand::seq::index;
use rand::{Rng, RngCore};
use tracing::debug;

use fixtura_core::{
    DependencyGraph, DependencySummary, Error, ModelSpec, RelationshipKind, RelationshipSpec,
    SchemaCatalog, Value,
};

use crate::errors::GenerationError;
use crate::instance::{GeneratedBatch, GeneratedInstance, InstanceKey};
use crate::seed::{derive_subseed, rng_for};
use crate::strategies::Strategy;
use crate::synth::SeenValues;

/// Dependency-ordered view of one generation call.
#[derive(Debug, Clone)]
pub struct ResolutionPlan<'c> {
    /// Requested models plus every model they transitively require, dependencies first.
    pub order: Vec<&'c ModelSpec>,
    requested: BTreeSet<String>,
    pub summary: DependencySummary,
}

impl<'c> ResolutionPlan<'c> {
    pub fn is_requested(&self, model: &str) -> bool {
        self.requested.contains(model)
    }

    /// Requested models in dependency order.
    pub fn requested(&self) -> impl Iterator<Item = &'c ModelSpec> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|model| self.requested.contains(&model.name))
    }

    pub fn model(&self, name: &str) -> Option<&'c ModelSpec> {
        self.order.iter().copied().find(|model| model.name == name)
    }
}

/// Order the requested models and the closure of their required targets.
///
/// The closure also covers to-many targets a requested model may have to
/// synthesize. Targets are looked up in `catalog`; a missing one is an
/// unknown model. A cycle of required relationships fails before any value
/// is synthesized.
pub fn plan<'c>(
    catalog: &'c SchemaCatalog,
    requested: &[&'c ModelSpec],
) -> Result<ResolutionPlan<'c>, GenerationError> {
    let requested_names: BTreeSet<&str> =
        requested.iter().map(|model| model.name.as_str()).collect();
    let mut closure: BTreeMap<&str, &'c ModelSpec> = BTreeMap::new();
    let mut queue: VecDeque<&'c ModelSpec> = requested.iter().copied().collect();
    while let Some(model) = queue.pop_front() {
        if closure.insert(model.name.as_str(), model).is_some() {
            continue;
        }
        // Requested instances may need fresh to-many targets.
        let synthesizable = model
            .relationships
            .iter()
            .filter(|rel| rel.kind == RelationshipKind::ToMany && !rel.pool_only)
            .filter(|_| requested_names.contains(model.name.as_str()))
            .map(|rel| rel.target.as_str());
        for target in model.required_targets().chain(synthesizable) {
            if closure.contains_key(target) {
                continue;
            }
            let spec = catalog
                .model(target)
                .ok_or_else(|| Error::UnknownModel(target.to_string()))?;
            queue.push_back(spec);
        }
    }

    let graph = DependencyGraph::from_models(closure.values().copied());
    let summary = graph.summary();
    let order = graph
        .topological_order()?
        .iter()
        .filter_map(|name| closure.get(name.as_str()).copied())
        .collect();

    Ok(ResolutionPlan {
        order,
        requested: requested.iter().map(|model| model.name.clone()).collect(),
        summary,
    })
}

/// Where a required link should point.
#[derive(Debug, Clone, PartialEq)]
pub enum RequiredTarget {
    /// An existing or already materialized instance.
    Existing(InstanceKey),
    /// A new dependency instance has to be synthesized.
    Synthesize,
}

/// What a to-many link should hold.
#[derive(Debug, Clone, PartialEq)]
pub enum ManyTargets {
    Pick(Vec<InstanceKey>),
    Synthesize(u32),
}

/// Chooses link targets from caller-supplied and materialized pools.
///
/// Every choice is drawn from an RNG seeded by the owner's coordinate, so
/// link targets are reproducible under a fixed session seed.
pub struct Resolver<'s> {
    seed: u64,
    strategy: &'static dyn Strategy,
    to_many_max: u32,
    existing: &'s BTreeMap<String, Vec<GeneratedInstance>>,
    shared: BTreeMap<String, InstanceKey>,
}

impl<'s> Resolver<'s> {
    pub fn new(
        seed: u64,
        strategy: &'static dyn Strategy,
        to_many_max: u32,
        existing: &'s BTreeMap<String, Vec<GeneratedInstance>>,
    ) -> Self {
        Self {
            seed,
            strategy,
            to_many_max,
            existing,
            shared: BTreeMap::new(),
        }
    }

    fn link_rng(&self, owner: &InstanceKey, rel: &RelationshipSpec) -> impl RngCore {
        rng_for(derive_subseed(
            self.seed,
            &owner.model,
            &format!("@link:{}", rel.name),
            owner.ordinal,
        ))
    }

    fn existing_keys(&self, model: &str) -> impl Iterator<Item = &InstanceKey> {
        self.existing
            .get(model)
            .into_iter()
            .flatten()
            .map(|instance| &instance.key)
    }

    /// Whether `key` names an instance the caller supplied or this call created.
    pub fn knows(&self, key: &InstanceKey, batch: &GeneratedBatch) -> bool {
        batch.contains(key) || self.existing_keys(&key.model).any(|known| known == key)
    }

    /// Lowest unused ordinal for `model`, after any caller-supplied instances.
    pub fn first_ordinal(&self, model: &str) -> u64 {
        self.existing_keys(model)
            .map(|key| key.ordinal + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pick the target of a required to-one link.
    ///
    /// Caller-supplied instances come first, then instances of a requested
    /// target model. Targets outside the request get a fresh instance per
    /// link, or one shared instance when the flavor reuses dependencies.
    /// `taken` filters out targets already used by a unique bound field.
    pub fn required_target(
        &self,
        owner: &InstanceKey,
        rel: &RelationshipSpec,
        target_requested: bool,
        batch: &GeneratedBatch,
        taken: Option<&SeenValues>,
    ) -> Result<RequiredTarget, GenerationError> {
        let free = |key: &&InstanceKey| {
            taken.is_none_or(|seen| !seen.contains(&Value::Text(key.to_string())))
        };

        let mut pool: Vec<&InstanceKey> = self.existing_keys(&rel.target).filter(free).collect();
        if pool.is_empty() && target_requested {
            pool = batch
                .instances_of(&rel.target)
                .map(|instance| &instance.key)
                .filter(free)
                .collect();
            if pool.is_empty() {
                return Err(GenerationError::unsatisfiable(
                    &owner.model,
                    &rel.name,
                    owner.ordinal + 1,
                    format!("no unused {} instance is left to link", rel.target),
                ));
            }
        }

        if !pool.is_empty() {
            let mut rng = self.link_rng(owner, rel);
            let chosen = pool[rng.random_range(0..pool.len())].clone();
            return Ok(RequiredTarget::Existing(chosen));
        }

        if self.strategy.shares_dependencies()
            && let Some(shared) = self.shared.get(&rel.target)
            && free(&shared)
        {
            return Ok(RequiredTarget::Existing(shared.clone()));
        }

        debug!(model = %owner.model, relationship = %rel.name, target = %rel.target, "synthesizing dependency");
        Ok(RequiredTarget::Synthesize)
    }

    /// Remember a synthesized dependency so sharing flavors can reuse it.
    pub fn record_synthesized(&mut self, key: &InstanceKey) {
        if self.strategy.shares_dependencies() {
            self.shared
                .entry(key.model.clone())
                .or_insert_with(|| key.clone());
        }
    }

    fn soft_pool<'b>(
        &'b self,
        owner: &InstanceKey,
        rel: &RelationshipSpec,
        batch: &'b GeneratedBatch,
    ) -> Vec<&'b InstanceKey> {
        self.existing_keys(&rel.target)
            .chain(batch.instances_of(&rel.target).map(|instance| &instance.key))
            .filter(|key| *key != owner)
            .collect()
    }

    /// Target of an optional to-one link, or none.
    pub fn optional_target(
        &self,
        owner: &InstanceKey,
        rel: &RelationshipSpec,
        batch: &GeneratedBatch,
    ) -> Option<InstanceKey> {
        let pool = self.soft_pool(owner, rel, batch);
        if pool.is_empty() {
            return None;
        }
        let mut rng = self.link_rng(owner, rel);
        let probability = self.strategy.optional_link_probability().clamp(0.0, 1.0);
        if !rng.random_bool(probability) {
            return None;
        }
        Some(pool[rng.random_range(0..pool.len())].clone())
    }

    /// Distinct targets of a to-many link.
    ///
    /// Draws a size from the flavor's range, then samples that many distinct
    /// instances from the pool. An empty pool asks for fresh targets unless
    /// the relationship is pool-only or its target was requested.
    pub fn many_targets(
        &self,
        owner: &InstanceKey,
        rel: &RelationshipSpec,
        target_requested: bool,
        batch: &GeneratedBatch,
    ) -> ManyTargets {
        let mut rng = self.link_rng(owner, rel);
        let (low, high) = self.strategy.to_many_range(self.to_many_max);
        let wanted = if high > low {
            rng.random_range(low..=high)
        } else {
            low
        };

        let pool = self.soft_pool(owner, rel, batch);
        if pool.is_empty() {
            if rel.pool_only || target_requested || wanted == 0 {
                return ManyTargets::Pick(Vec::new());
            }
            return ManyTargets::Synthesize(wanted);
        }

        let amount = (wanted as usize).min(pool.len());
        let mut picked: Vec<usize> = index::sample(&mut rng, pool.len(), amount).into_vec();
        picked.sort_unstable();
        ManyTargets::Pick(picked.into_iter().map(|position| pool[position].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Flavor;
    use fixtura_core::{FieldCategory, FieldSpec};

    fn catalog() -> SchemaCatalog {
        let category = ModelSpec::new(
            "shop",
            "Category",
            vec![FieldSpec::new("name", FieldCategory::Text)],
            Vec::new(),
        )
        .expect("category");
        let supplier = ModelSpec::new(
            "shop",
            "Supplier",
            vec![FieldSpec::new("company", FieldCategory::Text)],
            Vec::new(),
        )
        .expect("supplier");
        let product = ModelSpec::new(
            "shop",
            "Product",
            vec![FieldSpec::new("title", FieldCategory::Text)],
            vec![
                RelationshipSpec::required("category", "Category"),
                RelationshipSpec::optional("supplier", "Supplier"),
                RelationshipSpec::to_many("tags", "Tag"),
            ],
        )
        .expect("product");
        let tag = ModelSpec::new(
            "shop",
            "Tag",
            vec![FieldSpec::new("label", FieldCategory::Text)],
            Vec::new(),
        )
        .expect("tag");
        SchemaCatalog::new(vec![category, supplier, product, tag]).expect("catalog")
    }

    #[test]
    fn plan_pulls_in_dependency_targets() {
        let catalog = catalog();
        let product = catalog.model("Product").expect("product");
        let plan = plan(&catalog, &[product]).expect("plan");
        let names: Vec<&str> = plan.order.iter().map(|model| model.name.as_str()).collect();
        assert_eq!(names, vec!["Category", "Product", "Tag"]);
        assert!(plan.model("Supplier").is_none());
        assert!(plan.is_requested("Product"));
        assert!(!plan.is_requested("Category"));
        assert_eq!(plan.requested().count(), 1);
    }

    #[test]
    fn plan_rejects_required_cycles() {
        let a = ModelSpec {
            name: "A".to_string(),
            app: String::new(),
            fields: vec![FieldSpec::new("x", FieldCategory::Text)],
            relationships: vec![RelationshipSpec::required("b", "B")],
        };
        let b = ModelSpec {
            name: "B".to_string(),
            app: String::new(),
            fields: vec![FieldSpec::new("y", FieldCategory::Text)],
            relationships: vec![RelationshipSpec::required("a", "A")],
        };
        let catalog = SchemaCatalog::new(vec![a, b]).expect("catalog");
        let requested = catalog.model("A").expect("A");
        let err = plan(&catalog, &[requested]).expect_err("cycle");
        assert!(matches!(
            err,
            GenerationError::Core(Error::CyclicRelationship { ref cycle }) if cycle.len() == 2
        ));
    }

    #[test]
    fn supplied_instances_are_preferred() {
        let catalog = catalog();
        let product = catalog.model("Product").expect("product");
        let rel = product.relationship("category").expect("rel");
        let mut existing = BTreeMap::new();
        existing.insert(
            "Category".to_string(),
            vec![GeneratedInstance::new(InstanceKey::new("Category", 7))],
        );
        let resolver = Resolver::new(1, Flavor::Realistic.strategy(), 3, &existing);
        let owner = InstanceKey::new("Product", 0);
        let target = resolver
            .required_target(&owner, rel, false, &GeneratedBatch::default(), None)
            .expect("target");
        assert_eq!(target, RequiredTarget::Existing(InstanceKey::new("Category", 7)));
        assert_eq!(resolver.first_ordinal("Category"), 8);
    }

    #[test]
    fn minimal_never_links_optional_targets() {
        let catalog = catalog();
        let product = catalog.model("Product").expect("product");
        let rel = product.relationship("supplier").expect("rel");
        let mut existing = BTreeMap::new();
        existing.insert(
            "Supplier".to_string(),
            vec![GeneratedInstance::new(InstanceKey::new("Supplier", 0))],
        );
        let resolver = Resolver::new(1, Flavor::Minimal.strategy(), 3, &existing);
        for ordinal in 0..20 {
            let owner = InstanceKey::new("Product", ordinal);
            assert_eq!(resolver.optional_target(&owner, rel, &GeneratedBatch::default()), None);
        }
    }

    #[test]
    fn to_many_targets_are_distinct() {
        let catalog = catalog();
        let product = catalog.model("Product").expect("product");
        let rel = product.relationship("tags").expect("rel");
        let mut existing = BTreeMap::new();
        existing.insert(
            "Tag".to_string(),
            (0..4)
                .map(|ordinal| GeneratedInstance::new(InstanceKey::new("Tag", ordinal)))
                .collect(),
        );
        let resolver = Resolver::new(5, Flavor::Creative.strategy(), 3, &existing);
        for ordinal in 0..20 {
            let owner = InstanceKey::new("Product", ordinal);
            match resolver.many_targets(&owner, rel, false, &GeneratedBatch::default()) {
                ManyTargets::Pick(keys) => {
                    assert!(!keys.is_empty());
                    let distinct: BTreeSet<_> = keys.iter().collect();
                    assert_eq!(distinct.len(), keys.len());
                }
                ManyTargets::Synthesize(_) => panic!("pool was not empty"),
            }
        }
    }
}
