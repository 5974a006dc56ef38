use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use fixtura_core::{Error, ModelSpec, RelationshipKind, SchemaCatalog};

use crate::assembler::{Assembler, SeenSets};
use crate::errors::GenerationError;
use crate::instance::{GeneratedBatch, GeneratedInstance, InstanceKey, Link};
use crate::locales::LocaleKey;
use crate::model::{GenerationPolicy, GenerationReport, SessionConfig};
use crate::overrides::{Overrides, ScopedOverrides};
use crate::persist::{PersistedHandle, PersistenceAdapter, persist_batch};
use crate::provider::{FakeValueProvider, ValueProvider};
use crate::resolver::{self, ManyTargets, RequiredTarget, ResolutionPlan, Resolver};
use crate::seed::entropy_seed;
use crate::synth::Synthesizer;

/// Everything one generation call produced.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub batch: GeneratedBatch,
    pub report: GenerationReport,
    /// Whether the caller asked for the batch to be persisted.
    pub persist: bool,
}

impl GenerationOutcome {
    pub fn instances_of(&self, model: &str) -> Vec<GeneratedInstance> {
        self.batch.instances_of(model).cloned().collect()
    }

    /// Instances of the requested models, grouped by model.
    pub fn requested_instances(&self) -> BTreeMap<String, Vec<GeneratedInstance>> {
        self.batch
            .requested()
            .iter()
            .map(|model| (model.clone(), self.instances_of(model)))
            .collect()
    }
}

/// Seed, flavor, locale, overrides and caller-supplied pools for generation calls.
///
/// The seed is fixed when the session is created: an explicit seed makes
/// every call reproducible, otherwise one entropy draw is reused for all
/// calls of this session. Uniqueness state lives only for one call.
pub struct GenerationSession {
    config: SessionConfig,
    policy: GenerationPolicy,
    seed: u64,
    locale: LocaleKey,
    overrides: Overrides,
    existing: BTreeMap<String, Vec<GeneratedInstance>>,
    provider: Box<dyn ValueProvider>,
}

impl GenerationSession {
    pub fn new(config: SessionConfig) -> Self {
        let seed = config.seed.unwrap_or_else(entropy_seed);
        let locale = LocaleKey::parse_or_default(&config.locale);
        Self {
            config,
            policy: GenerationPolicy::default(),
            seed,
            locale,
            overrides: Overrides::default(),
            existing: BTreeMap::new(),
            provider: Box::new(FakeValueProvider),
        }
    }

    pub fn with_policy(mut self, policy: GenerationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Supply already-built instances of `model` to link to before synthesizing new ones.
    pub fn with_existing(
        mut self,
        model: impl Into<String>,
        instances: impl IntoIterator<Item = GeneratedInstance>,
    ) -> Self {
        self.existing
            .entry(model.into())
            .or_default()
            .extend(instances);
        self
    }

    pub fn with_provider(mut self, provider: Box<dyn ValueProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    pub fn locale(&self) -> LocaleKey {
        self.locale
    }

    /// Generate `count` instances of one model plus the dependencies they need.
    pub fn generate(
        &self,
        catalog: &SchemaCatalog,
        model: &ModelSpec,
        count: u64,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.run(catalog, vec![model], count)
    }

    /// Generate `count` instances of every model in `app` (or the whole
    /// catalog) except the excluded ones.
    ///
    /// Excluded models still get instances when another model requires them.
    pub fn generate_for_all(
        &self,
        catalog: &SchemaCatalog,
        app: Option<&str>,
        count: u64,
        exclude: &[String],
    ) -> Result<GenerationOutcome, GenerationError> {
        let mut excluded = Vec::with_capacity(exclude.len());
        for path in exclude {
            excluded.push(catalog.resolve_model_by_path(path)?.name.as_str());
        }
        if let Some(app) = app
            && !catalog.apps().contains(&app)
        {
            return Err(Error::UnknownModel(format!("{app}.*")).into());
        }

        let selected: Vec<&ModelSpec> = catalog
            .models
            .iter()
            .filter(|model| app.is_none_or(|app| model.app == app))
            .filter(|model| !excluded.contains(&model.name.as_str()))
            .collect();
        self.run(catalog, selected, count)
    }

    /// Hand the batch to `adapter` in creation order when persistence was requested.
    pub async fn persist(
        &self,
        outcome: &GenerationOutcome,
        adapter: &mut dyn PersistenceAdapter,
    ) -> Result<Vec<PersistedHandle>, GenerationError> {
        if !outcome.persist {
            info!("persistence disabled, batch returned to caller only");
            return Ok(Vec::new());
        }
        let handles = persist_batch(&outcome.batch, adapter).await?;
        info!(adapter = adapter.name(), persisted = handles.len(), "batch persisted");
        Ok(handles)
    }

    fn run(
        &self,
        catalog: &SchemaCatalog,
        requested: Vec<&ModelSpec>,
        count: u64,
    ) -> Result<GenerationOutcome, GenerationError> {
        let flavor = self.config.flavor;
        info!(
            seed = self.seed,
            flavor = %flavor,
            locale = %self.locale,
            count,
            models = requested.len(),
            "generation started"
        );

        let plan = resolver::plan(catalog, &requested)?;
        self.check_existing(&plan)?;
        let requested_models: Vec<&ModelSpec> = plan.requested().collect();
        let scoped = self.overrides.scope(&requested_models)?;

        let mut report = GenerationReport::new(self.seed, flavor, self.locale.as_str(), count);
        if LocaleKey::parse(&self.config.locale).is_none() {
            report.record_warning(format!(
                "locale '{}' is not supported, using {}",
                self.config.locale, self.locale
            ));
        }
        for model in &requested_models {
            report.record_requested(&model.name, count);
        }
        let mut batch = GeneratedBatch::new(
            requested_models
                .iter()
                .map(|model| model.name.clone())
                .collect(),
        );

        if count == 0 {
            info!(models = requested_models.len(), "count is zero, nothing to generate");
            return Ok(GenerationOutcome {
                batch,
                report,
                persist: self.config.persist,
            });
        }
        check_unique_domains(&requested_models, count, &scoped)?;

        let synth = Synthesizer::new(self.provider.as_ref(), &self.policy, flavor, self.locale);
        let mut run = GenerationRun {
            catalog,
            plan: &plan,
            scoped: &scoped,
            resolver: Resolver::new(
                self.seed,
                flavor.strategy(),
                self.policy.to_many_max,
                &self.existing,
            ),
            assembler: Assembler::new(synth, self.seed, &scoped),
            batch: &mut batch,
            seen: SeenSets::new(),
            next_ordinal: BTreeMap::new(),
            report: &mut report,
        };

        for model in &requested_models {
            for _ in 0..count {
                run.materialize(model, false)?;
            }
            info!(model = %model.name, count, "model generated");
        }
        run.link_soft_relationships()?;

        info!(
            instances = batch.len(),
            retries = report.retries_total,
            seed = self.seed,
            "generation finished"
        );
        Ok(GenerationOutcome {
            batch,
            report,
            persist: self.config.persist,
        })
    }

    fn check_existing(&self, plan: &ResolutionPlan<'_>) -> Result<(), GenerationError> {
        for (model, instances) in &self.existing {
            if plan.model(model).is_none() {
                warn!(model = %model, "existing instances supplied for a model outside this call");
            }
            if let Some(stray) = instances.iter().find(|instance| instance.model_name() != model) {
                return Err(GenerationError::invalid_override(
                    model,
                    &stray.key.to_string(),
                    "supplied instance belongs to another model",
                ));
            }
        }
        Ok(())
    }
}

/// Fail fast when a unique field cannot take `count` distinct values.
fn check_unique_domains(
    models: &[&ModelSpec],
    count: u64,
    scoped: &ScopedOverrides,
) -> Result<(), GenerationError> {
    for model in models {
        for field in &model.fields {
            if !field.unique || field.nullable || scoped.covers(&model.name, &field.name) {
                continue;
            }
            if let Some(size) = field.domain_size()
                && size < count
            {
                return Err(GenerationError::unsatisfiable(
                    &model.name,
                    &field.name,
                    count,
                    format!("only {size} distinct values exist for {count} unique instances"),
                ));
            }
        }
    }
    Ok(())
}

/// Mutable state of one generation call.
struct GenerationRun<'r> {
    catalog: &'r SchemaCatalog,
    plan: &'r ResolutionPlan<'r>,
    scoped: &'r ScopedOverrides,
    resolver: Resolver<'r>,
    assembler: Assembler<'r>,
    batch: &'r mut GeneratedBatch,
    seen: SeenSets,
    next_ordinal: BTreeMap<String, u64>,
    report: &'r mut GenerationReport,
}

impl<'r> GenerationRun<'r> {
    fn spec(&self, name: &str) -> Result<&'r ModelSpec, GenerationError> {
        self.plan
            .model(name)
            .or_else(|| self.catalog.model(name))
            .ok_or_else(|| Error::UnknownModel(name.to_string()).into())
    }

    fn next_key(&mut self, model: &str) -> InstanceKey {
        let first = self.resolver.first_ordinal(model);
        let next = self.next_ordinal.entry(model.to_string()).or_insert(first);
        let key = InstanceKey::new(model, *next);
        *next += 1;
        key
    }

    fn check_known(&self, model: &str, name: &str, link: &Link) -> Result<(), GenerationError> {
        match link.targets().into_iter().find(|key| !self.resolver.knows(key, self.batch)) {
            Some(missing) => Err(GenerationError::invalid_override(
                model,
                name,
                format!("no instance {missing} is available to link"),
            )),
            None => Ok(()),
        }
    }

    /// Build one instance after its required dependencies exist.
    fn materialize(&mut self, model: &ModelSpec, auxiliary: bool) -> Result<InstanceKey, GenerationError> {
        let key = self.next_key(&model.name);
        let mut links = BTreeMap::new();

        for rel in &model.relationships {
            let link = match rel.kind {
                RelationshipKind::ToOneOptional => Link::One(None),
                RelationshipKind::ToMany => Link::Many(Vec::new()),
                RelationshipKind::ToOneRequired => {
                    if let Some(link) = self.scoped.link(&model.name, &rel.name) {
                        self.check_known(&model.name, &rel.name, link)?;
                        self.report.record_override(&model.name);
                        link.clone()
                    } else {
                        let taken = model
                            .fields
                            .iter()
                            .find(|field| {
                                field.unique
                                    && model
                                        .bound_relationship(field)
                                        .is_some_and(|bound| bound.name == rel.name)
                            })
                            .and_then(|field| {
                                self.seen.get(&(model.name.clone(), field.name.clone()))
                            });
                        let target = self.resolver.required_target(
                            &key,
                            rel,
                            self.plan.is_requested(&rel.target),
                            self.batch,
                            taken,
                        )?;
                        let target = match target {
                            RequiredTarget::Existing(target) => target,
                            RequiredTarget::Synthesize => {
                                let spec = self.spec(&rel.target)?;
                                let created = self.materialize(spec, true)?;
                                self.resolver.record_synthesized(&created);
                                created
                            }
                        };
                        Link::One(Some(target))
                    }
                }
            };
            self.report
                .record_links(&model.name, link.targets().len() as u64);
            links.insert(rel.name.clone(), link);
        }

        let instance =
            self.assembler
                .assemble(model, key.clone(), links, &mut self.seen, self.report)?;
        if auxiliary {
            debug!(model = %model.name, key = %key, "dependency instance created");
        }
        self.report.record_instance(&model.name, auxiliary);
        self.batch.push(instance);
        Ok(key)
    }

    /// Resolve optional and to-many links once every requested instance exists.
    fn link_soft_relationships(&mut self) -> Result<(), GenerationError> {
        let owners: Vec<InstanceKey> = self
            .batch
            .iter()
            .filter(|instance| self.plan.is_requested(instance.model_name()))
            .map(|instance| instance.key.clone())
            .collect();

        for owner in owners {
            let model = self.spec(&owner.model)?;
            let mut soft_links = Vec::new();
            for rel in model.relationships.iter().filter(|rel| !rel.is_required()) {
                let link = if let Some(link) = self.scoped.link(&model.name, &rel.name) {
                    self.check_known(&model.name, &rel.name, link)?;
                    self.report.record_override(&model.name);
                    link.clone()
                } else if rel.kind == RelationshipKind::ToOneOptional {
                    Link::One(self.resolver.optional_target(&owner, rel, self.batch))
                } else {
                    let target_requested = self.plan.is_requested(&rel.target);
                    match self.resolver.many_targets(&owner, rel, target_requested, self.batch) {
                        ManyTargets::Pick(targets) => Link::Many(targets),
                        ManyTargets::Synthesize(wanted) => {
                            let spec = self.spec(&rel.target)?;
                            let mut targets = Vec::with_capacity(wanted as usize);
                            for _ in 0..wanted {
                                targets.push(self.materialize(spec, true)?);
                            }
                            Link::Many(targets)
                        }
                    }
                };
                soft_links.push((rel.name.clone(), link));
            }

            if soft_links.is_empty() {
                continue;
            }
            let Some(instance) = self.batch.get_mut(&owner) else {
                continue;
            };
            for (name, link) in soft_links {
                self.report
                    .record_links(&owner.model, link.targets().len() as u64);
                instance.links.insert(name, link);
            }
            self.assembler
                .rebind_relational_fields(model, instance, &mut self.seen);
        }
        Ok(())
    }
}
