use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use fixtura_core::{
    Error, FieldCategory, FieldSpec, ModelSpec, RelationshipSpec, SchemaCatalog, Value,
    validate_catalog,
};
use fixtura_generate::{
    Flavor, GeneratedInstance, GenerationError, GenerationSession, InstanceKey, Link, Overrides,
    SessionConfig, generate, generate_for_all,
};

fn shop_catalog() -> SchemaCatalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/shop.catalog.json");
    let contents =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing catalog at {}", path.display()));
    let catalog: SchemaCatalog = serde_json::from_str(&contents).expect("parse catalog");
    validate_catalog(&catalog).expect("valid catalog");
    catalog
}

fn tiny_category_catalog() -> SchemaCatalog {
    let category = ModelSpec::new(
        "shop",
        "Category",
        vec![
            FieldSpec::new("name", FieldCategory::Text)
                .with_choices(["A", "B"])
                .unique(),
        ],
        Vec::new(),
    )
    .expect("category");
    let product = ModelSpec::new(
        "shop",
        "Product",
        vec![
            FieldSpec::new("title", FieldCategory::Text),
            FieldSpec::new("category_id", FieldCategory::Relational),
        ],
        vec![RelationshipSpec::required("category", "Category")],
    )
    .expect("product");
    SchemaCatalog::new(vec![category, product]).expect("catalog")
}

fn digest(instances: &impl serde::Serialize) -> String {
    let bytes = serde_json::to_vec(instances).expect("serialize");
    hex::encode(Sha256::digest(&bytes))
}

#[test]
fn seeded_runs_are_byte_identical() {
    let catalog = shop_catalog();
    for flavor in Flavor::ALL {
        let config = SessionConfig::seeded(42).with_flavor(flavor);
        let first = GenerationSession::new(config.clone())
            .generate_for_all(&catalog, Some("shop"), 5, &[])
            .expect("first run");
        let second = GenerationSession::new(config)
            .generate_for_all(&catalog, Some("shop"), 5, &[])
            .expect("second run");
        assert_eq!(digest(&first.batch), digest(&second.batch), "{flavor}");
    }
}

#[test]
fn different_seeds_give_different_batches() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    let a = generate(&catalog, product, 5, SessionConfig::seeded(1)).expect("seed 1");
    let b = generate(&catalog, product, 5, SessionConfig::seeded(2)).expect("seed 2");
    assert_ne!(digest(&a), digest(&b));
}

#[test]
fn seedless_sessions_repeat_within_the_session() {
    let catalog = shop_catalog();
    let author = catalog.model("Author").expect("author");
    let session = GenerationSession::new(SessionConfig::default());
    let first = session.generate(&catalog, author, 3).expect("first");
    let second = session.generate(&catalog, author, 3).expect("second");
    assert_eq!(first.report.seed, session.seed());
    assert_eq!(digest(&first.batch), digest(&second.batch));
}

#[test]
fn dependencies_are_created_before_dependents() {
    let catalog = shop_catalog();
    let review = catalog.model("Review").expect("review");
    let outcome = GenerationSession::new(SessionConfig::seeded(7))
        .generate(&catalog, review, 3)
        .expect("generate reviews");

    let position = |key: &InstanceKey| {
        outcome
            .batch
            .iter()
            .position(|instance| &instance.key == key)
            .expect("linked instance is in the batch")
    };
    for (index, instance) in outcome.batch.iter().enumerate() {
        let model = catalog.model(instance.model_name()).expect("model");
        for rel in model.relationships.iter().filter(|rel| rel.is_required()) {
            let link = instance.link(&rel.name).expect("required link");
            let targets = link.targets();
            assert_eq!(targets.len(), 1);
            assert!(position(targets[0]) < index);
        }
    }
    assert_eq!(outcome.batch.instances_of("Review").count(), 3);
    assert_eq!(outcome.report.models["Product"].auxiliary, 3);
    assert_eq!(outcome.report.models["Category"].auxiliary, 3);
}

#[test]
fn every_flavor_respects_declared_constraints() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    for flavor in Flavor::ALL {
        let products = generate(
            &catalog,
            product,
            20,
            SessionConfig::seeded(99).with_flavor(flavor),
        )
        .expect("generate products");
        assert_eq!(products.len(), 20);

        let mut skus = BTreeSet::new();
        let mut ids = BTreeSet::new();
        for instance in &products {
            let sku = instance.field("sku").expect("sku");
            assert!(sku.char_len() <= 12, "{flavor}: {sku}");
            assert!(skus.insert(sku.key()), "{flavor}: duplicate sku {sku}");
            assert!(ids.insert(instance.field("id").expect("id").key()));

            let price = instance.field("price").and_then(Value::as_f64).expect("price");
            assert!((0.5..=500.0).contains(&price), "{flavor}: price {price}");
            assert_eq!((price * 100.0).round() / 100.0, price);

            let stock = instance.field("stock").and_then(Value::as_i64).expect("integer stock");
            assert!((0..=1000).contains(&stock));

            let status = instance.field("status").expect("status").key();
            assert!(["draft", "active", "retired"].contains(&status.as_str()));

            for field in &product.fields {
                let value = instance.field(&field.name).expect("every field is set");
                if !field.nullable {
                    assert!(!value.is_null(), "{flavor}: {} is null", field.name);
                }
                if let Some(max) = field.max_length
                    && !value.is_null()
                {
                    assert!(value.char_len() <= max, "{flavor}: {} too long", field.name);
                }
            }
        }
    }
}

#[test]
fn unique_choices_that_run_out_are_unsatisfiable() {
    let catalog = tiny_category_catalog();
    let category = catalog.model("Category").expect("category");
    let err = GenerationSession::new(SessionConfig::seeded(5))
        .generate(&catalog, category, 3)
        .expect_err("two choices cannot fill three unique rows");
    assert_eq!(err.kind(), "constraint_unsatisfiable");
    assert!(matches!(
        err,
        GenerationError::ConstraintUnsatisfiable { ref model, ref field, count: 3, .. }
            if model == "Category" && field == "name"
    ));
}

#[test]
fn unique_serials_over_huge_ranges_generate() {
    let ticket = ModelSpec::new(
        "shop",
        "Ticket",
        vec![
            FieldSpec::new("serial", FieldCategory::Numeric)
                .with_range(Some(0.0), Some(1e20))
                .unique(),
        ],
        Vec::new(),
    )
    .expect("ticket");
    let catalog = SchemaCatalog::new(vec![ticket]).expect("catalog");
    validate_catalog(&catalog).expect("valid catalog");
    let model = catalog.model("Ticket").expect("ticket");
    for flavor in Flavor::ALL {
        let outcome = GenerationSession::new(SessionConfig::seeded(11).with_flavor(flavor))
            .generate(&catalog, model, 2)
            .unwrap_or_else(|err| panic!("{flavor}: {err}"));
        let serials: BTreeSet<String> = outcome
            .batch
            .iter()
            .map(|instance| instance.fields["serial"].key())
            .collect();
        assert_eq!(serials.len(), 2, "{flavor}");
    }
}

#[test]
fn fresh_dependencies_hit_the_same_limit_but_minimal_shares_one() {
    let catalog = tiny_category_catalog();
    let product = catalog.model("Product").expect("product");

    let err = GenerationSession::new(SessionConfig::seeded(5))
        .generate(&catalog, product, 3)
        .expect_err("a third distinct category does not exist");
    assert!(matches!(
        err,
        GenerationError::ConstraintUnsatisfiable { ref model, .. } if model == "Category"
    ));

    let outcome = GenerationSession::new(SessionConfig::seeded(5).with_flavor(Flavor::Minimal))
        .generate(&catalog, product, 3)
        .expect("minimal reuses one category");
    assert_eq!(outcome.batch.instances_of("Category").count(), 1);
    let category_ids: BTreeSet<String> = outcome
        .batch
        .instances_of("Product")
        .map(|instance| instance.field("category_id").expect("category_id").key())
        .collect();
    assert_eq!(category_ids.len(), 1);
}

#[test]
fn overrides_win_over_constraints() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    let outcome = GenerationSession::new(SessionConfig::seeded(3))
        .with_overrides(Overrides::new().with("price", 999.0).with("title", "Fixed"))
        .generate(&catalog, product, 4)
        .expect("generate");
    for instance in outcome.batch.instances_of("Product") {
        assert_eq!(instance.field("price"), Some(&Value::Float(999.0)));
        assert_eq!(instance.field("title"), Some(&Value::from("Fixed")));
    }
    assert_eq!(outcome.report.models["Product"].overrides_applied, 8);
}

#[test]
fn unknown_override_keys_fail_before_synthesis() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    let err = GenerationSession::new(SessionConfig::seeded(3))
        .with_overrides(Overrides::new().with("colour", "red"))
        .generate(&catalog, product, 0)
        .expect_err("unknown key");
    assert_eq!(err.kind(), "invalid_override");
}

#[test]
fn count_zero_plans_but_returns_nothing() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    let outcome = GenerationSession::new(SessionConfig::seeded(3))
        .generate(&catalog, product, 0)
        .expect("empty");
    assert!(outcome.batch.is_empty());
    assert_eq!(outcome.report.models["Product"].requested, 0);

    let tiny = tiny_category_catalog();
    let category = tiny.model("Category").expect("category");
    let empty = GenerationSession::new(SessionConfig::seeded(3))
        .generate(&tiny, category, 0)
        .expect("nothing to make unique");
    assert!(empty.batch.is_empty());

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
    let cyclic = SchemaCatalog::new(vec![a, b]).expect("catalog");
    let requested = cyclic.model("A").expect("A");
    let err = GenerationSession::new(SessionConfig::seeded(3))
        .generate(&cyclic, requested, 0)
        .expect_err("cycle");
    assert!(matches!(
        err,
        GenerationError::Core(Error::CyclicRelationship { ref cycle })
            if cycle.contains(&"A".to_string()) && cycle.contains(&"B".to_string())
    ));
}

#[test]
fn supplied_instances_are_linked_instead_of_synthesized() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    let mut garden = GeneratedInstance::new(InstanceKey::new("Category", 0));
    garden.fields.insert("name".to_string(), Value::from("Garden"));

    let outcome = GenerationSession::new(SessionConfig::seeded(11))
        .with_existing("Category", [garden])
        .generate(&catalog, product, 4)
        .expect("generate");
    assert_eq!(outcome.batch.instances_of("Category").count(), 0);
    for instance in outcome.batch.instances_of("Product") {
        assert_eq!(
            instance.link("category"),
            Some(&Link::One(Some(InstanceKey::new("Category", 0))))
        );
        assert_eq!(instance.field("category_id"), Some(&Value::from("Category#0")));
    }
}

#[test]
fn relationship_overrides_must_name_known_instances() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    let err = GenerationSession::new(SessionConfig::seeded(11))
        .with_overrides(Overrides::new().with("category", "Category#9"))
        .generate(&catalog, product, 2)
        .expect_err("nothing named Category#9");
    assert_eq!(err.kind(), "invalid_override");

    let outcome = GenerationSession::new(SessionConfig::seeded(11))
        .with_existing("Category", [GeneratedInstance::new(InstanceKey::new("Category", 9))])
        .with_overrides(Overrides::new().with("category", "Category#9").with("supplier", Value::Null))
        .generate(&catalog, product, 2)
        .expect("known key");
    for instance in outcome.batch.instances_of("Product") {
        assert_eq!(instance.field("category_id"), Some(&Value::from("Category#9")));
        assert_eq!(instance.link("supplier"), Some(&Link::One(None)));
        assert!(instance.field("supplier_id").is_some_and(Value::is_null));
    }
}

#[test]
fn excluded_models_still_back_required_links() {
    let catalog = shop_catalog();
    let grouped = generate_for_all(&catalog, 2, &["Category".to_string()], SessionConfig::seeded(4))
        .expect("generate all");
    assert!(!grouped.contains_key("Category"));
    assert_eq!(grouped["Product"].len(), 2);
    assert_eq!(grouped["Post"].len(), 2);

    let outcome = GenerationSession::new(SessionConfig::seeded(4))
        .generate_for_all(&catalog, Some("shop"), 2, &["Category".to_string()])
        .expect("generate shop");
    assert_eq!(outcome.report.models["Category"].auxiliary, 2);
    assert!(!outcome.batch.is_requested("Category"));

    let err = GenerationSession::new(SessionConfig::seeded(4))
        .generate_for_all(&catalog, None, 2, &["Warehouse".to_string()])
        .expect_err("unknown exclusion");
    assert_eq!(err.kind(), "unknown_model");
}

#[test]
fn to_many_links_are_distinct_and_pool_only_stays_in_pool() {
    let catalog = shop_catalog();
    let product = catalog.model("Product").expect("product");
    let outcome = GenerationSession::new(SessionConfig::seeded(21).with_flavor(Flavor::Creative))
        .generate(&catalog, product, 6)
        .expect("generate");
    for instance in outcome.batch.instances_of("Product") {
        let tags = instance.link("tags").expect("tags").targets();
        assert!(!tags.is_empty());
        let distinct: BTreeSet<_> = tags.iter().collect();
        assert_eq!(distinct.len(), tags.len());
        assert!(tags.iter().all(|key| outcome.batch.contains(key)));
    }

    let post = catalog.model("Post").expect("post");
    let single = GenerationSession::new(SessionConfig::seeded(21).with_flavor(Flavor::Creative))
        .generate(&catalog, post, 1)
        .expect("generate post");
    let only = single.batch.instances_of("Post").next().expect("post");
    assert_eq!(only.link("related"), Some(&Link::Many(Vec::new())));
    assert_eq!(single.batch.instances_of("Post").count(), 1);
}

#[test]
fn minimal_leaves_optional_links_empty() {
    let catalog = shop_catalog();
    let review = catalog.model("Review").expect("review");
    let customer = catalog.model("Customer").expect("customer");
    let outcome = GenerationSession::new(SessionConfig::seeded(8).with_flavor(Flavor::Minimal))
        .generate_for_all(&catalog, Some("shop"), 3, &[])
        .expect("generate");
    for instance in outcome.batch.instances_of(&review.name) {
        assert_eq!(instance.link("customer"), Some(&Link::One(None)));
    }
    for instance in outcome.batch.instances_of(&customer.name) {
        assert_eq!(instance.field("loyalty_points"), Some(&Value::Int(0)));
    }
}
