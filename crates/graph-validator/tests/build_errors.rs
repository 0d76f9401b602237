//! Schema compilation: structural errors, adapters, shared artifacts and
//! build modes.

mod common;

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use nebula_graph_validator::prelude::*;
use pretty_assertions::assert_eq;
use regex::Regex;
use rstest::rstest;

use common::{Item, Link, MisannotatedSlot, Slot, Twins, accept_all};

// ============================================================================
// STRUCTURAL ERRORS
// ============================================================================

#[test]
fn build_without_roots_fails() {
    let err = ValidatorBuilder::new()
        .constraint_factory(accept_all)
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::NoRootTypes));
    assert_eq!(err.id(), "NoTypes");
}

#[test]
fn descent_alone_is_not_enough() {
    let err = ValidatorBuilder::new()
        .root::<Link>()
        .descend_into::<Link>()
        .build()
        .unwrap_err();
    assert_eq!(err.id(), "NoConstraintsFound");
}

#[test]
fn pattern_on_integer_names_type_and_property() {
    let err = ValidatorBuilder::new()
        .root::<MisannotatedSlot>()
        .pattern_annotations()
        .build()
        .unwrap_err();

    match &err {
        BuildError::UnsupportedTypeForConstraint {
            type_name,
            property,
            declared,
            constraint,
            ..
        } => {
            assert!(type_name.ends_with("MisannotatedSlot"));
            assert_eq!(property, "id");
            assert_eq!(*declared, "i32");
            assert_eq!(constraint, "Pattern");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("MisannotatedSlot.id"));
}

#[test]
fn invalid_pattern_is_a_build_error() {
    struct Broken {
        value: String,
    }

    impl Reflect for Broken {
        fn properties() -> Vec<PropertyInfo> {
            vec![
                PropertyInfo::readable::<Self, String>("value", |b| Value::item(b.value.clone()))
                    .with_annotation(Pattern::new("(unclosed")),
            ]
        }
    }

    let err = ValidatorBuilder::new()
        .root::<Broken>()
        .pattern_annotations()
        .build()
        .unwrap_err();
    assert_eq!(err.id(), "InvalidConstraint");
    assert!(err.to_string().contains("Broken.value"));
}

// ============================================================================
// ADAPTERS
// ============================================================================

#[test]
fn mapper_feeds_converted_value() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&received);

    let validator = ValidatorBuilder::new()
        .root::<Slot>()
        .type_mapper::<i32, String>(|i| format!("fixed-{i}"))
        .typed_constraint_factory::<String, _>(move |_| {
            let recorder = Arc::clone(&recorder);
            let check: ConstraintRef = Arc::new(DelegateConstraint::typed::<String>(
                "Record",
                move |value, _| {
                    recorder.lock().unwrap().push(value.cloned());
                    Ok(())
                },
            ));
            Ok(Some(check))
        })
        .build()
        .unwrap();

    let report = validator.validate(&(Arc::new(Slot { id: 7 }) as Node)).unwrap();
    assert!(report.is_valid());
    assert_eq!(*received.lock().unwrap(), vec![Some("fixed-7".to_owned())]);
}

#[test]
fn collection_expansion_reports_each_element() {
    struct Labels {
        values: Vec<String>,
    }

    impl Reflect for Labels {
        fn properties() -> Vec<PropertyInfo> {
            vec![
                PropertyInfo::readable::<Self, Vec<String>>("values", |l| {
                    Value::items(l.values.clone())
                })
                .with_annotation(Pattern::new("^[a-z]+$")),
            ]
        }
    }

    let validator = ValidatorBuilder::new()
        .root::<Labels>()
        .pattern_annotations()
        .build()
        .unwrap();

    let labels: Node = Arc::new(Labels {
        values: vec!["ok".into(), "NO".into(), "fine".into(), "Bad".into()],
    });
    let report = validator.validate(&labels).unwrap();

    let found: Vec<_> = report
        .violations()
        .iter()
        .map(|v| (v.index, v.value.as_str().map(str::to_owned)))
        .collect();
    assert_eq!(
        found,
        vec![
            (Some(1), Some("NO".to_owned())),
            (Some(3), Some("Bad".to_owned())),
        ]
    );
    assert!(report.violations()[0].path().ends_with("Labels.values[1]"));
}

struct Bag {
    ports: Vec<i32>,
}

impl Reflect for Bag {
    fn properties() -> Vec<PropertyInfo> {
        vec![PropertyInfo::readable::<Self, Vec<i32>>("ports", |b| {
            Value::items(b.ports.clone())
        })]
    }
}

fn non_empty_string(_: &FactoryContext<'_>) -> Result<Option<ConstraintRef>, FactoryError> {
    let check: ConstraintRef = Arc::new(DelegateConstraint::typed::<String>(
        "NonEmpty",
        |value, _| match value {
            Some(s) if !s.is_empty() => Ok(()),
            _ => Err(ValidationError::new("NonEmpty", "must not be empty")),
        },
    ));
    Ok(Some(check))
}

#[test]
fn mapper_from_a_collection_type_does_not_fit() {
    let err = ValidatorBuilder::new()
        .root::<Bag>()
        .type_mapper::<Vec<i32>, String>(|ports| format!("{ports:?}"))
        .constraint_factory(non_empty_string)
        .build()
        .unwrap_err();

    assert_eq!(err.id(), "UnsupportedTypeForConstraint");
    assert!(err.to_string().contains("Bag.ports"));
}

#[test]
fn typed_factory_skips_collection_mapped_property() {
    let err = ValidatorBuilder::new()
        .root::<Bag>()
        .type_mapper::<Vec<i32>, String>(|ports| format!("{ports:?}"))
        .typed_constraint_factory::<String, _>(non_empty_string)
        .build()
        .unwrap_err();
    assert_eq!(err.id(), "NoConstraintsFound");
}

#[test]
fn element_mapper_converts_each_collection_item() {
    let validator = ValidatorBuilder::new()
        .root::<Bag>()
        .type_mapper::<i32, String>(|port| if *port > 0 { port.to_string() } else { String::new() })
        .typed_constraint_factory::<String, _>(non_empty_string)
        .build()
        .unwrap();

    let bag: Node = Arc::new(Bag {
        ports: vec![80, 0, 443],
    });
    let report = validator.validate(&bag).unwrap();

    assert_eq!(report.violation_count(), 1);
    assert_eq!(report.violations()[0].index, Some(1));
}

// ============================================================================
// SHARED ARTIFACTS
// ============================================================================

#[test]
fn identical_patterns_share_one_compiled_instance() {
    let validator = ValidatorBuilder::new()
        .root::<Twins>()
        .pattern_annotations()
        .build()
        .unwrap();

    let twins = validator.descriptor_of::<Twins>().unwrap();
    let regex_of = |name: &str| -> Arc<Regex> {
        let constraint = &twins.property(name).unwrap().constraints()[0];
        let context = constraint.context().unwrap();
        Arc::clone(context.downcast_ref::<Arc<Regex>>().unwrap())
    };

    assert!(Arc::ptr_eq(&regex_of("left"), &regex_of("right")));
}

// ============================================================================
// BUILD MODES
// ============================================================================

fn known_types(options: BuildOptions) -> BTreeSet<&'static str> {
    ValidatorBuilder::new()
        .roots([TypeRef::of::<Item>(), TypeRef::of::<Link>()])
        .descend_into::<Item>()
        .descend_into::<Link>()
        .pattern_annotations()
        .with_options(options)
        .build()
        .unwrap()
        .known_types()
        .map(|ty| ty.name())
        .collect()
}

#[rstest]
#[case::locked(BuildOptions { mode: BuildMode::Locked })]
#[case::one_worker(BuildOptions::parallel(NonZeroUsize::MIN))]
#[case::four_workers(BuildOptions::parallel(NonZeroUsize::new(4).unwrap()))]
fn build_modes_agree(#[case] options: BuildOptions) {
    assert_eq!(known_types(options), known_types(BuildOptions::default()));
}

#[test]
fn options_load_from_json() {
    common::init_tracing();
    let options: BuildOptions =
        serde_json::from_str(r#"{ "mode": { "strategy": "parallel", "workers": 2 } }"#).unwrap();
    let validator = ValidatorBuilder::new()
        .root::<Item>()
        .descend_into::<Item>()
        .pattern_annotations()
        .build_with(&options, None)
        .unwrap();
    assert_eq!(validator.len(), 1);

    let traversal: TraversalOptions = serde_json::from_str(r#"{ "max_concurrency": 3 }"#).unwrap();
    let mut ctx = ValidationContext::new();
    ctx.apply_options(&traversal).unwrap();
    assert_eq!(ctx.max_concurrency().get(), 3);
}
