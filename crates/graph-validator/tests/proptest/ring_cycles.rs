//! Property tests: rings of any length terminate and visit each link once.

#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use nebula_graph_validator::identity;
use nebula_graph_validator::prelude::*;
use proptest::prelude::*;

use common::{Link, accept_all, ring};

fn validator() -> CompiledValidator {
    ValidatorBuilder::new()
        .root::<Link>()
        .descend_into::<Link>()
        .constraint_factory(accept_all)
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn ring_visits_every_link_exactly_once(len in 1usize..48, start in 0usize..48) {
        let links = ring(len);
        let root: Node = Arc::clone(&links[start % len]) as Node;

        let report = validator().validate(&root).unwrap();

        prop_assert_eq!(report.visited().len(), len);
        let unique: HashSet<usize> = report.visited().iter().map(identity).collect();
        prop_assert_eq!(unique.len(), len);
        prop_assert!(report.is_valid());
    }

    #[test]
    fn parallel_ring_matches_length(len in 1usize..48, workers in 1usize..6) {
        let links = ring(len);
        let root: Node = Arc::clone(&links[0]) as Node;
        let visits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&visits);

        let mut ctx = ValidationContext::new();
        ctx.set_max_concurrency(NonZeroUsize::new(workers).unwrap())
            .unwrap()
            .on_item_visited(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        validator().validate_parallel(&root, &ctx).unwrap();
        prop_assert_eq!(visits.load(Ordering::Relaxed), len);
    }

    #[test]
    fn invalid_labels_are_counted(valid in proptest::collection::vec(any::<bool>(), 1..32)) {
        let links: Vec<_> = valid
            .iter()
            .map(|&ok| Link::new(Some(if ok { "ok" } else { "NOT OK" })))
            .collect();
        for (i, link) in links.iter().enumerate() {
            link.point_to(&links[(i + 1) % links.len()]);
        }

        let validator = ValidatorBuilder::new()
            .root::<Link>()
            .descend_into::<Link>()
            .typed_constraint_factory::<String, _>(|ctx| {
                let compiled = PatternConstraint::compile("^[a-z]+$", ctx.cache())?;
                Ok(Some(Arc::new(compiled) as ConstraintRef))
            })
            .build()
            .unwrap();

        let report = validator.validate(&(Arc::clone(&links[0]) as Node)).unwrap();
        let expected = valid.iter().filter(|ok| !**ok).count();
        prop_assert_eq!(report.violation_count(), expected);
    }
}
