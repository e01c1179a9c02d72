use std::collections::BTreeSet;

use proptest::prelude::*;
use taskseq::DependencyValidator;
use taskseq::errors::DependencyErrorKind;
use taskseq::registry::TaskRegistry;
use taskseq_test_utils::{ProbeTask, registry};

/// Dependency lists for `n` tasks where task `i` only depends on tasks
/// `0..i`, so the graph is acyclic and `0..n` is a valid order.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        }
                    })
                    .collect()
            },
        )
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn build(deps: &[BTreeSet<usize>]) -> TaskRegistry {
    registry(
        deps.iter()
            .enumerate()
            .map(|(i, ds)| {
                let names: Vec<String> = ds.iter().map(|&d| name(d)).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                ProbeTask::new(&name(i)).after(&refs).boxed()
            })
            .collect(),
    )
}

proptest! {
    #[test]
    fn index_order_is_always_valid(deps in dag_strategy(10)) {
        let reg = build(&deps);
        let order: Vec<String> = (0..deps.len()).map(name).collect();
        prop_assert!(DependencyValidator::new().validate(&order, &reg).is_ok());
    }

    #[test]
    fn permutation_is_valid_iff_every_dependency_comes_first(
        (deps, perm) in dag_strategy(8).prop_flat_map(|deps| {
            let n = deps.len();
            (Just(deps), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        })
    ) {
        let reg = build(&deps);
        let mut position = vec![0; deps.len()];
        for (pos, &task) in perm.iter().enumerate() {
            position[task] = pos;
        }
        let expected_ok = deps
            .iter()
            .enumerate()
            .all(|(task, ds)| ds.iter().all(|&d| position[d] < position[task]));

        let order: Vec<String> = perm.iter().map(|&i| name(i)).collect();
        let outcome = DependencyValidator::new().validate(&order, &reg);

        prop_assert_eq!(outcome.is_ok(), expected_ok);
        if let Err(err) = outcome {
            prop_assert_eq!(err.kind, DependencyErrorKind::OutOfOrder);
        }
    }

    #[test]
    fn back_edge_is_reported_as_a_cycle(deps in dag_strategy(8)) {
        let n = deps.len();
        prop_assume!(n >= 2);

        // Close a loop between the first and last task.
        let mut deps = deps;
        deps[n - 1].insert(0);
        deps[0].insert(n - 1);
        let reg = build(&deps);

        let order: Vec<String> = (0..n).map(name).collect();
        let err = DependencyValidator::new().validate(&order, &reg).unwrap_err();
        prop_assert_eq!(err.kind, DependencyErrorKind::CyclicDependency);
        prop_assert_eq!(err.related.first(), err.related.last());
    }
}
