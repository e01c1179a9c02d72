// src/dag/validate.rs

use std::collections::HashMap;

use tracing::debug;

use crate::dag::DependencyGraph;
use crate::errors::{DependencyError, DependencyErrorKind};
use crate::registry::TaskRegistry;

/// Proves that a task order is a legal linearization of the declared
/// dependencies.
///
/// Checks run in this order and the first violation is returned:
///
/// 1. every name in the order is registered (`TaskNotFound`);
/// 2. no declared dependency reachable from the order forms a cycle
///    (`CyclicDependency`);
/// 3. no name appears twice in the order (`OutOfOrder`);
/// 4. every declared dependency is present in the order
///    (`MissingDependency`) and placed before its dependent (`OutOfOrder`).
///
/// Validation only reads the registry and the order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyValidator;

impl DependencyValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate<S: AsRef<str>>(
        &self,
        order: &[S],
        registry: &TaskRegistry,
    ) -> Result<(), DependencyError> {
        for name in order {
            let name = name.as_ref();
            if !registry.contains(name) {
                return Err(not_found(name));
            }
        }

        let graph = DependencyGraph::from_registry(order, registry);
        if let Some(cycle) = graph.find_cycle() {
            let path = cycle.join(" -> ");
            return Err(DependencyError::new(
                DependencyErrorKind::CyclicDependency,
                cycle[0].clone(),
                cycle,
                format!("dependency cycle detected: {path}"),
            ));
        }

        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (pos, name) in order.iter().enumerate() {
            let name = name.as_ref();
            if let Some(first) = positions.insert(name, pos) {
                return Err(DependencyError::new(
                    DependencyErrorKind::OutOfOrder,
                    name,
                    vec![name.to_string()],
                    format!("task '{name}' appears more than once in the order (positions {first} and {pos})"),
                ));
            }
        }

        for (pos, name) in order.iter().enumerate() {
            let name = name.as_ref();
            let task = registry.lookup(name).map_err(|_| not_found(name))?;
            let deps = task.depends_on();

            let missing: Vec<String> = deps
                .iter()
                .filter(|dep| !positions.contains_key(dep.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                let message = format!(
                    "task '{name}' depends on {}, which {} not in the order",
                    quoted(&missing),
                    if missing.len() == 1 { "is" } else { "are" }
                );
                return Err(DependencyError::new(
                    DependencyErrorKind::MissingDependency,
                    name,
                    missing,
                    message,
                ));
            }

            let late: Vec<String> = deps
                .iter()
                .filter(|dep| positions.get(dep.as_str()).is_some_and(|&p| p >= pos))
                .cloned()
                .collect();
            if !late.is_empty() {
                let message = format!(
                    "task '{name}' at position {pos} depends on {}, which must run before it",
                    quoted(&late)
                );
                return Err(DependencyError::new(
                    DependencyErrorKind::OutOfOrder,
                    name,
                    late,
                    message,
                ));
            }
        }

        debug!(tasks = order.len(), "task order validated");
        Ok(())
    }
}

fn not_found(name: &str) -> DependencyError {
    DependencyError::new(
        DependencyErrorKind::TaskNotFound,
        name,
        Vec::new(),
        format!("task '{name}' is not registered"),
    )
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskResult;
    use crate::task::{FnTask, Task};

    fn task(name: &str, deps: &[&str]) -> Box<dyn Task> {
        let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
        Box::new(FnTask::new(name, |_ctx| Ok(TaskResult::success())).after(deps))
    }

    fn registry() -> TaskRegistry {
        TaskRegistry::from_tasks([task("a", &[]), task("b", &["a"]), task("c", &["a", "b"])])
            .unwrap()
    }

    fn kind_of(order: &[&str], registry: &TaskRegistry) -> Option<DependencyErrorKind> {
        DependencyValidator::new()
            .validate(order, registry)
            .err()
            .map(|e| e.kind)
    }

    #[test]
    fn accepts_valid_linearization() {
        let registry = registry();
        assert_eq!(kind_of(&["a", "b", "c"], &registry), None);
        assert_eq!(kind_of(&["a"], &registry), None);
        assert_eq!(kind_of(&[], &registry), None);
    }

    #[test]
    fn rejects_unknown_task() {
        let err = DependencyValidator::new()
            .validate(&["a", "zzz"], &registry())
            .unwrap_err();
        assert_eq!(err.kind, DependencyErrorKind::TaskNotFound);
        assert_eq!(err.task, "zzz");
    }

    #[test]
    fn rejects_missing_dependency() {
        let err = DependencyValidator::new()
            .validate(&["b"], &registry())
            .unwrap_err();
        assert_eq!(err.kind, DependencyErrorKind::MissingDependency);
        assert_eq!(err.task, "b");
        assert_eq!(err.related, vec!["a".to_string()]);
    }

    #[test]
    fn rejects_dependency_after_dependent() {
        let err = DependencyValidator::new()
            .validate(&["b", "a"], &registry())
            .unwrap_err();
        assert_eq!(err.kind, DependencyErrorKind::OutOfOrder);
        assert_eq!(err.task, "b");
    }

    #[test]
    fn rejects_duplicates() {
        assert_eq!(
            kind_of(&["a", "a"], &registry()),
            Some(DependencyErrorKind::OutOfOrder)
        );
    }

    #[test]
    fn unregistered_dependency_is_missing() {
        let registry = TaskRegistry::from_tasks([task("a", &["ghost"])]).unwrap();
        assert_eq!(
            kind_of(&["a"], &registry),
            Some(DependencyErrorKind::MissingDependency)
        );
    }

    #[test]
    fn cycle_message_carries_path() {
        let registry =
            TaskRegistry::from_tasks([task("A", &["B"]), task("B", &["A"])]).unwrap();
        let err = DependencyValidator::new()
            .validate(&["A", "B"], &registry)
            .unwrap_err();
        assert_eq!(err.kind, DependencyErrorKind::CyclicDependency);
        assert!(err.message.contains("A -> B -> A"), "{}", err.message);
    }
}
