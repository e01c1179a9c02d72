// src/dag/graph.rs

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;

use crate::engine::TaskName;
use crate::registry::TaskRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Declared dependencies reachable from a set of root tasks.
///
/// Edge direction follows the declarations: for a task `B` declaring
/// `depends_on = ["A"]` there is an edge `B -> A`. Only registered tasks are
/// expanded; unknown dependency names become leaf nodes.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<TaskName>,
    index: HashMap<TaskName, usize>,
    graph: DiGraphMap<usize, ()>,
}

impl DependencyGraph {
    pub fn from_registry<S: AsRef<str>>(roots: &[S], registry: &TaskRegistry) -> Self {
        let mut graph = Self::default();
        let mut queue: VecDeque<usize> = roots
            .iter()
            .map(|name| graph.node(name.as_ref()))
            .collect();
        let mut expanded = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if !expanded.insert(id) {
                continue;
            }
            let name = graph.names[id].clone();
            let Ok(task) = registry.lookup(&name) else {
                continue;
            };
            for dep in task.depends_on() {
                let dep_id = graph.node(&dep);
                graph.graph.add_edge(id, dep_id, ());
                queue.push_back(dep_id);
            }
        }

        graph
    }

    fn node(&mut self, name: &str) -> usize {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.graph.add_node(id);
        id
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All task names in discovery order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Tasks that directly depend on `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, dir: Direction) -> Vec<&str> {
        match self.index.get(name) {
            Some(&id) => self
                .graph
                .neighbors_directed(id, dir)
                .map(|n| self.names[n].as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// First cycle found by a depth-first walk, as a closed path
    /// (`["A", "B", "A"]`), or `None` if the graph is acyclic.
    ///
    /// The walk keeps its own stack, so arbitrarily long dependency chains
    /// are fine.
    pub fn find_cycle(&self) -> Option<Vec<TaskName>> {
        let mut marks = vec![Mark::Unvisited; self.names.len()];

        for start in 0..self.names.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            marks[start] = Mark::Visiting;
            let mut stack = vec![(start, self.graph.neighbors(start))];

            while let Some((node, deps)) = stack.last_mut() {
                let node = *node;
                let Some(dep) = deps.next() else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };

                match marks[dep] {
                    Mark::Visiting => {
                        // The stack is the current path; the cycle starts at `dep`.
                        let from = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                        let mut cycle: Vec<TaskName> = stack[from..]
                            .iter()
                            .map(|(n, _)| self.names[*n].clone())
                            .collect();
                        cycle.push(self.names[dep].clone());
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        marks[dep] = Mark::Visiting;
                        stack.push((dep, self.graph.neighbors(dep)));
                    }
                    Mark::Done => {}
                }
            }
        }

        None
    }
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

    #[test]
    fn follows_dependencies_from_roots_only() {
        let registry = TaskRegistry::from_tasks([
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["b", "x"]),
            task("unrelated", &[]),
        ])
        .unwrap();

        let graph = DependencyGraph::from_registry(&["c"], &registry);
        assert!(graph.contains("a"));
        assert!(graph.contains("x"));
        assert!(!graph.contains("unrelated"));
        assert_eq!(graph.dependencies_of("c"), vec!["b", "x"]);
        assert_eq!(graph.dependents_of("a"), vec!["b"]);
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn reports_cycle_path() {
        let registry = TaskRegistry::from_tasks([
            task("a", &["b"]),
            task("b", &["c"]),
            task("c", &["a"]),
        ])
        .unwrap();

        let graph = DependencyGraph::from_registry(&["a"], &registry);
        assert_eq!(
            graph.find_cycle(),
            Some(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let registry = TaskRegistry::from_tasks([task("a", &["a"])]).unwrap();
        let graph = DependencyGraph::from_registry(&["a"], &registry);
        assert_eq!(graph.find_cycle(), Some(vec!["a".into(), "a".into()]));
    }

    #[test]
    fn long_chain_is_walked_without_recursion() {
        let n = 50_000;
        let mut tasks = vec![task("t0", &[])];
        for i in 1..n {
            let dep = format!("t{}", i - 1);
            tasks.push(task(&format!("t{i}"), &[dep.as_str()]));
        }
        // Close the chain into one long loop.
        tasks[0] = task("t0", &["t49999"]);
        let registry = TaskRegistry::from_tasks(tasks).unwrap();

        let graph = DependencyGraph::from_registry(&["t49999"], &registry);
        let cycle = graph.find_cycle().expect("cycle");
        assert_eq!(cycle.len(), n + 1);
        assert_eq!(cycle.first(), cycle.last());
    }
}
