// src/registry.rs

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::engine::TaskName;
use crate::errors::RegistryError;
use crate::task::Task;

/// Name-keyed collection of tasks.
///
/// Built once, then handed to an [`Orchestrator`](crate::engine::Orchestrator),
/// which only ever reads from it.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Vec<Box<dyn Task>>,
    index: HashMap<TaskName, usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from boxed tasks, failing on the first duplicate name.
    pub fn from_tasks<I>(tasks: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Box<dyn Task>>,
    {
        let mut registry = Self::new();
        for task in tasks {
            registry.register_boxed(task)?;
        }
        Ok(registry)
    }

    pub fn register<T: Task + 'static>(&mut self, task: T) -> Result<(), RegistryError> {
        self.register_boxed(Box::new(task))
    }

    pub fn register_boxed(&mut self, task: Box<dyn Task>) -> Result<(), RegistryError> {
        let name = task.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTask(name));
        }
        debug!(task = %name, deps = ?task.depends_on(), "registered task");
        self.index.insert(name, self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn Task, RegistryError> {
        self.index
            .get(name)
            .map(|&idx| self.tasks[idx].as_ref())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tasks in registration order.
    pub fn all(&self) -> impl Iterator<Item = &dyn Task> {
        self.tasks.iter().map(|t| t.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
