//! Component dependency graph and level assignment.

use super::Component;
use crate::errors::GraphError;
use std::collections::{HashMap, HashSet};

/// One dependency level: components that may run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelGroup {
    /// The level number.
    pub level: usize,
    /// Component names in declaration order.
    pub components: Vec<String>,
}

/// An acyclic graph of components keyed by name.
///
/// Built once per run and passed into the pipeline; nothing about it is
/// global.
#[derive(Debug, Clone, Default)]
pub struct ComponentGraph {
    /// Component specifications.
    components: HashMap<String, Component>,
    /// Insertion order.
    order: Vec<String>,
}

impl ComponentGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from components declared in any order.
    ///
    /// All components are inserted first, then every dependency name is
    /// validated, so dependents may precede their dependencies.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateComponent`, `SelfDependency` or `UnknownDependency`.
    pub fn from_components(
        components: impl IntoIterator<Item = Component>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for component in components {
            graph.insert_unchecked_deps(component)?;
        }

        for name in &graph.order {
            let component = &graph.components[name];
            if let Some(missing) = component
                .dependencies
                .iter()
                .find(|dep| !graph.components.contains_key(*dep))
            {
                return Err(GraphError::UnknownDependency {
                    component: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        Ok(graph)
    }

    /// Adds a component whose dependencies are already declared.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateComponent` if the name exists, `SelfDependency` if the
    /// component lists itself, or `UnknownDependency` if a dependency has not
    /// been added yet.
    pub fn add_component(&mut self, component: Component) -> Result<(), GraphError> {
        if self.components.contains_key(&component.name) {
            return Err(GraphError::DuplicateComponent {
                name: component.name,
            });
        }
        if component.depends_on_itself() {
            return Err(GraphError::SelfDependency {
                name: component.name,
            });
        }
        if let Some(missing) = component
            .dependencies
            .iter()
            .find(|dep| !self.components.contains_key(*dep))
        {
            return Err(GraphError::UnknownDependency {
                component: component.name.clone(),
                dependency: missing.clone(),
            });
        }

        self.insert_unchecked_deps(component)
    }

    /// Builder-style variant of [`Self::add_component`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_component`].
    pub fn component(mut self, component: Component) -> Result<Self, GraphError> {
        self.add_component(component)?;
        Ok(self)
    }

    fn insert_unchecked_deps(&mut self, component: Component) -> Result<(), GraphError> {
        if self.components.contains_key(&component.name) {
            return Err(GraphError::DuplicateComponent {
                name: component.name,
            });
        }
        if component.depends_on_itself() {
            return Err(GraphError::SelfDependency {
                name: component.name,
            });
        }

        self.order.push(component.name.clone());
        self.components.insert(component.name.clone(), component);
        Ok(())
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the graph has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Looks up a component by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Iterates components in declaration order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.order.iter().filter_map(|name| self.components.get(name))
    }

    /// Returns component names in declaration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Computes every component's dependency level and stores it on the
    /// component.
    ///
    /// # Errors
    ///
    /// Returns `CyclicDependency` if level assignment does not converge.
    pub fn compute_levels(&mut self) -> Result<HashMap<String, usize>, GraphError> {
        let levels = self.assign_levels()?;
        for (name, level) in &levels {
            if let Some(component) = self.components.get_mut(name) {
                component.set_level(*level);
            }
        }
        Ok(levels)
    }

    /// Groups components by level, ascending; declaration order within a level.
    ///
    /// # Errors
    ///
    /// Returns `CyclicDependency` if the graph is not a DAG.
    pub fn level_groups(&self) -> Result<Vec<LevelGroup>, GraphError> {
        let levels = self.assign_levels()?;
        let depth = levels.values().copied().max().map_or(0, |max| max + 1);

        let mut groups: Vec<LevelGroup> = (0..depth)
            .map(|level| LevelGroup {
                level,
                components: Vec::new(),
            })
            .collect();

        for name in &self.order {
            if let Some(&level) = levels.get(name) {
                groups[level].components.push(name.clone());
            }
        }

        Ok(groups)
    }

    /// Iterative fixed-point level assignment.
    ///
    /// Every pass recomputes `1 + max(level of deps)` for each component. A
    /// DAG settles within `len()` passes because the longest path has at most
    /// `len() - 1` edges; a cycle keeps raising levels forever.
    fn assign_levels(&self) -> Result<HashMap<String, usize>, GraphError> {
        let mut levels: HashMap<&str, usize> =
            self.order.iter().map(|name| (name.as_str(), 0)).collect();

        let mut converged = false;
        for _ in 0..self.len() {
            let mut changed = false;
            for name in &self.order {
                let component = &self.components[name];
                let level = component
                    .dependencies
                    .iter()
                    .filter_map(|dep| levels.get(dep.as_str()))
                    .map(|dep_level| dep_level + 1)
                    .max()
                    .unwrap_or(0);

                if levels.insert(name.as_str(), level) != Some(level) {
                    changed = true;
                }
            }

            if !changed {
                converged = true;
                break;
            }
        }

        if !converged && !self.is_empty() {
            return Err(GraphError::CyclicDependency {
                unresolved: self.unresolved_components(),
            });
        }

        Ok(levels
            .into_iter()
            .map(|(name, level)| (name.to_string(), level))
            .collect())
    }

    /// Components that cannot be ordered: members of a cycle and everything
    /// depending on one.
    fn unresolved_components(&self) -> Vec<String> {
        let mut resolved: HashSet<&str> = HashSet::new();
        loop {
            let before = resolved.len();
            for name in &self.order {
                if resolved.contains(name.as_str()) {
                    continue;
                }
                let ready = self.components[name]
                    .dependencies
                    .iter()
                    .all(|dep| resolved.contains(dep.as_str()));
                if ready {
                    resolved.insert(name.as_str());
                }
            }
            if resolved.len() == before {
                break;
            }
        }

        self.order
            .iter()
            .filter(|name| !resolved.contains(name.as_str()))
            .cloned()
            .collect()
    }
}
