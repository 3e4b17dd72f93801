//! Level scheduler: turns level groups into the build order.

use super::{ComponentGraph, LevelGroup};
use crate::errors::GraphError;
use serde::{Deserialize, Serialize};

/// Ordered, disjoint sets of component names, level 0 first.
///
/// Level `k` must reach a terminal result for every component before any
/// component of level `k + 1` is dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildOrder {
    levels: Vec<Vec<String>>,
}

impl BuildOrder {
    /// Computes the build order of a graph.
    ///
    /// # Errors
    ///
    /// Returns `CyclicDependency` if the graph cannot be leveled.
    pub fn from_graph(graph: &ComponentGraph) -> Result<Self, GraphError> {
        Ok(Self::from_groups(graph.level_groups()?))
    }

    /// Builds the order from precomputed level groups. Empty groups are dropped.
    #[must_use]
    pub fn from_groups(groups: Vec<LevelGroup>) -> Self {
        let mut groups = groups;
        groups.sort_by_key(|g| g.level);
        Self {
            levels: groups
                .into_iter()
                .map(|g| g.components)
                .filter(|names| !names.is_empty())
                .collect(),
        }
    }

    /// Returns the levels.
    #[must_use]
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Returns the number of levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if there is nothing to build.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns the total number of scheduled components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Returns the index of the set containing `name`.
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|n| n == name))
    }

    /// Iterates `(index, names)` pairs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.levels
            .iter()
            .enumerate()
            .map(|(idx, names)| (idx, names.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ComponentCategory;
    use crate::graph::Component;
    use std::collections::HashSet;

    fn layered_graph() -> ComponentGraph {
        ComponentGraph::from_components(vec![
            Component::new("cdp_types", ComponentCategory::Base),
            Component::new("cdp_server", ComponentCategory::Core).with_dependency("cdp_types"),
            Component::new("protocol_handler", ComponentCategory::Core)
                .with_dependency("cdp_types"),
            Component::new("dom_domain", ComponentCategory::Feature)
                .with_dependencies(["cdp_types", "protocol_handler"]),
            Component::new("devtools_component", ComponentCategory::Integration)
                .with_dependencies(["cdp_server", "dom_domain"]),
            Component::new("devtools_api", ComponentCategory::Application)
                .with_dependency("devtools_component"),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_order_levels() {
        let order = BuildOrder::from_graph(&layered_graph()).unwrap();

        assert_eq!(order.len(), 5);
        assert_eq!(order.levels()[0], vec!["cdp_types"]);
        assert_eq!(order.levels()[1], vec!["cdp_server", "protocol_handler"]);
        assert_eq!(order.levels()[4], vec!["devtools_api"]);
    }

    #[test]
    fn test_every_component_exactly_once_and_edges_ordered() {
        let graph = layered_graph();
        let order = BuildOrder::from_graph(&graph).unwrap();

        let mut seen = HashSet::new();
        for (_, names) in order.iter() {
            for name in names {
                assert!(seen.insert(name.clone()));
            }
        }
        assert_eq!(seen.len(), graph.len());
        assert_eq!(order.component_count(), graph.len());

        for component in graph.components() {
            let own = order.position_of(&component.name).unwrap();
            for dep in &component.dependencies {
                assert!(own > order.position_of(dep).unwrap());
            }
        }
    }

    #[test]
    fn test_from_groups_sorts_and_drops_empty() {
        let order = BuildOrder::from_groups(vec![
            LevelGroup { level: 1, components: vec!["b".to_string()] },
            LevelGroup { level: 0, components: vec!["a".to_string()] },
            LevelGroup { level: 2, components: Vec::new() },
        ]);

        assert_eq!(order.levels(), &[vec!["a".to_string()], vec!["b".to_string()]]);
    }

    #[test]
    fn test_serializes_as_nested_arrays() {
        let order = BuildOrder::from_groups(vec![LevelGroup {
            level: 0,
            components: vec!["a".to_string()],
        }]);
        assert_eq!(serde_json::to_string(&order).unwrap(), r#"[["a"]]"#);
    }
}
