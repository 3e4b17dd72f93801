//! Component specification.

use crate::core::ComponentCategory;
use serde::{Deserialize, Serialize};

/// Opaque descriptive metadata. The scheduler never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    /// What the component is responsible for.
    #[serde(default)]
    pub description: String,
    /// Rough size estimate of the work.
    #[serde(default)]
    pub estimated_tokens: u64,
    /// Capabilities the component's implementation requires.
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

impl ComponentMetadata {
    /// Creates metadata with a description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Sets the size estimate.
    #[must_use]
    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    /// Sets the required capabilities.
    #[must_use]
    pub fn with_tech_stack(mut self, stack: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tech_stack = stack.into_iter().map(Into::into).collect();
        self
    }
}

/// A named unit of work with declared dependencies.
///
/// The dependency level is derived by [`ComponentGraph::compute_levels`] and
/// cannot be set directly.
///
/// [`ComponentGraph::compute_levels`]: super::ComponentGraph::compute_levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    /// The unique name of the component.
    pub name: String,
    /// The architectural tier.
    pub category: ComponentCategory,
    /// Names of components this one depends on, without duplicates.
    pub dependencies: Vec<String>,
    /// Descriptive metadata.
    pub metadata: ComponentMetadata,
    level: Option<usize>,
}

impl Component {
    /// Creates a component with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, category: ComponentCategory) -> Self {
        Self {
            name: name.into(),
            category,
            dependencies: Vec::new(),
            metadata: ComponentMetadata::default(),
            level: None,
        }
    }

    /// Sets the dependencies. Repeated names collapse to one entry.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies.clear();
        for dep in deps {
            self = self.with_dependency(dep);
        }
        self
    }

    /// Adds one dependency if not already present.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        let dep = dep.into();
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ComponentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the derived dependency level, once computed.
    #[must_use]
    pub fn level(&self) -> Option<usize> {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: usize) {
        self.level = Some(level);
    }

    /// Returns true if the component lists itself as a dependency.
    #[must_use]
    pub fn depends_on_itself(&self) -> bool {
        self.dependencies.iter().any(|d| d == &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_creation() {
        let component = Component::new("dom_domain", ComponentCategory::Feature)
            .with_dependencies(["cdp_types", "protocol_handler"])
            .with_metadata(ComponentMetadata::new("DOM and CSS domains").with_estimated_tokens(60_000));

        assert_eq!(component.name, "dom_domain");
        assert_eq!(component.dependencies.len(), 2);
        assert_eq!(component.metadata.estimated_tokens, 60_000);
        assert_eq!(component.level(), None);
    }

    #[test]
    fn test_duplicate_dependencies_collapse() {
        let component = Component::new("a", ComponentCategory::Core)
            .with_dependencies(["b", "c", "b"])
            .with_dependency("c");

        assert_eq!(component.dependencies, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_self_dependency_detected() {
        let component = Component::new("a", ComponentCategory::Core).with_dependency("a");
        assert!(component.depends_on_itself());
    }
}
