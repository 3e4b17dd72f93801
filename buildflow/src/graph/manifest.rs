//! Component manifest: the specification artifact read at Planning.

use super::{Component, ComponentGraph, ComponentMetadata};
use crate::core::ComponentCategory;
use crate::errors::{GraphError, ManifestError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One component as declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The unique component name.
    pub name: String,
    /// The architectural tier.
    #[serde(rename = "type", alias = "category", default)]
    pub category: ComponentCategory,
    /// Advisory level written by whoever planned the architecture.
    /// Ignored for scheduling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
    /// Dependency names.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Descriptive metadata.
    #[serde(flatten)]
    pub metadata: ComponentMetadata,
}

impl ManifestEntry {
    /// Converts the entry into a component.
    #[must_use]
    pub fn to_component(&self) -> Component {
        Component::new(&self.name, self.category)
            .with_dependencies(self.dependencies.iter().cloned())
            .with_metadata(self.metadata.clone())
    }
}

/// A declared level that disagrees with the derived one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelHintMismatch {
    /// The component.
    pub component: String,
    /// Level written in the manifest.
    pub declared: usize,
    /// Level derived from dependencies.
    pub derived: usize,
}

/// The full set of components for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentManifest {
    /// Project display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Declared components, in declaration order.
    #[serde(default)]
    pub components: Vec<ManifestEntry>,
}

impl ComponentManifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project name.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Appends a component entry.
    #[must_use]
    pub fn with_component(mut self, component: &Component) -> Self {
        self.components.push(ManifestEntry {
            name: component.name.clone(),
            category: component.category,
            level: None,
            dependencies: component.dependencies.clone(),
            metadata: component.metadata.clone(),
        });
        self
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Read` or `Parse`.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the component graph, validating every dependency name.
    ///
    /// # Errors
    ///
    /// Returns `EmptyGraph` or any error from [`ComponentGraph::from_components`].
    pub fn to_graph(&self) -> Result<ComponentGraph, GraphError> {
        if self.components.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        ComponentGraph::from_components(self.components.iter().map(ManifestEntry::to_component))
    }

    /// Compares declared level hints against derived levels.
    #[must_use]
    pub fn level_hint_mismatches(&self, derived: &HashMap<String, usize>) -> Vec<LevelHintMismatch> {
        self.components
            .iter()
            .filter_map(|entry| {
                let declared = entry.level?;
                let actual = *derived.get(&entry.name)?;
                (declared != actual).then(|| LevelHintMismatch {
                    component: entry.name.clone(),
                    declared,
                    derived: actual,
                })
            })
            .collect()
    }
}
