//! Filesystem-backed scaffolding and contract generation.

use super::{ContractGenerator, Scaffolder};
use crate::core::ComponentCategory;
use crate::errors::CollaboratorError;
use crate::graph::Component;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Creates `<root>/<component>/{src,tests}` for each component.
#[derive(Debug, Clone)]
pub struct FsScaffolder {
    root: PathBuf,
}

impl FsScaffolder {
    /// Creates a scaffolder rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory a component is scaffolded into.
    #[must_use]
    pub fn component_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl Scaffolder for FsScaffolder {
    async fn scaffold(&self, component: &Component) -> Result<(), CollaboratorError> {
        let dir = self.component_dir(&component.name);
        for sub in ["src", "tests"] {
            tokio::fs::create_dir_all(dir.join(sub)).await?;
        }
        debug!(component = %component.name, dir = %dir.display(), "Scaffolded component");
        Ok(())
    }
}

/// The interface document written for a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDocument {
    /// Component name.
    pub component: String,
    /// Contract format version.
    pub version: String,
    /// Component category.
    pub category: ComponentCategory,
    /// Components whose contracts this one consumes.
    pub consumes: Vec<String>,
    /// One-line description from the manifest.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ContractDocument {
    /// Builds the contract document for a component.
    #[must_use]
    pub fn for_component(component: &Component, version: &str) -> Self {
        Self {
            component: component.name.clone(),
            version: version.to_string(),
            category: component.category,
            consumes: component.dependencies.clone(),
            description: component.metadata.description.clone(),
        }
    }
}

/// Writes `<dir>/<component>.json` contract documents.
#[derive(Debug, Clone)]
pub struct JsonContractGenerator {
    dir: PathBuf,
    version: String,
}

impl JsonContractGenerator {
    /// Creates a generator writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            version: "1.0".to_string(),
        }
    }

    /// Sets the contract version stamped into every document.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Path of a component's contract.
    #[must_use]
    pub fn contract_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Reads a previously written contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub async fn read(path: &Path) -> Result<ContractDocument, CollaboratorError> {
        let raw = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&raw).map_err(|e| CollaboratorError::InvalidOutput(e.to_string()))
    }
}

#[async_trait]
impl ContractGenerator for JsonContractGenerator {
    async fn generate(&self, component: &Component) -> Result<(), CollaboratorError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let document = ContractDocument::for_component(component, &self.version);
        let body = serde_json::to_string_pretty(&document)
            .map_err(|e| CollaboratorError::InvalidOutput(e.to_string()))?;
        let path = self.contract_path(&component.name);
        tokio::fs::write(&path, body).await?;
        debug!(component = %component.name, path = %path.display(), "Wrote contract");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ComponentMetadata;

    #[tokio::test]
    async fn test_scaffold_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let scaffolder = FsScaffolder::new(tmp.path());
        let component = Component::new("file_ops", ComponentCategory::Core);

        scaffolder.scaffold(&component).await.unwrap();
        scaffolder.scaffold(&component).await.unwrap();

        assert!(tmp.path().join("file_ops/src").is_dir());
        assert!(tmp.path().join("file_ops/tests").is_dir());
    }

    #[tokio::test]
    async fn test_contract_written_as_json() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = JsonContractGenerator::new(tmp.path().join("contracts")).with_version("2.0");
        let component = Component::new("cdp_server", ComponentCategory::Integration)
            .with_dependencies(["cdp_client", "file_ops"])
            .with_metadata(ComponentMetadata::new("Chrome DevTools bridge"));

        generator.generate(&component).await.unwrap();

        let document = JsonContractGenerator::read(&generator.contract_path("cdp_server"))
            .await
            .unwrap();
        assert_eq!(document.version, "2.0");
        assert_eq!(document.category, ComponentCategory::Integration);
        assert_eq!(document.consumes, vec!["cdp_client", "file_ops"]);
        assert_eq!(document.description, "Chrome DevTools bridge");
    }

    #[tokio::test]
    async fn test_read_missing_contract_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = JsonContractGenerator::read(&tmp.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Io(_)));
    }
}
