//! Component graph, leveling and build order.
//!
//! This module provides:
//! - Component specifications and metadata
//! - The dependency graph with fixed-point level assignment
//! - The level scheduler producing the build order
//! - The JSON component manifest read at Planning

mod component;
mod dag;
mod manifest;
mod schedule;

pub use component::{Component, ComponentMetadata};
pub use dag::{ComponentGraph, LevelGroup};
pub use manifest::{ComponentManifest, LevelHintMismatch, ManifestEntry};
pub use schedule::BuildOrder;
