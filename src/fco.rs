// src/fco.rs

//! First-class objects (FCOs) and target resolution.
//!
//! An FCO reference is identity only: the orchestrator never mutates the
//! underlying entity, it just carries the reference through result actions
//! and reports.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of virtualization entity a command can operate on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Virtual machine
    #[serde(rename = "vm")]
    #[value(name = "vm")]
    VirtualMachine,

    /// Improved virtual disk
    #[serde(rename = "ivd")]
    #[value(name = "ivd")]
    ImprovedVirtualDisk,

    /// Virtual appliance (vApp)
    #[serde(rename = "vapp")]
    #[value(name = "vapp")]
    VirtualApp,

    /// Kubernetes namespace
    #[serde(rename = "namespace")]
    #[value(name = "namespace")]
    K8sNamespace,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::VirtualMachine => "vm",
            EntityType::ImprovedVirtualDisk => "ivd",
            EntityType::VirtualApp => "vapp",
            EntityType::K8sNamespace => "namespace",
        };
        f.write_str(name)
    }
}

/// Reference to one FCO: stable identity plus display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcoRef {
    /// Stable identifier (vSphere moref/uuid, or namespace key).
    pub uuid: String,

    /// Human-readable name used in reports.
    pub name: String,

    /// Entity kind, used for statistics grouping.
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Free-form tags used for target selection.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FcoRef {
    pub fn label(&self) -> String {
        format!("{}:{}", self.entity_type, self.name)
    }
}

/// Selection criteria for one command invocation.
///
/// An empty filter selects nothing; resolution of zero targets is reported
/// by the caller as a failed command, never as an empty success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetFilter {
    /// Restrict to one entity kind.
    #[serde(rename = "type", default)]
    pub entity_type: Option<EntityType>,

    /// Match by name or uuid.
    #[serde(default)]
    pub names: Vec<String>,

    /// Match by tag (any tag in common selects the FCO).
    #[serde(default)]
    pub tags: Vec<String>,

    /// Select every inventory entry (still narrowed by `type` if set).
    #[serde(default)]
    pub all: bool,
}

impl TargetFilter {
    pub fn matches(&self, fco: &FcoRef) -> bool {
        if let Some(et) = self.entity_type {
            if fco.entity_type != et {
                return false;
            }
        }
        if self.all {
            return true;
        }
        let by_name = self
            .names
            .iter()
            .any(|n| n == &fco.name || n == &fco.uuid);
        let by_tag = self.tags.iter().any(|t| fco.tags.contains(t));
        by_name || by_tag
    }
}

/// Target resolution collaborator.
///
/// Zero matches is an empty list, not an error; the fan-out layer decides
/// how to report it.
pub trait FcoResolver: Send + Sync {
    fn resolve(&self, filter: &TargetFilter) -> Vec<FcoRef>;
}

/// Resolver backed by the static inventory section of `config.yaml`.
#[derive(Debug, Default)]
pub struct InventoryResolver {
    items: Vec<FcoRef>,
}

impl InventoryResolver {
    pub fn new(items: Vec<FcoRef>) -> Self {
        Self { items }
    }
}

impl FcoResolver for InventoryResolver {
    fn resolve(&self, filter: &TargetFilter) -> Vec<FcoRef> {
        self.items
            .iter()
            .filter(|fco| filter.matches(fco))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(name: &str, tags: &[&str]) -> FcoRef {
        FcoRef {
            uuid: format!("uuid-{name}"),
            name: name.to_string(),
            entity_type: EntityType::VirtualMachine,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn empty_filter_selects_nothing() {
        let resolver = InventoryResolver::new(vec![vm("a", &[]), vm("b", &[])]);
        assert!(resolver.resolve(&TargetFilter::default()).is_empty());
    }

    #[test]
    fn all_respects_entity_type() {
        let mut disk = vm("d", &[]);
        disk.entity_type = EntityType::ImprovedVirtualDisk;
        let resolver = InventoryResolver::new(vec![vm("a", &[]), disk]);

        let filter = TargetFilter {
            all: true,
            entity_type: Some(EntityType::ImprovedVirtualDisk),
            ..Default::default()
        };
        let found = resolver.resolve(&filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "d");
    }

    #[test]
    fn resolution_preserves_inventory_order() {
        let resolver =
            InventoryResolver::new(vec![vm("a", &["x"]), vm("b", &[]), vm("c", &["x"])]);
        let filter = TargetFilter {
            tags: vec!["x".to_string()],
            ..Default::default()
        };
        let names: Vec<_> = resolver
            .resolve(&filter)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn name_filter_accepts_uuid() {
        let resolver = InventoryResolver::new(vec![vm("a", &[])]);
        let filter = TargetFilter {
            names: vec!["uuid-a".to_string()],
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&filter).len(), 1);
    }
}
