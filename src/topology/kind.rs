//! Component kinds and their kind-specific fields

use serde::{Deserialize, Serialize};

/// Kind of a topology component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Generic,
    Thread,
    Core,
    Cache,
    Subdivision,
    Numa,
    Chip,
    Memory,
    Storage,
    Node,
    Topology,
}

impl ComponentKind {
    /// Every kind, in tag order
    pub const ALL: [ComponentKind; 11] = [
        ComponentKind::Generic,
        ComponentKind::Thread,
        ComponentKind::Core,
        ComponentKind::Cache,
        ComponentKind::Subdivision,
        ComponentKind::Numa,
        ComponentKind::Chip,
        ComponentKind::Memory,
        ComponentKind::Storage,
        ComponentKind::Node,
        ComponentKind::Topology,
    ];

    /// Stable tag stored in the region
    pub fn tag(self) -> u64 {
        match self {
            ComponentKind::Generic => 0,
            ComponentKind::Thread => 1,
            ComponentKind::Core => 2,
            ComponentKind::Cache => 3,
            ComponentKind::Subdivision => 4,
            ComponentKind::Numa => 5,
            ComponentKind::Chip => 6,
            ComponentKind::Memory => 7,
            ComponentKind::Storage => 8,
            ComponentKind::Node => 9,
            ComponentKind::Topology => 10,
        }
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Get a human-readable name for the kind
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Generic => "generic",
            ComponentKind::Thread => "HW_thread",
            ComponentKind::Core => "Core",
            ComponentKind::Cache => "Cache",
            ComponentKind::Subdivision => "Subdivision",
            ComponentKind::Numa => "NUMA",
            ComponentKind::Chip => "Chip",
            ComponentKind::Memory => "Memory",
            ComponentKind::Storage => "Storage",
            ComponentKind::Node => "Node",
            ComponentKind::Topology => "Topology",
        }
    }
}

/// Cache geometry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheInfo {
    pub level: i32,
    /// Free-form cache type, e.g. "L3" or "Unified"
    pub cache_type: String,
    /// Size in bytes
    pub size: i64,
    pub associativity_ways: i32,
    pub line_size: i32,
}

/// Chip identification
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChipInfo {
    pub vendor: String,
    pub model: String,
    pub chip_type: i32,
}

/// Kind-specific fixed fields of a component
///
/// Each variant is encoded and decoded on its own, so the region never holds
/// an in-memory object representation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ComponentData {
    #[default]
    Generic,
    Thread,
    Core,
    Cache(CacheInfo),
    /// Partition of a component, e.g. a GPU SM group
    Subdivision {
        subdivision_type: i32,
    },
    Numa {
        size: i64,
    },
    Chip(ChipInfo),
    Memory {
        size: i64,
        is_volatile: bool,
    },
    Storage {
        size: i64,
    },
    Node,
    Topology,
}

impl ComponentData {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentData::Generic => ComponentKind::Generic,
            ComponentData::Thread => ComponentKind::Thread,
            ComponentData::Core => ComponentKind::Core,
            ComponentData::Cache(_) => ComponentKind::Cache,
            ComponentData::Subdivision { .. } => ComponentKind::Subdivision,
            ComponentData::Numa { .. } => ComponentKind::Numa,
            ComponentData::Chip(_) => ComponentKind::Chip,
            ComponentData::Memory { .. } => ComponentKind::Memory,
            ComponentData::Storage { .. } => ComponentKind::Storage,
            ComponentData::Node => ComponentKind::Node,
            ComponentData::Topology => ComponentKind::Topology,
        }
    }

    /// Size in bytes for kinds that carry one
    pub fn size(&self) -> Option<i64> {
        match self {
            ComponentData::Cache(cache) => Some(cache.size),
            ComponentData::Numa { size }
            | ComponentData::Memory { size, .. }
            | ComponentData::Storage { size } => Some(*size),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ComponentKind::from_tag(11), None);
    }

    #[test]
    fn test_data_kind_and_size() {
        let memory = ComponentData::Memory {
            size: 100,
            is_volatile: true,
        };
        assert_eq!(memory.kind(), ComponentKind::Memory);
        assert_eq!(memory.size(), Some(100));
        assert_eq!(ComponentData::Core.size(), None);
    }
}
