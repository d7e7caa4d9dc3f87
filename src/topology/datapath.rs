//! Data paths: weighted relations between components, orthogonal to the tree

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeMap, AttributeValue};

use super::component::ComponentId;

/// Stable handle of a data path inside a [`TopologyGraph`](super::TopologyGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataPathId(pub(crate) usize);

impl DataPathId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a data path has a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Directed from source to target
    Oriented,
    /// No direction; source and target are interchangeable
    Bidirectional,
}

impl Orientation {
    pub const BIDIRECTIONAL_TAG: u32 = 8;
    pub const ORIENTED_TAG: u32 = 16;

    pub fn tag(self) -> u32 {
        match self {
            Orientation::Oriented => Self::ORIENTED_TAG,
            Orientation::Bidirectional => Self::BIDIRECTIONAL_TAG,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            Self::ORIENTED_TAG => Some(Orientation::Oriented),
            Self::BIDIRECTIONAL_TAG => Some(Orientation::Bidirectional),
            _ => None,
        }
    }
}

/// Open taxonomy of data path types
///
/// Values above [`DataPathType::C2C`] are free for user-defined types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPathType(pub i32);

impl DataPathType {
    pub const NONE: DataPathType = DataPathType(32);
    /// Logical relation of two components
    pub const LOGICAL: DataPathType = DataPathType(64);
    /// Physical or hardware connection
    pub const PHYSICAL: DataPathType = DataPathType(128);
    /// Cache partitioning settings
    pub const L3CAT: DataPathType = DataPathType(256);
    /// GPU partitioning settings
    pub const MIG: DataPathType = DataPathType(512);
    pub const DATATRANSFER: DataPathType = DataPathType(1024);
    /// Cache-to-cache latencies
    pub const C2C: DataPathType = DataPathType(2048);
}

impl Default for DataPathType {
    fn default() -> Self {
        Self::NONE
    }
}

/// Which of a component's data-path lists to look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    /// Outgoing then incoming, each path once
    Any,
}

/// Value for bandwidth or latency when nothing was measured
pub const UNKNOWN: f64 = -1.0;

/// A relation between two components of the same graph
#[derive(Debug, Clone, PartialEq)]
pub struct DataPath {
    source: ComponentId,
    target: ComponentId,
    orientation: Orientation,
    dp_type: DataPathType,
    /// Bandwidth from source to target, [`UNKNOWN`] if not measured
    pub bandwidth: f64,
    /// Load latency from source to target, [`UNKNOWN`] if not measured
    pub latency: f64,
    pub attributes: AttributeMap,
}

impl DataPath {
    pub(crate) fn new(
        source: ComponentId,
        target: ComponentId,
        orientation: Orientation,
        dp_type: DataPathType,
        bandwidth: f64,
        latency: f64,
    ) -> Self {
        Self {
            source,
            target,
            orientation,
            dp_type,
            bandwidth,
            latency,
            attributes: AttributeMap::new(),
        }
    }

    pub fn source(&self) -> ComponentId {
        self.source
    }

    pub fn target(&self) -> ComponentId {
        self.target
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn dp_type(&self) -> DataPathType {
        self.dp_type
    }

    pub fn is_bidirectional(&self) -> bool {
        self.orientation == Orientation::Bidirectional
    }

    /// Whether `component` is either endpoint
    pub fn touches(&self, component: ComponentId) -> bool {
        self.source == component || self.target == component
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Same orientation, type, measurements and attributes, ignoring endpoints
    pub fn same_content(&self, other: &DataPath) -> bool {
        self.orientation == other.orientation
            && self.dp_type == other.dp_type
            && self.bandwidth.to_bits() == other.bandwidth.to_bits()
            && self.latency.to_bits() == other.latency.to_bits()
            && self.attributes == other.attributes
    }
}
