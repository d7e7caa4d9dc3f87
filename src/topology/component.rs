//! Components of the containment tree

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeMap, AttributeValue};

use super::{
    datapath::DataPathId,
    kind::{ComponentData, ComponentKind},
};

/// Stable handle of a component inside a [`TopologyGraph`](super::TopologyGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// Arena slot of this component
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the topology tree
///
/// Parent, children and data-path lists are maintained by the owning graph;
/// a component detached from a graph carries none of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Identifier, unique among siblings
    pub id: i32,
    pub name: String,
    pub data: ComponentData,
    pub attributes: AttributeMap,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) dp_outgoing: Vec<DataPathId>,
    pub(crate) dp_incoming: Vec<DataPathId>,
}

impl Component {
    pub fn new(id: i32, data: ComponentData) -> Self {
        Self {
            id,
            name: String::new(),
            data,
            attributes: AttributeMap::new(),
            parent: None,
            children: Vec::new(),
            dp_outgoing: Vec::new(),
            dp_incoming: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn kind(&self) -> ComponentKind {
        self.data.kind()
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Children in sibling order
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    pub fn outgoing(&self) -> &[DataPathId] {
        &self.dp_outgoing
    }

    pub fn incoming(&self) -> &[DataPathId] {
        &self.dp_incoming
    }

    /// Same id, name, fixed fields and attributes, ignoring graph links
    pub fn same_content(&self, other: &Component) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.data == other.data
            && self.attributes == other.attributes
    }
}
