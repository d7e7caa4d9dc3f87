//! Arena owning a component tree and its data-path side table

use std::ops::Index;

use log::trace;

use crate::error::{Result, TopomapError};

use super::{
    component::{Component, ComponentId},
    datapath::{DataPath, DataPathId, DataPathType, Direction, Orientation, UNKNOWN},
    kind::ComponentKind,
};

/// A topology: components owned by the tree, data paths owned by the graph
///
/// Components are addressed by [`ComponentId`] and never move. Data paths
/// live in a separate table and refer to components only by id, so deleting
/// a path never touches component ownership.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    components: Vec<Component>,
    roots: Vec<ComponentId>,
    paths: Vec<Option<DataPath>>,
    live_paths: usize,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Insert a component as the last child of `parent`, or as a root
    pub fn add_component(
        &mut self,
        parent: Option<ComponentId>,
        mut component: Component,
    ) -> Result<ComponentId> {
        if let Some(parent) = parent {
            self.check_component(parent)?;
        }

        let id = ComponentId(self.components.len());
        component.parent = parent;
        component.children.clear();
        component.dp_outgoing.clear();
        component.dp_incoming.clear();
        self.components.push(component);

        match parent {
            Some(parent) => self.components[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    fn check_component(&self, id: ComponentId) -> Result<()> {
        if id.0 < self.components.len() {
            Ok(())
        } else {
            Err(TopomapError::not_found(format!("component #{}", id.0)))
        }
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.0)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_mut(id.0)
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.component(id).and_then(Component::parent)
    }

    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.component(id).map(Component::children).unwrap_or(&[])
    }

    /// Components without a parent, in insertion order
    pub fn roots(&self) -> &[ComponentId] {
        &self.roots
    }

    /// First root, the whole tree for a graph built from one root
    pub fn root(&self) -> Option<ComponentId> {
        self.roots.first().copied()
    }

    /// Child of `parent` with the given kind and id
    pub fn find_child(&self, parent: ComponentId, kind: ComponentKind, id: i32) -> Option<ComponentId> {
        self.children(parent).iter().copied().find(|&child| {
            let c = &self.components[child.0];
            c.kind() == kind && c.id == id
        })
    }

    /// Ids of the subtree rooted at `root`, depth-first pre-order
    pub fn subtree(&self, root: ComponentId) -> Vec<ComponentId> {
        let mut order = Vec::new();
        if self.component(root).is_none() {
            return order;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Number of ancestors above `id`
    pub fn depth(&self, id: ComponentId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.parent(parent);
        }
        depth
    }

    // ----- data paths -----

    /// Connect two components and register the path on its endpoints
    ///
    /// A bidirectional path is registered as outgoing and incoming on both
    /// endpoints; an oriented one as outgoing on the source and incoming on
    /// the target.
    pub fn add_data_path(
        &mut self,
        source: ComponentId,
        target: ComponentId,
        orientation: Orientation,
        dp_type: DataPathType,
        bandwidth: f64,
        latency: f64,
    ) -> Result<DataPathId> {
        self.check_component(source)?;
        self.check_component(target)?;

        let id = DataPathId(self.paths.len());
        self.paths.push(Some(DataPath::new(
            source,
            target,
            orientation,
            dp_type,
            bandwidth,
            latency,
        )));
        self.live_paths += 1;

        match orientation {
            Orientation::Bidirectional => {
                for endpoint in [source, target] {
                    let component = &mut self.components[endpoint.0];
                    component.dp_outgoing.push(id);
                    component.dp_incoming.push(id);
                }
            }
            Orientation::Oriented => {
                self.components[source.0].dp_outgoing.push(id);
                self.components[target.0].dp_incoming.push(id);
            }
        }
        trace!("data path #{} {:?} #{} -> #{}", id.0, orientation, source.0, target.0);
        Ok(id)
    }

    /// Connect with type `NONE` and unknown bandwidth and latency
    pub fn connect(
        &mut self,
        source: ComponentId,
        target: ComponentId,
        orientation: Orientation,
    ) -> Result<DataPathId> {
        self.add_data_path(source, target, orientation, DataPathType::NONE, UNKNOWN, UNKNOWN)
    }

    pub fn data_path(&self, id: DataPathId) -> Option<&DataPath> {
        self.paths.get(id.0).and_then(Option::as_ref)
    }

    pub fn data_path_mut(&mut self, id: DataPathId) -> Option<&mut DataPath> {
        self.paths.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Live data paths in id order
    pub fn data_paths(&self) -> impl Iterator<Item = (DataPathId, &DataPath)> {
        self.paths
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|path| (DataPathId(i), path)))
    }

    pub fn data_path_count(&self) -> usize {
        self.live_paths
    }

    /// Paths registered on `component` in the given direction
    pub fn data_paths_of(&self, component: ComponentId, direction: Direction) -> Vec<DataPathId> {
        let Some(c) = self.component(component) else {
            return Vec::new();
        };
        match direction {
            Direction::Outgoing => c.dp_outgoing.clone(),
            Direction::Incoming => c.dp_incoming.clone(),
            Direction::Any => {
                let mut all = c.dp_outgoing.clone();
                for id in &c.dp_incoming {
                    if !all.contains(id) {
                        all.push(*id);
                    }
                }
                all
            }
        }
    }

    /// First outgoing path of `source` that reaches `target`
    pub fn find_data_path(&self, source: ComponentId, target: ComponentId) -> Option<DataPathId> {
        self.component(source)?
            .dp_outgoing
            .iter()
            .copied()
            .find(|&id| {
                self.data_path(id).is_some_and(|path| {
                    let other = if path.source() == source { path.target() } else { path.source() };
                    other == target
                })
            })
    }

    /// Remove a path from exactly the endpoint lists it was registered in
    pub fn delete_data_path(&mut self, id: DataPathId) -> Result<DataPath> {
        let path = self
            .paths
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| TopomapError::not_found(format!("data path #{}", id.0)))?;
        self.live_paths -= 1;

        let (source, target) = (path.source(), path.target());
        match path.orientation() {
            Orientation::Bidirectional => {
                for endpoint in [source, target] {
                    let component = &mut self.components[endpoint.0];
                    component.dp_outgoing.retain(|&p| p != id);
                    component.dp_incoming.retain(|&p| p != id);
                }
            }
            Orientation::Oriented => {
                self.components[source.0].dp_outgoing.retain(|&p| p != id);
                self.components[target.0].dp_incoming.retain(|&p| p != id);
            }
        }
        Ok(path)
    }
}

impl Index<ComponentId> for TopologyGraph {
    type Output = Component;

    fn index(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }
}

impl Index<DataPathId> for TopologyGraph {
    type Output = DataPath;

    fn index(&self, id: DataPathId) -> &DataPath {
        match &self.paths[id.0] {
            Some(path) => path,
            None => panic!("data path #{} was deleted", id.0),
        }
    }
}
