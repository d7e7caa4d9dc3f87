//! Writes a component subtree and its data paths into a region
//!
//! Export runs in two phases. The tree pass lays out every component in
//! depth-first pre-order and records where each one landed. The edge pass
//! then collects every data path registered on a placed component into a
//! pending table with one slot per endpoint, and emits only the paths whose
//! both slots resolved.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    attributes::AttributeRegistry,
    error::{Result, TopomapError},
    memory::SharedRegion,
    topology::{ComponentId, DataPathId, Direction, TopologyGraph},
};

use super::{
    layout::{
        patch_descriptor, write_attribute_section, write_component_record, write_data_path_record,
        ChildTableDescriptor, WORD,
    },
    sizing::{estimate, SizeEstimate},
    ExportState,
};

/// Owner of an attribute that could not be exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeOwner {
    Component(ComponentId),
    DataPath(DataPathId),
}

/// An attribute left out of the region because no codec rule accepted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedAttribute {
    pub owner: AttributeOwner,
    pub name: String,
}

/// Where a component landed in the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub component: ComponentId,
    pub offset: u64,
}

/// Outcome of the tree pass
#[derive(Debug, Clone, Default)]
pub struct TreeLayout {
    /// Components in the order they were written
    pub placements: Vec<Placement>,
    pub dropped: Vec<DroppedAttribute>,
    /// First byte after the tree section
    pub end: u64,
}

/// Endpoint offsets of a data path discovered during the tree pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingPath {
    pub source: Option<u64>,
    pub target: Option<u64>,
}

impl PendingPath {
    /// Both endpoint offsets, if both were placed
    pub fn resolved(&self) -> Option<(u64, u64)> {
        Some((self.source?, self.target?))
    }
}

/// Outcome of the edge pass
#[derive(Debug, Clone, Default)]
pub struct PathSection {
    pub offset: u64,
    pub written: usize,
    /// Paths skipped because an endpoint lies outside the subtree
    pub orphaned: usize,
    pub dropped: Vec<DroppedAttribute>,
}

/// Build the pending table for every path registered on a placed component
///
/// Each path appears once, keyed by its id, however many of its endpoint
/// lists it was found in.
pub fn collect_pending(
    graph: &TopologyGraph,
    placements: &[Placement],
) -> BTreeMap<DataPathId, PendingPath> {
    let mut pending: BTreeMap<DataPathId, PendingPath> = BTreeMap::new();
    for placement in placements {
        for path_id in graph.data_paths_of(placement.component, Direction::Any) {
            let Some(path) = graph.data_path(path_id) else {
                continue;
            };
            let slot = pending.entry(path_id).or_default();
            if path.source() == placement.component {
                slot.source = Some(placement.offset);
            }
            if path.target() == placement.component {
                slot.target = Some(placement.offset);
            }
        }
    }
    pending
}

/// Serializer for one export
///
/// Phases run strictly in order: [`size`](Self::size), then
/// [`write_tree`](Self::write_tree), then [`write_paths`](Self::write_paths).
pub struct GraphSerializer<'a> {
    graph: &'a TopologyGraph,
    registry: &'a AttributeRegistry,
    state: ExportState,
}

impl<'a> GraphSerializer<'a> {
    pub fn new(graph: &'a TopologyGraph, registry: &'a AttributeRegistry) -> Self {
        Self {
            graph,
            registry,
            state: ExportState::Idle,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    fn advance(&mut self, from: ExportState, next: ExportState) -> Result<()> {
        if self.state != from {
            return Err(TopomapError::invalid_parameter(
                "state",
                format!("export cannot enter {:?} from {:?}", next, self.state),
            ));
        }
        debug!("export: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Estimate the bytes the subtree under `root` needs
    pub fn size(&mut self, root: ComponentId) -> Result<SizeEstimate> {
        self.advance(ExportState::Idle, ExportState::Sizing)?;
        estimate(self.graph, root, self.registry)
    }

    /// Write the subtree under `root`, starting at the cursor
    pub fn write_tree(&mut self, region: &mut SharedRegion, root: ComponentId) -> Result<TreeLayout> {
        self.advance(ExportState::Sizing, ExportState::WritingTree)?;
        let graph = self.graph;
        let mut layout = TreeLayout::default();

        // Each entry carries the child-table slot its offset belongs in
        let mut stack: Vec<(ComponentId, Option<u64>)> = vec![(root, None)];
        while let Some((id, table_slot)) = stack.pop() {
            let component = graph
                .component(id)
                .ok_or_else(|| TopomapError::not_found(format!("component #{}", id.index())))?;

            let record = write_component_record(region, component)?;
            let dropped = write_attribute_section(region, &component.attributes, self.registry)?;
            layout.dropped.extend(dropped.into_iter().map(|name| DroppedAttribute {
                owner: AttributeOwner::Component(id),
                name,
            }));

            let children = component.children();
            let descriptor = ChildTableDescriptor {
                offset: region.reserve(children.len() * WORD)?,
                count: children.len() as u64,
            };
            patch_descriptor(region, record.descriptor_slot, descriptor)?;
            if let Some(slot) = table_slot {
                region.patch_u64(slot, record.self_offset)?;
            }

            layout.placements.push(Placement {
                component: id,
                offset: record.self_offset,
            });
            for (i, &child) in children.iter().enumerate().rev() {
                stack.push((child, Some(descriptor.offset + (i * WORD) as u64)));
            }
        }

        layout.end = region.position();
        debug!(
            "tree section holds {} components in {} bytes",
            layout.placements.len(),
            layout.end
        );
        Ok(layout)
    }

    /// Emit every resolved pending path after the tree section
    pub fn write_paths(
        &mut self,
        region: &mut SharedRegion,
        pending: &BTreeMap<DataPathId, PendingPath>,
    ) -> Result<PathSection> {
        self.advance(ExportState::WritingTree, ExportState::WritingEdges)?;
        let graph = self.graph;

        let mut resolved = Vec::with_capacity(pending.len());
        let mut orphaned = 0;
        for (&id, slot) in pending {
            match slot.resolved() {
                Some((source, target)) => resolved.push((id, source, target)),
                None => {
                    debug!("data path #{} leaves the exported subtree, skipped", id.index());
                    orphaned += 1;
                }
            }
        }

        let mut section = PathSection {
            offset: region.write_u64(resolved.len() as u64)?,
            written: resolved.len(),
            orphaned,
            dropped: Vec::new(),
        };

        for (id, source, target) in resolved {
            let path = graph
                .data_path(id)
                .ok_or_else(|| TopomapError::not_found(format!("data path #{}", id.index())))?;
            write_data_path_record(region, source, target, path)?;
            let dropped = write_attribute_section(region, &path.attributes, self.registry)?;
            section.dropped.extend(dropped.into_iter().map(|name| DroppedAttribute {
                owner: AttributeOwner::DataPath(id),
                name,
            }));
        }

        Ok(section)
    }

    /// Run both write passes into `region` and leave the serializer closed
    pub fn write(
        mut self,
        region: &mut SharedRegion,
        root: ComponentId,
    ) -> Result<(TreeLayout, PathSection)> {
        let tree = self.write_tree(region, root)?;
        let pending = collect_pending(self.graph, &tree.placements);
        let paths = self.write_paths(region, &pending)?;
        self.advance(ExportState::WritingEdges, ExportState::Closed)?;
        Ok((tree, paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RegionConfig;
    use crate::topology::{Component, ComponentData, Orientation};
    use tempfile::TempDir;

    #[test]
    fn test_pending_table_deduplicates_by_identity() {
        let mut graph = TopologyGraph::new();
        let node = graph.add_component(None, Component::new(1, ComponentData::Node)).unwrap();
        let a = graph.add_component(Some(node), Component::new(0, ComponentData::Core)).unwrap();
        let b = graph.add_component(Some(node), Component::new(1, ComponentData::Core)).unwrap();
        let both = graph.connect(a, b, Orientation::Bidirectional).unwrap();

        let placements = [
            Placement { component: node, offset: 0 },
            Placement { component: a, offset: 64 },
            Placement { component: b, offset: 128 },
        ];
        let pending = collect_pending(&graph, &placements);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[&both].resolved(), Some((64, 128)));
    }

    #[test]
    fn test_pending_slot_stays_open_for_unplaced_endpoint() {
        let mut graph = TopologyGraph::new();
        let node = graph.add_component(None, Component::new(1, ComponentData::Node)).unwrap();
        let core = graph.add_component(Some(node), Component::new(0, ComponentData::Core)).unwrap();
        let path = graph.connect(node, core, Orientation::Oriented).unwrap();

        let pending = collect_pending(&graph, &[Placement { component: core, offset: 0 }]);
        assert_eq!(pending[&path], PendingPath { source: None, target: Some(0) });
        assert_eq!(pending[&path].resolved(), None);
    }

    #[test]
    fn test_phases_run_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut graph = TopologyGraph::new();
        let node = graph.add_component(None, Component::new(1, ComponentData::Node)).unwrap();
        let registry = AttributeRegistry::default();

        let mut serializer = GraphSerializer::new(&graph, &registry);
        assert_eq!(serializer.state(), ExportState::Idle);

        let config = RegionConfig::new(temp_dir.path().join("phases"), 4096).with_publish_on_rename(false);
        let mut region = SharedRegion::create(config).unwrap();
        let err = serializer.write_tree(&mut region, node).unwrap_err();
        assert!(matches!(err, TopomapError::InvalidParameter { .. }));
        assert_eq!(region.position(), 0);

        serializer.size(node).unwrap();
        assert_eq!(serializer.state(), ExportState::Sizing);
        assert!(serializer.size(node).is_err());

        let (tree, paths) = serializer.write(&mut region, node).unwrap();
        assert_eq!(tree.placements.len(), 1);
        assert_eq!(paths.offset, tree.end);
    }
}
