//! Rebuilds an independent topology graph from a region

use std::collections::HashMap;

use log::debug;

use crate::{
    attributes::AttributeRegistry,
    error::{Result, TopomapError},
    memory::SharedRegion,
    topology::{ComponentId, DataPathType, TopologyGraph},
};

use super::{
    layout::{
        read_attribute_section, read_component_record, read_data_path_record, MIN_COMPONENT_LEN,
        WORD,
    },
    ImportState,
};

/// Map from component self-offsets to reconstructed components
pub type OffsetMap = HashMap<u64, ComponentId>;

/// Deserializer over one region
///
/// Phases run strictly in order: [`read_header`](Self::read_header), then
/// [`read_tree`](Self::read_tree), then [`read_paths`](Self::read_paths).
pub struct GraphDeserializer<'a> {
    region: &'a mut SharedRegion,
    registry: &'a AttributeRegistry,
    state: ImportState,
}

impl<'a> GraphDeserializer<'a> {
    pub fn new(region: &'a mut SharedRegion, registry: &'a AttributeRegistry) -> Self {
        Self {
            region,
            registry,
            state: ImportState::Idle,
        }
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    fn advance(&mut self, from: ImportState, next: ImportState) -> Result<()> {
        if self.state != from {
            return Err(TopomapError::invalid_parameter(
                "state",
                format!("import cannot enter {:?} from {:?}", next, self.state),
            ));
        }
        debug!("import {}: {:?} -> {:?}", self.region.path().display(), self.state, next);
        self.state = next;
        Ok(())
    }

    /// Check the mapped region can hold at least the root component
    pub fn read_header(&mut self) -> Result<()> {
        self.advance(ImportState::Idle, ImportState::ReadingHeader)?;
        let size = self.region.size();
        if size < MIN_COMPONENT_LEN {
            return Err(TopomapError::format(
                0,
                format!(
                    "{} byte region cannot hold a root component of at least {} bytes",
                    size, MIN_COMPONENT_LEN
                ),
            ));
        }
        Ok(())
    }

    /// Rebuild the tree rooted at offset 0 into `graph`
    ///
    /// Returns the offset map and the first byte after the tree section.
    pub fn read_tree(&mut self, graph: &mut TopologyGraph) -> Result<(OffsetMap, u64)> {
        self.advance(ImportState::ReadingHeader, ImportState::ReadingTree)?;
        let mut offsets = OffsetMap::new();
        let mut end = 0u64;

        let mut stack: Vec<(u64, Option<ComponentId>)> = vec![(0, None)];
        while let Some((offset, parent)) = stack.pop() {
            if offsets.contains_key(&offset) {
                return Err(TopomapError::format(offset, "component is referenced twice"));
            }

            self.region.seek(offset)?;
            let (mut component, descriptor) = read_component_record(self.region)?;
            component.attributes = read_attribute_section(self.region, self.registry)?;
            end = end.max(self.region.position());

            let children = descriptor.read_offsets(self.region)?;
            end = end.max(descriptor.offset + (children.len() * WORD) as u64);

            let id = graph.add_component(parent, component)?;
            offsets.insert(offset, id);
            stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
        }

        debug!("read {} components, tree section ends at {}", offsets.len(), end);
        Ok((offsets, end))
    }

    /// Rebuild the data paths stored at `section` between components in `offsets`
    pub fn read_paths(
        &mut self,
        graph: &mut TopologyGraph,
        offsets: &OffsetMap,
        section: u64,
    ) -> Result<usize> {
        self.advance(ImportState::ReadingTree, ImportState::ReadingEdges)?;
        self.region.seek(section)?;
        let count = self.region.read_u64()?;

        for _ in 0..count {
            let record_at = self.region.position();
            let record = read_data_path_record(self.region)?;
            let endpoint = |offset: u64| {
                offsets.get(&offset).copied().ok_or_else(|| {
                    TopomapError::format(
                        record_at,
                        format!("data path endpoint {} is not a component of this region", offset),
                    )
                })
            };
            let source = endpoint(record.source_offset)?;
            let target = endpoint(record.target_offset)?;

            let attributes = read_attribute_section(self.region, self.registry)?;
            let id = graph.add_data_path(
                source,
                target,
                record.orientation,
                DataPathType(record.dp_type),
                record.bandwidth,
                record.latency,
            )?;
            if let Some(path) = graph.data_path_mut(id) {
                path.attributes = attributes;
            }
        }

        debug!("read {} data paths", count);
        Ok(count as usize)
    }

    /// Run every phase and return the reconstructed graph
    pub fn run(mut self) -> Result<TopologyGraph> {
        self.read_header()?;
        let mut graph = TopologyGraph::new();
        let (offsets, end) = self.read_tree(&mut graph)?;
        self.read_paths(&mut graph, &offsets, end)?;
        self.advance(ImportState::ReadingEdges, ImportState::Closed)?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeMap;
    use crate::memory::RegionConfig;
    use crate::serialize::layout::{attribute_section_len, component_record_len};
    use crate::topology::{Component, ComponentData};
    use tempfile::TempDir;

    #[test]
    fn test_min_component_len_matches_layout() {
        let registry = AttributeRegistry::default();
        let bare = Component::new(0, ComponentData::Node);
        assert_eq!(
            component_record_len(&bare) + attribute_section_len(&AttributeMap::new(), &registry),
            MIN_COMPONENT_LEN
        );
    }

    #[test]
    fn test_phases_run_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("phases");
        let mut writer = SharedRegion::create(RegionConfig::new(&path, 4096)).unwrap();
        writer.publish().unwrap();

        let registry = AttributeRegistry::default();
        let mut region = SharedRegion::open(&path).unwrap();
        let mut deserializer = GraphDeserializer::new(&mut region, &registry);
        assert_eq!(deserializer.state(), ImportState::Idle);

        let mut graph = TopologyGraph::new();
        let err = deserializer.read_tree(&mut graph).unwrap_err();
        assert!(matches!(err, TopomapError::InvalidParameter { .. }));
        assert!(graph.is_empty());

        deserializer.read_header().unwrap();
        assert_eq!(deserializer.state(), ImportState::ReadingHeader);
        assert!(deserializer.read_header().is_err());
    }
}
