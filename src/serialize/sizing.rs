//! Dry size estimate run before a region is created

use serde::{Deserialize, Serialize};

use crate::{
    attributes::AttributeRegistry,
    config::HEADER_SIZE,
    error::{Result, TopomapError},
    memory::round_to_page,
    topology::{ComponentId, Direction, TopologyGraph},
};

use super::layout::{attribute_section_len, component_record_len, data_path_record_len, WORD};

/// Byte budget for exporting one subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub components: usize,
    /// Records, attribute sections and child tables
    pub tree_bytes: usize,
    /// Edge count word plus every data path record seen from each endpoint
    pub path_bytes: usize,
    /// Header plus tree and path bytes, before rounding
    pub total: usize,
    /// `total` rounded up to a whole page; the file length to create
    pub file_size: usize,
}

/// Walk the subtree under `root` and sum the bytes its export needs
///
/// A bidirectional path is counted from each endpoint that lies in the
/// subtree, and paths whose other endpoint lies outside are counted too.
/// The writer emits each path at most once, so the estimate is an upper
/// bound on what is written.
pub fn estimate(
    graph: &TopologyGraph,
    root: ComponentId,
    registry: &AttributeRegistry,
) -> Result<SizeEstimate> {
    if graph.component(root).is_none() {
        return Err(TopomapError::not_found(format!("root component #{}", root.index())));
    }

    let mut components = 0;
    let mut tree_bytes = 0;
    let mut path_bytes = WORD;

    for id in graph.subtree(root) {
        let component = &graph[id];
        components += 1;
        tree_bytes += component_record_len(component)
            + attribute_section_len(&component.attributes, registry)
            + component.children().len() * WORD;

        for path_id in graph.data_paths_of(id, Direction::Any) {
            if let Some(path) = graph.data_path(path_id) {
                path_bytes += data_path_record_len(path, registry);
            }
        }
    }

    let total = HEADER_SIZE + tree_bytes + path_bytes;
    Ok(SizeEstimate {
        components,
        tree_bytes,
        path_bytes,
        total,
        file_size: round_to_page(total),
    })
}
