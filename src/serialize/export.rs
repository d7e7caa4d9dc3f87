//! Exporting a topology subtree to a region file

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    attributes::{AttributeRegistry, CodecTable},
    error::Result,
    memory::{RegionConfig, SharedRegion},
    topology::{ComponentId, TopologyGraph},
};

use super::{
    serializer::{DroppedAttribute, GraphSerializer},
    sizing::SizeEstimate,
};

/// Summary of one export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub estimate: SizeEstimate,
    /// Region bytes actually used, header excluded
    pub bytes_written: u64,
    /// Region offset of the edge count word
    pub edge_section_offset: u64,
    pub components_written: usize,
    pub paths_written: usize,
    /// Paths left out because an endpoint lies outside the subtree
    pub orphaned_paths: usize,
    /// Attributes left out because no codec rule accepted them
    pub dropped_attributes: Vec<DroppedAttribute>,
}

/// Writer-side handle on an exported region
///
/// The file is complete and visible to readers by the time the handle is
/// returned. Closing (or dropping) the handle unmaps the writer's view; the
/// file stays in place for later readers.
#[derive(Debug)]
pub struct ExportHandle {
    region: Option<SharedRegion>,
    path: PathBuf,
    report: ExportReport,
}

impl ExportHandle {
    /// Whether the writer mapping is still held
    pub fn is_valid(&self) -> bool {
        self.region.is_some()
    }

    /// Release the writer mapping
    pub fn close(&mut self) {
        if self.region.take().is_some() {
            debug!("closed export of {}", self.path.display());
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn report(&self) -> &ExportReport {
        &self.report
    }

    /// The writer's view of the region, until closed
    pub fn region(&self) -> Option<&SharedRegion> {
        self.region.as_ref()
    }
}

/// Serialize the subtree under `root`, plus every data path between its
/// components, into a new file at `path`
///
/// `custom` rules are consulted for attributes the built-in catalog does not
/// encode. On any failure the partially written file is removed and nothing
/// is left at `path`.
pub fn export_topology(
    path: impl AsRef<Path>,
    graph: &TopologyGraph,
    root: ComponentId,
    custom: Option<CodecTable>,
) -> Result<ExportHandle> {
    let path = path.as_ref();
    let registry = AttributeRegistry::new(custom);

    let mut serializer = GraphSerializer::new(graph, &registry);
    let estimate = serializer.size(root)?;
    debug!(
        "export {}: {} components need {} bytes, mapping {}",
        path.display(),
        estimate.components,
        estimate.total,
        estimate.file_size
    );

    let mut region = SharedRegion::create(RegionConfig::new(path, estimate.file_size))?;
    let outcome = serializer.write(&mut region, root);
    let (tree, paths) = match outcome {
        Ok(sections) => sections,
        Err(e) => {
            warn!("export {} failed: {}", path.display(), e);
            region.discard();
            return Err(e);
        }
    };

    if let Err(e) = region.publish() {
        region.discard();
        return Err(e);
    }

    let mut dropped_attributes = tree.dropped;
    dropped_attributes.extend(paths.dropped);

    let report = ExportReport {
        estimate,
        bytes_written: region.position(),
        edge_section_offset: paths.offset,
        components_written: tree.placements.len(),
        paths_written: paths.written,
        orphaned_paths: paths.orphaned,
        dropped_attributes,
    };

    Ok(ExportHandle {
        region: Some(region),
        path: path.to_path_buf(),
        report,
    })
}
