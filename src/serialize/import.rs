//! Importing a topology from a region file

use std::path::Path;

use crate::{
    attributes::{AttributeRegistry, CodecTable},
    error::Result,
    memory::SharedRegion,
    topology::TopologyGraph,
};

use super::deserializer::GraphDeserializer;

/// Map the region at `path` read-only and rebuild its topology
///
/// The returned graph is independent of the file; its `root()` is the
/// exported subtree's root. `custom` rules decode attributes the built-in
/// catalog does not know; names known to neither come back as raw bytes.
pub fn import_topology(path: impl AsRef<Path>, custom: Option<CodecTable>) -> Result<TopologyGraph> {
    let registry = AttributeRegistry::new(custom);
    let mut region = SharedRegion::open(path)?;
    GraphDeserializer::new(&mut region, &registry).run()
}
