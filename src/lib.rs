//! # Topomap - Relocatable Topology Maps in Shared Memory
//!
//! Topomap serializes a hardware topology (a tree of components such as
//! nodes, sockets, NUMA domains, caches and cores, plus a graph of data
//! paths between them) into a file-backed memory region. Any number of
//! processes can then map the file read-only and rebuild an equivalent,
//! independent graph.
//!
//! ## Features
//!
//! - **Position-independent layout**: every link is an offset from the region start
//! - **Arena-backed model**: components and data paths are addressed by typed ids
//! - **Attribute codecs**: built-in catalog plus caller-supplied rules
//! - **Exact sizing**: the region is sized before anything is written
//! - **Publish on rename**: readers never observe a partially written file
//!
//! ## Layout
//!
//! ```text
//! ┌────────────┬──────────────────────────────┬──────────────────────┐
//! │ u64 length │ component tree (pre-order)   │ u64 count + paths    │
//! └────────────┴──────────────────────────────┴──────────────────────┘
//!              ▲ offset 0 = root component
//! ```

pub mod attributes;
pub mod error;
pub mod memory;
pub mod serialize;
pub mod topology;

// Main API re-exports
pub use attributes::{AttributeRule, AttributeValue, CodecTable};
pub use error::{Result, TopomapError};
pub use memory::{RegionConfig, SharedRegion};
pub use serialize::{export_topology, import_topology, ExportHandle, ExportReport, SizeEstimate};
pub use topology::{
    Component, ComponentData, ComponentId, ComponentKind, DataPath, DataPathId, DataPathType,
    Direction, Orientation, TopologyGraph,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Size of the length word at the start of every region file
    pub const HEADER_SIZE: usize = 8;

    /// Page size assumed when the system cannot report one
    pub const DEFAULT_PAGE_SIZE: usize = 4096;

    /// Mode bits for newly created region files
    pub const DEFAULT_PERMISSIONS: u32 = 0o600;

    /// Suffix of the staging file an export writes before publishing
    pub const PARTIAL_SUFFIX: &str = ".partial";
}
