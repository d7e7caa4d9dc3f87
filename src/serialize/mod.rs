//! Relocatable serialization of topology graphs into shared regions

pub mod deserializer;
pub mod export;
pub mod import;
pub mod layout;
pub mod serializer;
pub mod sizing;

pub use deserializer::GraphDeserializer;
pub use export::{export_topology, ExportHandle, ExportReport};
pub use import::import_topology;
pub use layout::ChildTableDescriptor;
pub use serializer::{AttributeOwner, DroppedAttribute, GraphSerializer};
pub use sizing::{estimate, SizeEstimate};

/// Export progress; strictly sequential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Sizing,
    WritingTree,
    WritingEdges,
    Closed,
}

/// Import progress; strictly sequential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    ReadingHeader,
    ReadingTree,
    ReadingEdges,
    Closed,
}
