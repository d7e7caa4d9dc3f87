//! File-backed shared memory regions holding serialized topologies

pub mod config;
pub mod regions;

pub use config::{AccessMode, RegionConfig};
pub use regions::{page_size, round_to_page, RegionInfo, SharedRegion};
