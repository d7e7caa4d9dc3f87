//! In-memory topology model: a component tree plus a data-path graph

pub mod component;
pub mod datapath;
pub mod graph;
pub mod kind;

pub use component::{Component, ComponentId};
pub use datapath::{DataPath, DataPathId, DataPathType, Direction, Orientation, UNKNOWN};
pub use graph::TopologyGraph;
pub use kind::{CacheInfo, ChipInfo, ComponentData, ComponentKind};
