//! Attribute values and the codec that maps them to region payloads
//!
//! Packing consults the built-in [`catalog`] first and a caller-supplied
//! [`CodecTable`] second. Attributes neither accepts are left out of the
//! export and reported back to the caller.

pub mod catalog;
pub mod codec;
pub mod value;

pub use catalog::default_catalog;
pub use codec::{AttributeRegistry, AttributeRule, CodecTable, PackOutcome};
pub use value::{AttributeMap, AttributeValue};
