//! Record layouts inside a topology region
//!
//! ```text
//! component   {u64 kind}{i32 id}{u64 table offset}{u64 child count}{name\0}{kind fields}
//! attributes  {u64 count} count x {name\0}{u64 len}{payload}
//! child table count x {u64 child offset}
//! edges       {u64 count} count x {u64 src}{u64 dst}{u32 orientation}{i32 type}{f64 bw}{f64 lat}{attributes}
//! ```
//!
//! All words are native-endian and unaligned.

use log::warn;

use crate::{
    attributes::{AttributeMap, AttributeRegistry, PackOutcome},
    error::{Result, TopomapError},
    memory::SharedRegion,
    topology::{CacheInfo, ChipInfo, Component, ComponentData, ComponentKind, DataPath, Orientation},
};

/// Width of every offset and count word
pub const WORD: usize = 8;

/// Smallest component: fixed payload, empty name, empty attribute section
pub const MIN_COMPONENT_LEN: usize = WORD + 4 + 2 * WORD + 1 + WORD;

/// Bytes of a data path record before its attribute section
pub const DATA_PATH_FIXED_LEN: usize = 2 * WORD + 4 + 4 + 8 + 8;

/// On-disk reference to a component's child-offset table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildTableDescriptor {
    /// Region offset of the first child offset
    pub offset: u64,
    /// Number of children
    pub count: u64,
}

impl ChildTableDescriptor {
    pub const ENCODED_LEN: usize = 2 * WORD;

    /// Bytes the table itself occupies
    pub fn table_len(&self) -> Option<usize> {
        usize::try_from(self.count).ok()?.checked_mul(WORD)
    }

    /// Read the child offsets this descriptor points at
    pub fn read_offsets(&self, region: &SharedRegion) -> Result<Vec<u64>> {
        let len = self
            .table_len()
            .ok_or_else(|| TopomapError::format(self.offset, "child count overflows"))?;
        let table = region.bytes_at(self.offset, len)?;
        Ok(table
            .chunks_exact(WORD)
            .map(|chunk| {
                let mut word = [0u8; WORD];
                word.copy_from_slice(chunk);
                u64::from_ne_bytes(word)
            })
            .collect())
    }
}

fn cstr_len(value: &str) -> usize {
    value.len() + 1
}

// ----- component records -----

impl ComponentData {
    /// Bytes of the kind-specific fields
    pub(crate) fn encoded_len(&self) -> usize {
        match self {
            ComponentData::Cache(cache) => 4 + cstr_len(&cache.cache_type) + 8 + 4 + 4,
            ComponentData::Subdivision { .. } => 4,
            ComponentData::Numa { .. } | ComponentData::Storage { .. } => 8,
            ComponentData::Chip(chip) => cstr_len(&chip.vendor) + cstr_len(&chip.model) + 4,
            ComponentData::Memory { .. } => 8 + 1,
            ComponentData::Generic
            | ComponentData::Thread
            | ComponentData::Core
            | ComponentData::Node
            | ComponentData::Topology => 0,
        }
    }

    pub(crate) fn encode(&self, region: &mut SharedRegion) -> Result<()> {
        match self {
            ComponentData::Cache(cache) => {
                region.write_i32(cache.level)?;
                region.write_cstr(&cache.cache_type)?;
                region.write_i64(cache.size)?;
                region.write_i32(cache.associativity_ways)?;
                region.write_i32(cache.line_size)?;
            }
            ComponentData::Subdivision { subdivision_type } => {
                region.write_i32(*subdivision_type)?;
            }
            ComponentData::Numa { size } | ComponentData::Storage { size } => {
                region.write_i64(*size)?;
            }
            ComponentData::Chip(chip) => {
                region.write_cstr(&chip.vendor)?;
                region.write_cstr(&chip.model)?;
                region.write_i32(chip.chip_type)?;
            }
            ComponentData::Memory { size, is_volatile } => {
                region.write_i64(*size)?;
                region.write_u8(u8::from(*is_volatile))?;
            }
            ComponentData::Generic
            | ComponentData::Thread
            | ComponentData::Core
            | ComponentData::Node
            | ComponentData::Topology => {}
        }
        Ok(())
    }

    pub(crate) fn decode(kind: ComponentKind, region: &mut SharedRegion) -> Result<Self> {
        Ok(match kind {
            ComponentKind::Generic => ComponentData::Generic,
            ComponentKind::Thread => ComponentData::Thread,
            ComponentKind::Core => ComponentData::Core,
            ComponentKind::Node => ComponentData::Node,
            ComponentKind::Topology => ComponentData::Topology,
            ComponentKind::Cache => ComponentData::Cache(CacheInfo {
                level: region.read_i32()?,
                cache_type: region.read_cstr()?,
                size: region.read_i64()?,
                associativity_ways: region.read_i32()?,
                line_size: region.read_i32()?,
            }),
            ComponentKind::Subdivision => ComponentData::Subdivision {
                subdivision_type: region.read_i32()?,
            },
            ComponentKind::Numa => ComponentData::Numa {
                size: region.read_i64()?,
            },
            ComponentKind::Storage => ComponentData::Storage {
                size: region.read_i64()?,
            },
            ComponentKind::Chip => ComponentData::Chip(ChipInfo {
                vendor: region.read_cstr()?,
                model: region.read_cstr()?,
                chip_type: region.read_i32()?,
            }),
            ComponentKind::Memory => {
                let size = region.read_i64()?;
                let flag_at = region.position();
                let is_volatile = match region.read_u8()? {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(TopomapError::format(
                            flag_at,
                            format!("volatile flag holds {}", other),
                        ))
                    }
                };
                ComponentData::Memory { size, is_volatile }
            }
        })
    }
}

/// Bytes of a component's fixed payload
pub(crate) fn component_record_len(component: &Component) -> usize {
    WORD + 4 + ChildTableDescriptor::ENCODED_LEN + cstr_len(&component.name) + component.data.encoded_len()
}

/// Where a freshly written component record lives
#[derive(Debug, Clone, Copy)]
pub(crate) struct WrittenRecord {
    pub self_offset: u64,
    /// Offset of the descriptor slot to patch once the child table exists
    pub descriptor_slot: u64,
}

/// Write a component's fixed payload with an empty child descriptor
pub(crate) fn write_component_record(
    region: &mut SharedRegion,
    component: &Component,
) -> Result<WrittenRecord> {
    let self_offset = region.write_u64(component.kind().tag())?;
    region.write_i32(component.id)?;
    let descriptor_slot = region.reserve(ChildTableDescriptor::ENCODED_LEN)?;
    region.write_cstr(&component.name)?;
    component.data.encode(region)?;
    Ok(WrittenRecord {
        self_offset,
        descriptor_slot,
    })
}

/// Fill a reserved descriptor slot
pub(crate) fn patch_descriptor(
    region: &mut SharedRegion,
    slot: u64,
    descriptor: ChildTableDescriptor,
) -> Result<()> {
    region.patch_u64(slot, descriptor.offset)?;
    region.patch_u64(slot + WORD as u64, descriptor.count)
}

/// Read a component's fixed payload at the cursor
pub(crate) fn read_component_record(
    region: &mut SharedRegion,
) -> Result<(Component, ChildTableDescriptor)> {
    let tag_at = region.position();
    let tag = region.read_u64()?;
    let kind = ComponentKind::from_tag(tag)
        .ok_or_else(|| TopomapError::format(tag_at, format!("unknown component kind tag {}", tag)))?;
    let id = region.read_i32()?;
    let descriptor = ChildTableDescriptor {
        offset: region.read_u64()?,
        count: region.read_u64()?,
    };
    let name = region.read_cstr()?;
    let data = ComponentData::decode(kind, region)?;
    Ok((Component::new(id, data).with_name(name), descriptor))
}

// ----- attribute sections -----

/// Bytes an attribute section occupies under `registry`
pub(crate) fn attribute_section_len(attributes: &AttributeMap, registry: &AttributeRegistry) -> usize {
    WORD + attributes
        .iter()
        .filter_map(|(name, value)| registry.record_len(name, value))
        .sum::<usize>()
}

/// Write an attribute section and return the names that were dropped
///
/// Records are written in name order so identical maps give identical bytes.
pub(crate) fn write_attribute_section(
    region: &mut SharedRegion,
    attributes: &AttributeMap,
    registry: &AttributeRegistry,
) -> Result<Vec<String>> {
    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort_unstable();

    let mut packed = Vec::with_capacity(names.len());
    let mut dropped = Vec::new();
    for name in names {
        match registry.pack(name, &attributes[name]) {
            PackOutcome::Packed(payload) => packed.push((name, payload)),
            PackOutcome::Unsupported => {
                warn!("attribute {} has no codec rule and is not exported", name);
                dropped.push(name.clone());
            }
        }
    }

    region.write_u64(packed.len() as u64)?;
    for (name, payload) in packed {
        region.write_cstr(name)?;
        region.write_u64(payload.len() as u64)?;
        region.write_bytes(&payload)?;
    }
    Ok(dropped)
}

/// Read an attribute section at the cursor
pub(crate) fn read_attribute_section(
    region: &mut SharedRegion,
    registry: &AttributeRegistry,
) -> Result<AttributeMap> {
    let count = region.read_u64()?;
    let mut attributes = AttributeMap::new();
    for _ in 0..count {
        let name = region.read_cstr()?;
        let len_at = region.position();
        let len = usize::try_from(region.read_u64()?)
            .map_err(|_| TopomapError::format(len_at, "payload length overflows"))?;
        let payload_at = region.position();
        let payload = region.read_bytes(len)?.to_vec();
        let value = registry.unpack(&name, &payload, payload_at)?;
        attributes.insert(name, value);
    }
    Ok(attributes)
}

// ----- data path records -----

/// Bytes of a data path record including its attributes
pub(crate) fn data_path_record_len(path: &DataPath, registry: &AttributeRegistry) -> usize {
    DATA_PATH_FIXED_LEN + attribute_section_len(&path.attributes, registry)
}

/// Fixed part of a data path record as read back from a region
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DataPathRecord {
    pub source_offset: u64,
    pub target_offset: u64,
    pub orientation: Orientation,
    pub dp_type: i32,
    pub bandwidth: f64,
    pub latency: f64,
}

pub(crate) fn write_data_path_record(
    region: &mut SharedRegion,
    source_offset: u64,
    target_offset: u64,
    path: &DataPath,
) -> Result<()> {
    region.write_u64(source_offset)?;
    region.write_u64(target_offset)?;
    region.write_u32(path.orientation().tag())?;
    region.write_i32(path.dp_type().0)?;
    region.write_f64(path.bandwidth)?;
    region.write_f64(path.latency)?;
    Ok(())
}

pub(crate) fn read_data_path_record(region: &mut SharedRegion) -> Result<DataPathRecord> {
    let source_offset = region.read_u64()?;
    let target_offset = region.read_u64()?;
    let tag_at = region.position();
    let tag = region.read_u32()?;
    let orientation = Orientation::from_tag(tag)
        .ok_or_else(|| TopomapError::format(tag_at, format!("unknown orientation tag {}", tag)))?;
    Ok(DataPathRecord {
        source_offset,
        target_offset,
        orientation,
        dp_type: region.read_i32()?,
        bandwidth: region.read_f64()?,
        latency: region.read_f64()?,
    })
}
