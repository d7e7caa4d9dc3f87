//! Built-in attribute catalog
//!
//! Well-known hardware attribute names and the one rule each is encoded with.

use std::sync::OnceLock;

use super::codec::{AttributeRule, CodecTable};

/// Intel CAT class of service
pub const CAT_COS: &str = "CATcos";
/// Intel CAT L3 way mask
pub const CAT_L3_MASK: &str = "CATL3mask";
/// GPU MIG instance memory size
pub const MIG_SIZE: &str = "mig_size";
pub const NUMBER_OF_STREAMING_MULTIPROCESSORS: &str = "Number_of_streaming_multiprocessors";
pub const NUMBER_OF_CORES_IN_GPU: &str = "Number_of_cores_in_GPU";
pub const NUMBER_OF_CORES_PER_SM: &str = "Number_of_cores_per_SM";
pub const BUS_WIDTH_BIT: &str = "Bus_Width_bit";
pub const CLOCK_FREQUENCY: &str = "Clock_Frequency";
pub const LATENCY: &str = "latency";
pub const LATENCY_MIN: &str = "latency_min";
pub const LATENCY_MAX: &str = "latency_max";
pub const CUDA_COMPUTE_CAPABILITY: &str = "CUDA_compute_capability";
pub const MIG_UUID: &str = "mig_uuid";
/// Frequency samples as (timestamp, Hz) pairs
pub const FREQ_HISTORY: &str = "freq_history";
/// GPU clock rate with its unit
pub const GPU_CLOCK_RATE: &str = "GPU_Clock_Rate";

/// The catalog shared by every registry
pub fn default_catalog() -> &'static CodecTable {
    static CATALOG: OnceLock<CodecTable> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

fn build_catalog() -> CodecTable {
    let mut table = CodecTable::new();

    for name in [CAT_COS, CAT_L3_MASK] {
        table.insert(name, AttributeRule::u64());
    }
    table.insert(MIG_SIZE, AttributeRule::i64());
    for name in [
        NUMBER_OF_STREAMING_MULTIPROCESSORS,
        NUMBER_OF_CORES_IN_GPU,
        NUMBER_OF_CORES_PER_SM,
        BUS_WIDTH_BIT,
    ] {
        table.insert(name, AttributeRule::i32());
    }
    table.insert(CLOCK_FREQUENCY, AttributeRule::f64());
    for name in [LATENCY, LATENCY_MIN, LATENCY_MAX] {
        table.insert(name, AttributeRule::f32());
    }
    for name in [CUDA_COMPUTE_CAPABILITY, MIG_UUID] {
        table.insert(name, AttributeRule::string());
    }
    table.insert(FREQ_HISTORY, AttributeRule::pair_list());
    table.insert(GPU_CLOCK_RATE, AttributeRule::tagged());

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;

    #[test]
    fn test_catalog_contents() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 15);
        assert!(catalog.contains(FREQ_HISTORY));
        assert!(!catalog.contains("custom_attrib"));
    }

    #[test]
    fn test_catalog_widths() {
        let catalog = default_catalog();
        let width = |name: &str, value: AttributeValue| {
            catalog.get(name).and_then(|rule| rule.encode(&value)).map(|p| p.len())
        };
        assert_eq!(width(CAT_L3_MASK, AttributeValue::U64(0xff)), Some(8));
        assert_eq!(width(MIG_SIZE, AttributeValue::I64(1 << 30)), Some(8));
        assert_eq!(width(BUS_WIDTH_BIT, AttributeValue::I32(5120)), Some(4));
        assert_eq!(width(LATENCY_MAX, AttributeValue::F32(0.5)), Some(4));
        assert_eq!(width(MIG_UUID, AttributeValue::from("MIG-1")), Some(6));
        assert_eq!(
            width(GPU_CLOCK_RATE, AttributeValue::Tagged(1.41, "GHz".into())),
            Some(12)
        );
    }
}
