//! Integration tests for region files and the export lifecycle

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tempfile::TempDir;
use topomap::{
    attributes::{AttributeRule, AttributeValue, CodecTable},
    config::HEADER_SIZE,
    export_topology, import_topology,
    memory::{config::staging_path_for, AccessMode, RegionConfig, SharedRegion},
    topology::{Component, ComponentData, TopologyGraph},
    TopomapError,
};

fn single_node(name: &str) -> (TopologyGraph, topomap::ComponentId) {
    let mut graph = TopologyGraph::new();
    let node = graph
        .add_component(None, Component::new(0, ComponentData::Node).with_name(name))
        .unwrap();
    (graph, node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_hidden_until_published() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("region");
        let staging = staging_path_for(&path);

        let mut region = SharedRegion::create(RegionConfig::new(&path, 4096)).unwrap();
        assert!(region.is_writable());
        assert!(!region.is_published());
        assert_eq!(region.info().mode, AccessMode::Write);
        assert!(staging.exists());
        assert!(!path.exists());

        region.write_u64(11).unwrap();
        region.publish().unwrap();
        assert!(region.is_published());
        assert!(path.exists());
        assert!(!staging.exists());

        let reader = SharedRegion::open(&path).unwrap();
        assert_eq!(reader.info().mode, AccessMode::Read);
        assert_eq!(reader.size(), 4096 - HEADER_SIZE);
        assert_eq!(reader.u64_at(0).unwrap(), 11);
    }

    #[test]
    fn test_region_without_staging() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("direct");

        let config = RegionConfig::new(&path, 4096).with_publish_on_rename(false);
        let region = SharedRegion::create(config).unwrap();
        assert!(region.is_published());
        assert!(path.exists());
    }

    #[test]
    fn test_region_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bounds");

        let mut region = SharedRegion::create(RegionConfig::new(&path, 64)).unwrap();
        assert_eq!(region.remaining(), 64 - HEADER_SIZE);
        region.reserve(50).unwrap();

        let err = region.write_u64(1).unwrap_err();
        assert!(matches!(err, TopomapError::InsufficientSpace { requested: 8, available: 6 }));
        assert!(region.seek(64).is_err());
        assert!(region.bytes_at(50, 8).is_err());
    }

    #[test]
    fn test_region_rejects_interior_nul() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nul");

        let mut region = SharedRegion::create(RegionConfig::new(&path, 4096)).unwrap();
        let err = region.write_cstr("L1\0d").unwrap_err();
        assert!(matches!(err, TopomapError::InvalidParameter { .. }));
        assert_eq!(region.position(), 0);
    }

    #[test]
    fn test_failed_create_removes_staging_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oversized");

        // Larger than any filesystem accepts, so extending the file fails
        let err = SharedRegion::create(RegionConfig::new(&path, usize::MAX / 2)).unwrap_err();
        assert!(matches!(err, TopomapError::Io { .. }));
        assert!(!staging_path_for(&path).exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_reader_cannot_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("readonly");

        let mut writer = SharedRegion::create(RegionConfig::new(&path, 4096)).unwrap();
        writer.publish().unwrap();

        let mut reader = SharedRegion::open(&path).unwrap();
        assert!(!reader.is_writable());
        assert!(reader.write_u64(1).is_err());
    }

    #[test]
    fn test_region_size_must_exceed_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("small");

        let err = SharedRegion::create(RegionConfig::new(&path, HEADER_SIZE)).unwrap_err();
        assert!(matches!(err, TopomapError::InvalidParameter { .. }));
        assert!(!staging_path_for(&path).exists());
    }

    #[test]
    fn test_export_handle_close_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("closed");
        let (graph, node) = single_node("solo");

        let mut handle = export_topology(&path, &graph, node, None).unwrap();
        assert!(handle.is_valid());
        assert_eq!(handle.path(), path.as_path());
        assert!(handle.region().is_some_and(|r| r.is_published()));

        handle.close();
        assert!(!handle.is_valid());
        assert!(handle.region().is_none());
        handle.close();

        drop(handle);
        let imported = import_topology(&path, None).unwrap();
        assert_eq!(imported[imported.root().unwrap()].name, "solo");
    }

    #[test]
    fn test_export_replaces_previous_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replaced");

        let (first, root) = single_node("first");
        export_topology(&path, &first, root, None).unwrap();
        let (second, root) = single_node("second");
        export_topology(&path, &second, root, None).unwrap();

        let imported = import_topology(&path, None).unwrap();
        assert_eq!(imported[imported.root().unwrap()].name, "second");
    }

    #[test]
    fn test_failed_export_leaves_nothing_behind() {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("failed");

        // Encodes small while sizing, then far larger than the mapping
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let custom = CodecTable::new().with_rule(
            "growing",
            AttributeRule::custom(
                move |_| {
                    let len = if counter.fetch_add(1, Ordering::SeqCst) == 0 { 1 } else { 1 << 16 };
                    Some(vec![0u8; len])
                },
                |bytes| Some(AttributeValue::Bytes(bytes.to_vec())),
            ),
        );

        let mut graph = TopologyGraph::new();
        let node = graph
            .add_component(
                None,
                Component::new(0, ComponentData::Node).with_attribute("growing", 0u64),
            )
            .unwrap();

        let err = export_topology(&path, &graph, node, Some(custom)).unwrap_err();
        assert!(matches!(err, TopomapError::InsufficientSpace { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!path.exists());
        assert!(!staging_path_for(&path).exists());
    }

    #[test]
    fn test_export_unknown_root() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("unknown");

        let mut bigger = TopologyGraph::new();
        let node = bigger.add_component(None, Component::new(0, ComponentData::Node)).unwrap();
        let core = bigger.add_component(Some(node), Component::new(0, ComponentData::Core)).unwrap();
        let (small, _) = single_node("small");

        let err = export_topology(&path, &small, core, None).unwrap_err();
        assert!(matches!(err, TopomapError::NotFound { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_export_into_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("no/such/dir/topology");
        let (graph, node) = single_node("lost");

        let err = export_topology(&path, &graph, node, None).unwrap_err();
        assert!(matches!(err, TopomapError::Io { .. }));
    }
}
