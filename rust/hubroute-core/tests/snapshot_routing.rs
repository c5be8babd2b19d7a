use hubroute_core::models::{Highway, Way, ALLOW_ALL, SEGMENT_NORMAL, SEGMENT_SUPER};
use hubroute_core::snapshot::write_snapshot;
use hubroute_core::{
    GraphBuilder, GraphStore, MappedGraph, MemoryGraph, Profile, Router, RouterConfig, SlimCacheConfig, SlimGraph,
};

fn corridor() -> MemoryGraph {
    let mut b = GraphBuilder::new();
    let n: Vec<_> = (0..7).map(|i| b.add_node(48.0, 2.0 + i as f64 * 0.01, ALLOW_ALL)).collect();
    b.set_super(n[2]).set_super(n[4]);
    let road = b.add_way(Way::new(Highway::Secondary, ALLOW_ALL));
    for i in 0..6 {
        b.add_segment_with_distance(n[i], n[i + 1], road, 800, SEGMENT_NORMAL);
    }
    b.add_segment_with_distance(n[2], n[4], road, 1600, SEGMENT_SUPER);
    b.build().unwrap()
}

fn setup_snapshot() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corridor.hrs");
    write_snapshot(&path, &corridor()).unwrap();
    (dir, path)
}

#[test]
fn mapped_snapshot_routes_like_memory_graph() {
    let (_dir, path) = setup_snapshot();
    let mapped = MappedGraph::open(&path).unwrap();
    assert_eq!(mapped.node_count(), 7);
    assert_eq!(mapped.segment_count(), 7);
    assert_eq!(mapped.counts().ways, 1);
    assert_eq!(mapped.manifest().counts, mapped.counts());

    let memory = Router::new(corridor(), Profile::motorcar(), RouterConfig::default()).unwrap();
    let disk = Router::new(mapped, Profile::motorcar(), RouterConfig::default()).unwrap();
    let a = memory.route(0, 6, &memory.new_overlay()).unwrap();
    let b = disk.route(0, 6, &disk.new_overlay()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.nodes(), vec![0, 1, 2, 3, 4, 5, 6]);

    let points = [(48.0, 2.004), (48.0, 2.057)];
    assert_eq!(memory.route_waypoints(&points).unwrap(), disk.route_waypoints(&points).unwrap());
}

#[test]
fn slim_graph_routes_through_small_caches() {
    let (_dir, path) = setup_snapshot();
    let cfg = SlimCacheConfig { nodes_capacity: 2, segments_capacity: 3, ways_capacity: 1 };
    let slim = SlimGraph::open_with_config(&path, cfg).unwrap();
    let router = Router::new(slim, Profile::motorcar(), RouterConfig::default()).unwrap();

    let route = router.route(6, 0, &router.new_overlay()).unwrap();
    assert_eq!(route.nodes(), vec![6, 5, 4, 3, 2, 1, 0]);
    assert_eq!(route.distance_m(), 4800.0);

    let g = router.graph();
    assert!(g.node_misses() > 0);
    assert!(g.segment_hits() + g.segment_misses() > 0);
    assert!(g.way_hits() > 0);
    assert!(g.nodes_cached() <= 2);
    assert!(g.segments_cached() <= 3);
}

#[test]
fn corrupted_snapshot_is_refused() {
    let (_dir, path) = setup_snapshot();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() / 2);
    std::fs::write(&path, bytes).unwrap();
    assert!(MappedGraph::open(&path).is_err());
    assert!(SlimGraph::open(&path).is_err());
}
