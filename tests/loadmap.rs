use serde_json::json;

use k8s_loadviz::loadviz::heatmap::HeatMapScheme;
use k8s_loadviz::loadviz::layout::{LayoutMode, RenderContext, build_load_map};
use k8s_loadviz::loadviz::snapshot::{MetricsFeed, Resource, Snapshot};
use k8s_loadviz::loadviz::units::MemoryConvention;
use k8s_loadviz::models::views::LoadMapView;

fn feed() -> MetricsFeed {
    let raw = json!([
        {"items": [{
            "metadata": {"name": "worker-1", "uid": "n-1"},
            "status": {
                "capacity": {"cpu": "4", "memory": "16Gi"},
                "allocatable": {"cpu": "4", "memory": "15Gi"},
                "conditions": [{"type": "Ready", "status": "True", "message": "kubelet ready"}],
                "nodeInfo": {"containerRuntimeVersion": "containerd://1.7.2"}
            }
        }]},
        {"items": [{
            "metadata": {"name": "worker-1"},
            "usage": {"cpu": "2", "memory": "8Gi"}
        }]},
        {"items": [
            {
                "metadata": {"name": "api", "namespace": "prod", "uid": "p-1"},
                "spec": {"nodeName": "worker-1"},
                "status": {
                    "phase": "Running",
                    "conditions": [{"type": "Ready", "status": "True"}]
                }
            },
            {
                "metadata": {"name": "worker", "namespace": "prod", "uid": "p-2"},
                "spec": {"nodeName": "worker-1"},
                "status": {
                    "phase": "Running",
                    "conditions": [{"type": "Ready", "status": "True"}]
                }
            }
        ]},
        {"items": [
            {
                "metadata": {"name": "api", "namespace": "prod"},
                "containers": [{"name": "app", "usage": {"cpu": "1500m", "memory": "6Gi"}}]
            },
            {
                "metadata": {"name": "worker", "namespace": "prod"},
                "containers": [{"name": "app", "usage": {"cpu": "500m", "memory": "2Gi"}}]
            }
        ]}
    ]);
    MetricsFeed::from_combined(&raw).expect("well-formed feed")
}

fn ctx() -> RenderContext {
    RenderContext {
        resource: Resource::Cpu,
        mode: LayoutMode::Strip,
        node_side: 100.0,
        drawing_area_width: 800.0,
        scheme: HeatMapScheme::Anchored,
    }
}

#[test]
fn end_to_end_cpu_load_map() {
    let snapshot = Snapshot::build(&feed(), MemoryConvention::Decimal);
    assert!(snapshot.warnings.is_empty());

    let map = build_load_map(&snapshot, &ctx());
    assert_eq!(map.nodes.len(), 1);
    assert!(map.warnings.is_empty());

    let node = &map.nodes[0];
    // cpuUsage 2 of cpuCapacity 4
    assert_eq!(node.load, Some(50.0));
    // midpoint between the green and yellow anchors
    assert_eq!(node.color.unwrap().css(), "rgb(128,255,0)");

    // two tiles in 3:1 area ratio, fully tiling the node square
    assert_eq!(node.tiles.len(), 2);
    let big = &node.tiles[0];
    let small = &node.tiles[1];
    assert_eq!(big.pod, "api.prod");
    assert_eq!(small.pod, "worker.prod");
    assert!((big.rect.area() / small.rect.area() - 3.0).abs() < 1e-9);
    assert!((big.rect.area() + small.rect.area() - 10_000.0).abs() < 1e-9);

    // non-overlapping: the big strip consumes the top 75 units of height
    assert_eq!(big.rect.h, 75.0);
    assert_eq!(small.rect.y, big.rect.y + big.rect.h);
}

#[test]
fn memory_map_uses_decoded_byte_quantities() {
    let snapshot = Snapshot::build(&feed(), MemoryConvention::Decimal);
    let node = &snapshot.nodes["worker-1"];

    // decimal convention: 16Gi -> 16e9 bytes
    assert_eq!(node.mem_capacity, 16e9);
    assert_eq!(node.mem_usage, Some(8e9));

    let map = build_load_map(
        &snapshot,
        &RenderContext {
            resource: Resource::Memory,
            ..ctx()
        },
    );
    assert_eq!(map.nodes[0].load, Some(50.0));
    // api uses 6Gi of the node's 8Gi -> 75% of used resources
    assert_eq!(map.nodes[0].tiles[0].rect.h, 75.0);
}

#[test]
fn load_map_view_serializes_css_colors() {
    let snapshot = Snapshot::build(&feed(), MemoryConvention::Decimal);
    let map = build_load_map(&snapshot, &ctx());
    let view = LoadMapView::from_map(map, Resource::Cpu, snapshot.taken_at);

    let body = serde_json::to_value(&view).expect("serializable view");
    assert_eq!(body["resource"], "cpu");
    assert_eq!(body["nodes"][0]["color"], "rgb(128,255,0)");
    let tile = &body["nodes"][0]["tiles"][0];
    assert_eq!(tile["pod"], "api.prod");
    // Rect fields are flattened into the tile object
    assert_eq!(tile["w"], 100.0);
    assert_eq!(tile["h"], 75.0);
    // 75% of node usage -> between yellow and red
    assert_eq!(tile["color"], "rgb(255,191,0)");
}

#[test]
fn stale_node_is_skipped_but_map_survives() {
    let raw = json!([
        {"items": [
            {
                "metadata": {"name": "worker-1", "uid": "n-1"},
                "status": {
                    "capacity": {"cpu": "4", "memory": "16Gi"},
                    "allocatable": {"cpu": "4", "memory": "15Gi"},
                    "conditions": [{"type": "Ready", "status": "True"}],
                    "nodeInfo": {"containerRuntimeVersion": "containerd://1.7.2"}
                }
            },
            {
                "metadata": {"name": "worker-2", "uid": "n-2"},
                "status": {
                    "capacity": {"cpu": "4", "memory": "16Gi"},
                    "allocatable": {"cpu": "4", "memory": "15Gi"},
                    "conditions": [{"type": "Ready", "status": "True"}],
                    "nodeInfo": {"containerRuntimeVersion": "containerd://1.7.2"}
                }
            }
        ]},
        // metrics only for worker-1; worker-2 never reports
        {"items": [{
            "metadata": {"name": "worker-1"},
            "usage": {"cpu": "2", "memory": "8Gi"}
        }]},
        {"items": []},
        {"items": []}
    ]);

    let feed = MetricsFeed::from_combined(&raw).expect("well-formed feed");
    let snapshot = Snapshot::build(&feed, MemoryConvention::Decimal);
    let map = build_load_map(&snapshot, &ctx());

    assert_eq!(map.nodes.len(), 1);
    assert_eq!(map.nodes[0].node, "worker-1");
    assert_eq!(map.warnings.len(), 1);
}
