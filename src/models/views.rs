use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::loadviz::layout::{LoadMap, NodeTiles, Rect};
use crate::loadviz::snapshot::{NodeState, Resource, Snapshot, Warning};

// JSON views served to the rendering front end. Colors leave the process
// as `rgb(r,g,b)` strings, which is what the SVG layer paints with.

#[derive(Debug, Clone, Serialize)]
pub struct LoadMapView {
    pub resource: Resource,
    pub taken_at: Option<DateTime<Utc>>,
    pub height: f64,
    pub nodes: Vec<NodeTilesView>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeTilesView {
    pub node: String,
    pub state: NodeState,
    pub x: f64,
    pub y: f64,
    pub side: f64,
    pub load: Option<f64>,
    pub color: Option<String>,
    pub tooltip: String,
    pub tiles: Vec<TileView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileView {
    pub pod: String,
    #[serde(flatten)]
    pub rect: Rect,
    pub color: String,
    pub tooltip: String,
}

impl LoadMapView {
    pub fn from_map(map: LoadMap, resource: Resource, taken_at: Option<DateTime<Utc>>) -> Self {
        Self {
            resource,
            taken_at,
            height: map.height,
            nodes: map.nodes.into_iter().map(NodeTilesView::from_tiles).collect(),
            warnings: map.warnings,
        }
    }
}

impl NodeTilesView {
    fn from_tiles(nt: NodeTiles) -> Self {
        Self {
            node: nt.node,
            state: nt.state,
            x: nt.x,
            y: nt.y,
            side: nt.side,
            load: nt.load,
            color: nt.color.map(|c| c.css()),
            tooltip: nt.tooltip,
            tiles: nt
                .tiles
                .into_iter()
                .map(|t| TileView {
                    pod: t.pod,
                    rect: t.rect,
                    color: t.color.css(),
                    tooltip: t.tooltip,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterSummaryView {
    pub taken_at: Option<DateTime<Utc>>,
    pub cpu_capacity: f64,
    pub cpu_allocatable: f64,
    pub cpu_used_by_pods: f64,
    pub mem_capacity: f64,
    pub mem_allocatable: f64,
    pub mem_used_by_pods: f64,
    pub nodes: Vec<NodeSummaryView>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummaryView {
    pub name: String,
    pub state: NodeState,
    pub container_runtime: String,
    pub cpu_capacity: f64,
    pub cpu_load: Option<f64>,
    pub mem_capacity: f64,
    pub mem_load: Option<f64>,
    pub pods_running: usize,
    pub pods_not_running: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceUsageView {
    pub namespace: String,
    pub cpu: f64,
    pub memory: f64,
    /// Share of the cluster-wide pod usage, per resource.
    pub cpu_share: f64,
    pub mem_share: f64,
}

pub fn cluster_summary(snapshot: &Snapshot) -> ClusterSummaryView {
    use crate::loadviz::load::compute_load;

    ClusterSummaryView {
        taken_at: snapshot.taken_at,
        cpu_capacity: snapshot.cpu_capacity,
        cpu_allocatable: snapshot.cpu_allocatable,
        cpu_used_by_pods: snapshot.cpu_used_by_pods,
        mem_capacity: snapshot.mem_capacity,
        mem_allocatable: snapshot.mem_allocatable,
        mem_used_by_pods: snapshot.mem_used_by_pods,
        nodes: snapshot
            .nodes
            .values()
            .map(|n| NodeSummaryView {
                name: n.name.clone(),
                state: n.state,
                container_runtime: n.container_runtime.clone(),
                cpu_capacity: n.cpu_capacity,
                cpu_load: n.cpu_usage.map(|u| compute_load(u, n.cpu_capacity)),
                mem_capacity: n.mem_capacity,
                mem_load: n.mem_usage.map(|u| compute_load(u, n.mem_capacity)),
                pods_running: n.pods_running.len(),
                pods_not_running: n.pods_not_running.len(),
            })
            .collect(),
        warnings: snapshot.warnings.clone(),
    }
}

pub fn namespace_usage(snapshot: &Snapshot) -> Vec<NamespaceUsageView> {
    snapshot
        .namespace_usage
        .iter()
        .map(|(ns, usage)| NamespaceUsageView {
            namespace: ns.clone(),
            cpu: usage.cpu,
            memory: usage.memory,
            cpu_share: share(usage.cpu, snapshot.cpu_used_by_pods),
            mem_share: share(usage.memory, snapshot.mem_used_by_pods),
        })
        .collect()
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        (1e4 * part / total).round() / 1e2
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadviz::snapshot::ResourceUsage;

    #[test]
    fn namespace_shares_sum_to_hundred() {
        let mut snap = Snapshot::default();
        snap.cpu_used_by_pods = 2.0;
        snap.mem_used_by_pods = 4e9;
        snap.namespace_usage.insert(
            "default".to_string(),
            ResourceUsage { cpu: 1.5, memory: 3e9 },
        );
        snap.namespace_usage.insert(
            "kube-system".to_string(),
            ResourceUsage { cpu: 0.5, memory: 1e9 },
        );

        let views = namespace_usage(&snap);
        let cpu_total: f64 = views.iter().map(|v| v.cpu_share).sum();
        assert_eq!(cpu_total, 100.0);
        assert_eq!(views[0].namespace, "default");
        assert_eq!(views[0].cpu_share, 75.0);
    }

    #[test]
    fn empty_cluster_has_zero_shares() {
        let snap = Snapshot::default();
        assert!(namespace_usage(&snap).is_empty());
        let summary = cluster_summary(&snap);
        assert_eq!(summary.cpu_capacity, 0.0);
    }
}
