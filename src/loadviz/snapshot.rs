use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::models::k8s;

use super::load::compute_load;
use super::units::{MemoryConvention, decode_cpu, decode_memory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    #[default]
    Cpu,
    Memory,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Cpu => write!(f, "cpu"),
            Resource::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum NodeState {
    Ready,
    KernelDeadlock,
    NetworkUnavailable,
    OutOfDisk,
    MemoryPressure,
    DiskPressure,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    fn parse(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PodCondition {
    Ready,
    ContainersReady,
    PodScheduled,
    Initialized,
    #[default]
    PodNotScheduled,
}

/// Data-quality problem found while building a snapshot or laying out a
/// render pass. Warnings are reported, never thrown; the entity they name
/// is skipped and the pass continues.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    NoMetric { node: String, resource: Resource },
    ZeroMetric { node: String, resource: Resource },
    BadQuantity { entity: String, field: String, detail: String },
    UnknownNode { pod: String, node: String },
    UnknownPod { pod: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoMetric { node, resource } => {
                write!(f, "no {} metric on node {}", resource, node)
            }
            Warning::ZeroMetric { node, resource } => {
                write!(f, "ignoring node {} with {} usage equal to zero", node, resource)
            }
            Warning::BadQuantity {
                entity,
                field,
                detail,
            } => write!(f, "bad quantity for {} on {}: {}", field, entity, detail),
            Warning::UnknownNode { pod, node } => {
                write!(f, "pod {} references unknown node {}", pod, node)
            }
            Warning::UnknownPod { pod } => write!(f, "metrics for unknown pod {}", pod),
        }
    }
}

/// Whole-snapshot rejection: the feed itself is unusable. The previous
/// snapshot stays live and nothing is rendered from this one.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("expected {expected} API documents, got {got}")]
    WrongDocumentCount { expected: usize, got: usize },
    #[error("API document {index} is not a Kubernetes list: {source}")]
    MalformedDocument {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One refresh worth of raw API documents, in the order the original feed
/// file carried them: nodes, node metrics, pods, pod metrics.
#[derive(Debug, Default)]
pub struct MetricsFeed {
    pub nodes: k8s::NodeList,
    pub node_metrics: k8s::NodeMetricsList,
    pub pods: k8s::PodList,
    pub pod_metrics: k8s::PodMetricsList,
    pub namespaces: k8s::NamespaceList,
}

impl MetricsFeed {
    /// Parses the combined feed format: a JSON array of the four list
    /// documents. Namespace usage is derived from the pods in this form.
    pub fn from_combined(value: &serde_json::Value) -> Result<Self, SnapshotError> {
        let docs = value
            .as_array()
            .ok_or(SnapshotError::WrongDocumentCount { expected: 4, got: 0 })?;
        if docs.len() != 4 {
            return Err(SnapshotError::WrongDocumentCount {
                expected: 4,
                got: docs.len(),
            });
        }

        fn doc<T: serde::de::DeserializeOwned>(
            docs: &[serde_json::Value],
            index: usize,
        ) -> Result<T, SnapshotError> {
            serde_json::from_value(docs[index].clone())
                .map_err(|source| SnapshotError::MalformedDocument { index, source })
        }

        Ok(Self {
            nodes: doc(docs, 0)?,
            node_metrics: doc(docs, 1)?,
            pods: doc(docs, 2)?,
            pod_metrics: doc(docs, 3)?,
            namespaces: k8s::NamespaceList::default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Pod {
    /// Qualified as `name.namespace`, matching the metrics join key.
    pub name: String,
    pub uid: String,
    pub namespace: String,
    /// Weak reference: the owning node is looked up by name in the
    /// snapshot that owns this pod. Absent until the pod is scheduled.
    pub node_name: Option<String>,
    pub phase: PodPhase,
    pub condition: PodCondition,
    /// Absent until a metrics sample is joined.
    pub cpu_usage: Option<f64>,
    pub mem_usage: Option<f64>,
}

impl Pod {
    pub fn usage(&self, resource: Resource) -> Option<f64> {
        match resource {
            Resource::Cpu => self.cpu_usage,
            Resource::Memory => self.mem_usage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub uid: String,
    pub state: NodeState,
    pub message: String,
    pub cpu_capacity: f64,
    pub cpu_allocatable: f64,
    pub cpu_usage: Option<f64>,
    pub mem_capacity: f64,
    pub mem_allocatable: f64,
    pub mem_usage: Option<f64>,
    pub container_runtime: String,
    /// Pods with a joined metrics sample, in feed order.
    pub pods_running: Vec<Pod>,
    /// Scheduled pods with no metrics sample yet, in feed order.
    pub pods_not_running: Vec<Pod>,
}

impl Node {
    pub fn usage(&self, resource: Resource) -> Option<f64> {
        match resource {
            Resource::Cpu => self.cpu_usage,
            Resource::Memory => self.mem_usage,
        }
    }

    pub fn capacity(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Cpu => self.cpu_capacity,
            Resource::Memory => self.mem_capacity,
        }
    }

    pub fn allocatable(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Cpu => self.cpu_allocatable,
            Resource::Memory => self.mem_allocatable,
        }
    }

    /// Popup/tooltip text, one `key: value` pair per line.
    pub fn tooltip(&self) -> String {
        let mut out = format!("Host: {}", self.name);
        out.push_str(&format!("\nID: {}", self.uid));
        out.push_str(&format!("\nState: {:?}", self.state));
        out.push_str(&format!("\nCPU: {}", self.cpu_capacity));
        out.push_str(&format!(
            "\n  Allocatable: {}%",
            compute_load(self.cpu_allocatable, self.cpu_capacity)
        ));
        if let Some(u) = self.cpu_usage {
            out.push_str(&format!("\n  Usage: {}%", compute_load(u, self.cpu_capacity)));
        }
        out.push_str(&format!("\nMemory: {}", self.mem_capacity));
        out.push_str(&format!(
            "\n  Allocatable: {}%",
            compute_load(self.mem_allocatable, self.mem_capacity)
        ));
        if let Some(u) = self.mem_usage {
            out.push_str(&format!("\n  Usage: {}%", compute_load(u, self.mem_capacity)));
        }
        out.push_str(&format!(
            "\nPods: {}",
            self.pods_running.len() + self.pods_not_running.len()
        ));
        out.push_str(&format!("\n  Running: {}", self.pods_running.len()));
        out.push_str(&format!("\n  Not Running: {}", self.pods_not_running.len()));
        out.push_str(&format!("\nContainer Runtime: {}", self.container_runtime));
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: f64,
}

/// Immutable view of the cluster at one poll tick. Built wholesale from
/// the feed, swapped in atomically, discarded on the next tick.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub nodes: BTreeMap<String, Node>,
    pub namespace_usage: BTreeMap<String, ResourceUsage>,
    pub cpu_capacity: f64,
    pub cpu_allocatable: f64,
    pub cpu_used_by_pods: f64,
    pub mem_capacity: f64,
    pub mem_allocatable: f64,
    pub mem_used_by_pods: f64,
    pub warnings: Vec<Warning>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn build(feed: &MetricsFeed, convention: MemoryConvention) -> Snapshot {
        let mut b = Builder {
            convention,
            snapshot: Snapshot {
                taken_at: Some(Utc::now()),
                ..Default::default()
            },
            pods: BTreeMap::new(),
            pod_order: Vec::new(),
        };

        for ns in &feed.namespaces.items {
            b.snapshot
                .namespace_usage
                .insert(ns.metadata.name.clone(), ResourceUsage::default());
        }
        for node in &feed.nodes.items {
            b.extract_node(node);
        }
        for nm in &feed.node_metrics.items {
            b.extract_node_metrics(nm);
        }
        for pod in &feed.pods.items {
            b.extract_pod(pod);
        }
        for pm in &feed.pod_metrics.items {
            b.extract_pod_metrics(pm);
        }
        b.consolidate();
        b.snapshot
    }
}

struct Builder {
    convention: MemoryConvention,
    snapshot: Snapshot,
    pods: BTreeMap<String, Pod>,
    pod_order: Vec<String>,
}

impl Builder {
    fn extract_node(&mut self, item: &k8s::Node) {
        let name = item.metadata.name.clone();

        let cpu_capacity = match self.cpu_field(&name, "capacity.cpu", item.status.capacity.get("cpu")) {
            Some(v) => v,
            None => return,
        };
        let cpu_allocatable =
            match self.cpu_field(&name, "allocatable.cpu", item.status.allocatable.get("cpu")) {
                Some(v) => v,
                None => return,
            };
        let mem_capacity =
            match self.mem_field(&name, "capacity.memory", item.status.capacity.get("memory")) {
                Some(v) => v,
                None => return,
            };
        let mem_allocatable = match self.mem_field(
            &name,
            "allocatable.memory",
            item.status.allocatable.get("memory"),
        ) {
            Some(v) => v,
            None => return,
        };

        let mut state = NodeState::Unknown;
        let mut message = String::new();
        for cond in &item.status.conditions {
            message = cond.message.clone();
            if cond.status != "True" {
                continue;
            }
            let matched = match cond.condition_type.as_str() {
                "Ready" => Some(NodeState::Ready),
                "KernelDeadlock" => Some(NodeState::KernelDeadlock),
                "NetworkUnavailable" => Some(NodeState::NetworkUnavailable),
                "OutOfDisk" => Some(NodeState::OutOfDisk),
                "MemoryPressure" => Some(NodeState::MemoryPressure),
                "DiskPressure" => Some(NodeState::DiskPressure),
                _ => None,
            };
            if let Some(s) = matched {
                state = s;
                break;
            }
        }

        self.snapshot.nodes.insert(
            name.clone(),
            Node {
                name,
                uid: item.metadata.uid.clone(),
                state,
                message,
                cpu_capacity,
                cpu_allocatable,
                cpu_usage: None,
                mem_capacity,
                mem_allocatable,
                mem_usage: None,
                container_runtime: item.status.node_info.container_runtime_version.clone(),
                pods_running: Vec::new(),
                pods_not_running: Vec::new(),
            },
        );
    }

    fn extract_node_metrics(&mut self, item: &k8s::NodeMetrics) {
        let name = item.metadata.name.clone();
        let cpu = decode_cpu(&item.usage.cpu);
        let mem = decode_memory(&item.usage.memory, self.convention);

        if !self.snapshot.nodes.contains_key(&name) {
            // metrics for a node the API did not list; nothing to attach to
            return;
        }
        match cpu {
            Ok(v) => {
                if let Some(node) = self.snapshot.nodes.get_mut(&name) {
                    node.cpu_usage = Some(v);
                }
            }
            Err(e) => self.snapshot.warnings.push(Warning::BadQuantity {
                entity: name.clone(),
                field: "usage.cpu".to_string(),
                detail: e.to_string(),
            }),
        }
        match mem {
            Ok(v) => {
                if let Some(node) = self.snapshot.nodes.get_mut(&name) {
                    node.mem_usage = Some(v);
                }
            }
            Err(e) => self.snapshot.warnings.push(Warning::BadQuantity {
                entity: name,
                field: "usage.memory".to_string(),
                detail: e.to_string(),
            }),
        }
    }

    fn extract_pod(&mut self, item: &k8s::Pod) {
        let namespace = item.metadata.namespace.clone();
        let name = format!("{}.{}", item.metadata.name, namespace);

        let mut condition = PodCondition::PodNotScheduled;
        for cond in &item.status.conditions {
            if cond.status != "True" {
                continue;
            }
            let matched = match cond.condition_type.as_str() {
                "Ready" => Some(PodCondition::Ready),
                "ContainersReady" => Some(PodCondition::ContainersReady),
                "PodScheduled" => Some(PodCondition::PodScheduled),
                "Initialized" => Some(PodCondition::Initialized),
                _ => None,
            };
            if let Some(c) = matched {
                condition = c;
                break;
            }
        }

        let node_name = if condition != PodCondition::PodNotScheduled {
            Some(item.spec.node_name.clone()).filter(|n| !n.is_empty())
        } else {
            None
        };

        self.pod_order.push(name.clone());
        self.pods.insert(
            name.clone(),
            Pod {
                name,
                uid: item.metadata.uid.clone(),
                namespace,
                node_name,
                phase: PodPhase::parse(&item.status.phase),
                condition,
                cpu_usage: None,
                mem_usage: None,
            },
        );
    }

    fn extract_pod_metrics(&mut self, item: &k8s::PodMetrics) {
        let name = format!("{}.{}", item.metadata.name, item.metadata.namespace);
        let Some(pod) = self.pods.get_mut(&name) else {
            self.snapshot.warnings.push(Warning::UnknownPod { pod: name });
            return;
        };

        let mut cpu = 0.0;
        let mut mem = 0.0;
        for container in &item.containers {
            match decode_cpu(&container.usage.cpu) {
                Ok(v) => cpu += v,
                Err(e) => {
                    self.snapshot.warnings.push(Warning::BadQuantity {
                        entity: name.clone(),
                        field: "usage.cpu".to_string(),
                        detail: e.to_string(),
                    });
                    return;
                }
            }
            match decode_memory(&container.usage.memory, self.convention) {
                Ok(v) => mem += v,
                Err(e) => {
                    self.snapshot.warnings.push(Warning::BadQuantity {
                        entity: name.clone(),
                        field: "usage.memory".to_string(),
                        detail: e.to_string(),
                    });
                    return;
                }
            }
        }
        pod.cpu_usage = Some(cpu);
        pod.mem_usage = Some(mem);
    }

    /// Joins pods onto nodes and folds up cluster and namespace totals.
    fn consolidate(&mut self) {
        for name in &self.pod_order {
            let Some(pod) = self.pods.get(name) else {
                continue;
            };
            let Some(node_name) = pod.node_name.clone() else {
                continue;
            };

            if let (Some(cpu), Some(mem)) = (pod.cpu_usage, pod.mem_usage) {
                self.snapshot.cpu_used_by_pods += cpu;
                self.snapshot.mem_used_by_pods += mem;
                let ns = self
                    .snapshot
                    .namespace_usage
                    .entry(pod.namespace.clone())
                    .or_default();
                ns.cpu += cpu;
                ns.memory += mem;

                match self.snapshot.nodes.get_mut(&node_name) {
                    Some(node) => node.pods_running.push(pod.clone()),
                    None => self.snapshot.warnings.push(Warning::UnknownNode {
                        pod: pod.name.clone(),
                        node: node_name,
                    }),
                }
            } else if let Some(node) = self.snapshot.nodes.get_mut(&node_name) {
                node.pods_not_running.push(pod.clone());
            }
        }

        for node in self.snapshot.nodes.values() {
            self.snapshot.cpu_capacity += node.cpu_capacity;
            self.snapshot.mem_capacity += node.mem_capacity;
            self.snapshot.cpu_allocatable += node.cpu_allocatable;
            self.snapshot.mem_allocatable += node.mem_allocatable;
        }
    }

    fn cpu_field(&mut self, node: &str, field: &str, raw: Option<&String>) -> Option<f64> {
        let result = raw
            .ok_or_else(|| "missing".to_string())
            .and_then(|s| decode_cpu(s).map_err(|e| e.to_string()));
        self.quantity(node, field, result)
    }

    fn mem_field(&mut self, node: &str, field: &str, raw: Option<&String>) -> Option<f64> {
        let convention = self.convention;
        let result = raw
            .ok_or_else(|| "missing".to_string())
            .and_then(|s| decode_memory(s, convention).map_err(|e| e.to_string()));
        self.quantity(node, field, result)
    }

    fn quantity(&mut self, node: &str, field: &str, result: Result<f64, String>) -> Option<f64> {
        match result {
            Ok(v) => Some(v),
            Err(detail) => {
                self.snapshot.warnings.push(Warning::BadQuantity {
                    entity: node.to_string(),
                    field: field.to_string(),
                    detail,
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_feed() -> serde_json::Value {
        json!([
            {"items": [{
                "metadata": {"name": "node-a", "uid": "uid-a"},
                "status": {
                    "capacity": {"cpu": "4", "memory": "8Gi"},
                    "allocatable": {"cpu": "4", "memory": "7Gi"},
                    "conditions": [
                        {"type": "MemoryPressure", "status": "False", "message": "ok"},
                        {"type": "Ready", "status": "True", "message": "kubelet ready"}
                    ],
                    "nodeInfo": {"containerRuntimeVersion": "containerd://1.7"}
                }
            }]},
            {"items": [{
                "metadata": {"name": "node-a"},
                "usage": {"cpu": "2", "memory": "4Gi"}
            }]},
            {"items": [
                {
                    "metadata": {"name": "web", "namespace": "default", "uid": "uid-w"},
                    "spec": {"nodeName": "node-a"},
                    "status": {
                        "phase": "Running",
                        "conditions": [{"type": "Ready", "status": "True"}]
                    }
                },
                {
                    "metadata": {"name": "batch", "namespace": "jobs", "uid": "uid-b"},
                    "spec": {"nodeName": "node-a"},
                    "status": {
                        "phase": "Running",
                        "conditions": [{"type": "PodScheduled", "status": "True"}]
                    }
                }
            ]},
            {"items": [
                {
                    "metadata": {"name": "web", "namespace": "default"},
                    "containers": [
                        {"name": "app", "usage": {"cpu": "1", "memory": "1Gi"}},
                        {"name": "sidecar", "usage": {"cpu": "500m", "memory": "512Mi"}}
                    ]
                }
            ]}
        ])
    }

    #[test]
    fn builds_nodes_and_joins_metrics() {
        let feed = MetricsFeed::from_combined(&sample_feed()).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);

        let node = &snap.nodes["node-a"];
        assert_eq!(node.state, NodeState::Ready);
        assert_eq!(node.cpu_capacity, 4.0);
        assert_eq!(node.mem_capacity, 8e9);
        assert_eq!(node.cpu_usage, Some(2.0));
        assert_eq!(node.container_runtime, "containerd://1.7");
        assert!(snap.warnings.is_empty());
    }

    #[test]
    fn pod_metrics_sum_over_containers() {
        let feed = MetricsFeed::from_combined(&sample_feed()).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);

        let node = &snap.nodes["node-a"];
        assert_eq!(node.pods_running.len(), 1);
        let web = &node.pods_running[0];
        assert_eq!(web.name, "web.default");
        assert_eq!(web.cpu_usage, Some(1.5));
        assert_eq!(web.mem_usage, Some(1e9 + 512e6));

        // scheduled pod with no metrics sample lands in the other bucket
        assert_eq!(node.pods_not_running.len(), 1);
        assert_eq!(node.pods_not_running[0].name, "batch.jobs");
    }

    #[test]
    fn cluster_totals_fold_up() {
        let feed = MetricsFeed::from_combined(&sample_feed()).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);

        assert_eq!(snap.cpu_capacity, 4.0);
        assert_eq!(snap.cpu_allocatable, 4.0);
        assert_eq!(snap.cpu_used_by_pods, 1.5);
        assert_eq!(snap.namespace_usage["default"].cpu, 1.5);
    }

    #[test]
    fn condition_scan_takes_first_true_match() {
        let feed = MetricsFeed::from_combined(&sample_feed()).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);
        let node = &snap.nodes["node-a"];
        // the False MemoryPressure entry is passed over
        assert_eq!(node.state, NodeState::Ready);
        assert_eq!(node.message, "kubelet ready");
    }

    #[test]
    fn unscheduled_pod_has_no_node_reference() {
        let mut feed_json = sample_feed();
        feed_json[2]["items"][0]["status"]["conditions"] = json!([]);
        let feed = MetricsFeed::from_combined(&feed_json).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);
        assert!(snap.nodes["node-a"].pods_running.is_empty());
    }

    #[test]
    fn bad_capacity_skips_node_with_warning() {
        let mut feed_json = sample_feed();
        feed_json[0]["items"][0]["status"]["capacity"]["cpu"] = json!("potato");
        let feed = MetricsFeed::from_combined(&feed_json).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);
        assert!(snap.nodes.is_empty());
        assert!(matches!(snap.warnings[0], Warning::BadQuantity { .. }));
    }

    #[test]
    fn tooltip_breaks_down_pod_counts() {
        let feed = MetricsFeed::from_combined(&sample_feed()).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);

        // web carries metrics, batch is scheduled without a sample
        let tip = snap.nodes["node-a"].tooltip();
        assert!(tip.contains("\nPods: 2"));
        assert!(tip.contains("\n  Running: 1"));
        assert!(tip.contains("\n  Not Running: 1"));
    }

    #[test]
    fn metrics_for_unknown_pod_warn() {
        let mut feed_json = sample_feed();
        feed_json[3]["items"][0]["metadata"]["name"] = json!("ghost");
        let feed = MetricsFeed::from_combined(&feed_json).unwrap();
        let snap = Snapshot::build(&feed, MemoryConvention::Decimal);
        assert!(
            snap.warnings
                .iter()
                .any(|w| matches!(w, Warning::UnknownPod { pod } if pod == "ghost.default"))
        );
    }

    #[test]
    fn combined_feed_rejects_wrong_document_count() {
        let err = MetricsFeed::from_combined(&json!([{"items": []}])).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::WrongDocumentCount { expected: 4, got: 1 }
        ));
    }

    #[test]
    fn combined_feed_rejects_non_list_document() {
        let err =
            MetricsFeed::from_combined(&json!([{"items": []}, 42, {"items": []}, {"items": []}]))
                .unwrap_err();
        assert!(matches!(err, SnapshotError::MalformedDocument { index: 1, .. }));
    }
}
