use serde::Deserialize;
use std::collections::HashMap;

// Minimal K8s API shapes, covering exactly the fields the load model
// consumes. Everything is default-tolerant so partial responses still
// deserialize.

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

// --- Nodes ---

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub capacity: HashMap<String, String>,
    #[serde(default)]
    pub allocatable: HashMap<String, String>,
    #[serde(default)]
    pub node_info: NodeSystemInfo,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeSystemInfo {
    #[serde(default)]
    pub container_runtime_version: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodeList {
    pub items: Vec<Node>,
}

// --- Node metrics (metrics.k8s.io/v1beta1) ---

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodeMetrics {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodeMetricsList {
    pub items: Vec<NodeMetrics>,
}

// --- Pods ---

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PodList {
    pub items: Vec<Pod>,
}

// --- Pod metrics ---

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ContainerMetrics {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PodMetrics {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PodMetricsList {
    pub items: Vec<PodMetrics>,
}

// --- Namespaces ---

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Namespace {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NamespaceList {
    pub items: Vec<Namespace>,
}
