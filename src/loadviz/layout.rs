use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::heatmap::{HeatMapScheme, Rgb};
use super::load::compute_load;
use super::snapshot::{Node, NodeState, Resource, Snapshot, Warning};

/// Gap between node squares in the drawing area.
const NODE_MARGIN: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Alternating horizontal/vertical slice-and-dice partitioning of the
    /// node square. Tiles never overlap and sum to at most the node area.
    #[default]
    Strip,
    /// Every pod gets an independent square centered in the node square.
    /// Tiles overlap for busy nodes; that is this mode's documented look,
    /// not a defect.
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    fn translated(self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// One pod's tile within its node square, recomputed on every render pass.
#[derive(Debug, Clone, Serialize)]
pub struct LoadTile {
    pub pod: String,
    /// Relative to the node square's top-left corner out of `layout_pods`;
    /// translated to drawing-area coordinates by `build_load_map`.
    pub rect: Rect,
    pub color: Rgb,
    pub tooltip: String,
}

/// Per-call render settings, passed explicitly instead of living in
/// module-level globals the way the first dashboard revisions did.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub resource: Resource,
    pub mode: LayoutMode,
    pub node_side: f64,
    pub drawing_area_width: f64,
    pub scheme: HeatMapScheme,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeTiles {
    pub node: String,
    pub state: NodeState,
    pub x: f64,
    pub y: f64,
    pub side: f64,
    /// Usage as a share of capacity, when the node reported a metric.
    pub load: Option<f64>,
    pub color: Option<Rgb>,
    pub tooltip: String,
    pub tiles: Vec<LoadTile>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadMap {
    pub nodes: Vec<NodeTiles>,
    pub warnings: Vec<Warning>,
    /// Total height consumed by the wrapped rows of node squares.
    pub height: f64,
}

/// Partitions a node's square of side `side` among its running pods.
///
/// Pod areas are normalized against the node's reported usage of the
/// selected resource, not against the sum of pod usages; the two differ
/// whenever the node runs anything besides the listed pods. A node with a
/// missing or zero metric yields a warning instead of tiles.
pub fn layout_pods(
    node: &Node,
    resource: Resource,
    side: f64,
    mode: LayoutMode,
    scheme: &HeatMapScheme,
) -> Result<Vec<LoadTile>, Warning> {
    let node_usage = match node.usage(resource) {
        None => {
            return Err(Warning::NoMetric {
                node: node.name.clone(),
                resource,
            });
        }
        Some(u) if u == 0.0 => {
            return Err(Warning::ZeroMetric {
                node: node.name.clone(),
                resource,
            });
        }
        Some(u) => u,
    };

    let mut pods: Vec<_> = node
        .pods_running
        .iter()
        .filter_map(|p| p.usage(resource).map(|u| (p, u)))
        .collect();
    // descending, ties keep feed order
    pods.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let node_area = side * side;
    let node_load = compute_load(node_usage, node.capacity(resource));

    let mut tiles = Vec::with_capacity(pods.len());
    let mut strip = StripCursor::new(side);

    for (pod, usage) in pods {
        let ratio = usage / node_usage;
        let pod_area = ratio * node_area;

        let rect = match mode {
            LayoutMode::Strip => strip.place(pod_area),
            LayoutMode::Centered => {
                let tile_side = pod_area.sqrt();
                let offset = (side - tile_side) / 2.0;
                Rect {
                    x: offset,
                    y: offset,
                    w: tile_side,
                    h: tile_side,
                }
            }
        };

        let share = (1e4 * ratio).round() / 1e2;
        tiles.push(LoadTile {
            pod: pod.name.clone(),
            rect,
            color: scheme.color_for_load(100.0 * ratio),
            tooltip: format!(
                "Node => {} => {}% of global resources\nPod => {} => {}% of used resources",
                node.name, node_load, pod.name, share
            ),
        });
    }

    Ok(tiles)
}

/// Slice-and-dice accumulator: a horizontal strip spans the remaining
/// width and consumes height, a vertical one spans the remaining height
/// and consumes width, and orientation flips after every placement.
struct StripCursor {
    remaining_w: f64,
    remaining_h: f64,
    shift_x: f64,
    shift_y: f64,
    horizontal: bool,
}

impl StripCursor {
    fn new(side: f64) -> Self {
        Self {
            remaining_w: side,
            remaining_h: side,
            shift_x: 0.0,
            shift_y: 0.0,
            horizontal: true,
        }
    }

    fn place(&mut self, area: f64) -> Rect {
        let (w, h) = if self.horizontal {
            let w = self.remaining_w.max(0.0);
            let h = if w > 0.0 { area / w } else { 0.0 };
            (w, h.max(0.0))
        } else {
            let h = self.remaining_h.max(0.0);
            let w = if h > 0.0 { area / h } else { 0.0 };
            (w.max(0.0), h)
        };

        let rect = Rect {
            x: self.shift_x,
            y: self.shift_y,
            w,
            h,
        };

        if self.horizontal {
            self.shift_y += h;
            self.remaining_h -= h;
        } else {
            self.shift_x += w;
            self.remaining_w -= w;
        }
        self.horizontal = !self.horizontal;

        rect
    }
}

/// Lays out every node in the snapshot on a wrapping grid of squares,
/// left to right, in node-name order. Nodes with unusable metrics are
/// reported in `warnings` and occupy no space.
pub fn build_load_map(snapshot: &Snapshot, ctx: &RenderContext) -> LoadMap {
    let mut map = LoadMap::default();
    let mut cursor_x = NODE_MARGIN;
    let mut cursor_y = NODE_MARGIN;

    for node in snapshot.nodes.values() {
        let tiles = match layout_pods(node, ctx.resource, ctx.node_side, ctx.mode, &ctx.scheme) {
            Ok(tiles) => tiles,
            Err(warning) => {
                map.warnings.push(warning);
                continue;
            }
        };

        if cursor_x + ctx.node_side > ctx.drawing_area_width {
            cursor_y += ctx.node_side + NODE_MARGIN;
            cursor_x = NODE_MARGIN;
        }

        let load = node
            .usage(ctx.resource)
            .map(|u| compute_load(u, node.capacity(ctx.resource)));

        map.nodes.push(NodeTiles {
            node: node.name.clone(),
            state: node.state,
            x: cursor_x,
            y: cursor_y,
            side: ctx.node_side,
            load,
            color: load.map(|l| ctx.scheme.color_for_load(l)),
            tooltip: node.tooltip(),
            tiles: tiles
                .into_iter()
                .map(|mut t| {
                    t.rect = t.rect.translated(cursor_x, cursor_y);
                    t
                })
                .collect(),
        });

        cursor_x += ctx.node_side + 2.0 * NODE_MARGIN;
    }

    map.height = cursor_y + ctx.node_side + NODE_MARGIN;
    map
}
