use serde::Deserialize;
use std::path::Path;

use crate::loadviz::heatmap::HeatMapScheme;
use crate::loadviz::layout::LayoutMode;
use crate::loadviz::snapshot::Resource;
use crate::loadviz::units::MemoryConvention;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_k8s_api_endpoint")]
    pub k8s_api_endpoint: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Side length of one node square, in drawing units.
    #[serde(default = "default_node_side")]
    pub node_side: f64,
    #[serde(default = "default_drawing_area_width")]
    pub drawing_area_width: f64,
    #[serde(default)]
    pub resource: Resource,
    #[serde(default)]
    pub layout_mode: LayoutMode,
    #[serde(default)]
    pub heatmap: HeatMapScheme,
    #[serde(default)]
    pub memory_convention: MemoryConvention,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            node_side: default_node_side(),
            drawing_area_width: default_drawing_area_width(),
            resource: Resource::default(),
            layout_mode: LayoutMode::default(),
            heatmap: HeatMapScheme::default(),
            memory_convention: MemoryConvention::default(),
        }
    }
}

fn default_listen_port() -> u16 {
    9191
}

fn default_k8s_api_endpoint() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_node_side() -> f64 {
    100.0
}

fn default_drawing_area_width() -> f64 {
    800.0
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut cfg: Config = if path.exists() {
            let data = std::fs::read_to_string(path)
                .map_err(|e| format!("reading config {}: {}", path.display(), e))?;
            serde_yaml::from_str(&data).map_err(|e| format!("parsing config: {}", e))?
        } else {
            // all-defaults config; the endpoint can still come from the environment
            serde_yaml::from_str("{}")?
        };

        // Same env knob the Flask deployment used
        if let Ok(ep) = std::env::var("K8S_API_ENDPOINT") {
            if !ep.is_empty() {
                cfg.k8s_api_endpoint = ep;
            }
        }

        if cfg.render.node_side <= 0.0 {
            return Err("render.node_side must be positive".into());
        }
        if cfg.render.drawing_area_width < cfg.render.node_side {
            return Err("render.drawing_area_width must fit at least one node square".into());
        }

        Ok(cfg)
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: Config = serde_yaml::from_str("listen_port: 8080").unwrap();
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.poll_interval_secs, 300);
        assert_eq!(cfg.render.node_side, 100.0);
    }

    #[test]
    fn render_section_is_optional() {
        let cfg: Config = serde_yaml::from_str("k8s_api_endpoint: http://10.0.0.1:8001").unwrap();
        assert_eq!(cfg.k8s_api_endpoint, "http://10.0.0.1:8001");
        assert_eq!(cfg.render.drawing_area_width, 800.0);
    }
}
