use serde::{Deserialize, Serialize};

/// Interpolated color channels. Kept as floats so interpolation is exact;
/// rounding happens only at serialization time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn css(&self) -> String {
        format!(
            "rgb({},{},{})",
            self.r.round() as u8,
            self.g.round() as u8,
            self.b.round() as u8
        )
    }
}

/// Heat-map policy. Two incompatible schemes shipped in successive
/// revisions of the dashboard; both survive as configuration, with the
/// four-anchor gradient as the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum HeatMapScheme {
    /// blue -> green -> yellow -> red across 0..100%.
    #[default]
    Anchored,
    /// white -> blue below `threshold` percent, white -> red above.
    Threshold {
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

fn default_threshold() -> f64 {
    10.0
}

impl HeatMapScheme {
    pub fn color_for_load(&self, load: f64) -> Rgb {
        match self {
            HeatMapScheme::Anchored => anchored_color(load),
            HeatMapScheme::Threshold { threshold } => threshold_color(load, *threshold),
        }
    }
}

/// blue (0%) -> green (~33%) -> yellow (~67%) -> red (100%)
const ANCHORS: [[f64; 3]; 4] = [
    [0.0, 0.0, 255.0],
    [0.0, 255.0, 0.0],
    [255.0, 255.0, 0.0],
    [255.0, 0.0, 0.0],
];

/// Four-anchor linear gradient over 0..100%. Values at or beyond either
/// end clamp to the end anchor.
pub fn anchored_color(load: f64) -> Rgb {
    const NUM: usize = ANCHORS.len();

    let level = load / 100.0;
    let (idx1, idx2, fract) = if level <= 0.0 {
        (0, 0, 0.0)
    } else if level >= 1.0 {
        (NUM - 1, NUM - 1, 0.0)
    } else {
        let scaled = level * (NUM - 1) as f64;
        let idx1 = scaled.floor() as usize;
        (idx1, idx1 + 1, scaled - idx1 as f64)
    };

    Rgb::new(
        (ANCHORS[idx2][0] - ANCHORS[idx1][0]) * fract + ANCHORS[idx1][0],
        (ANCHORS[idx2][1] - ANCHORS[idx1][1]) * fract + ANCHORS[idx1][1],
        (ANCHORS[idx2][2] - ANCHORS[idx1][2]) * fract + ANCHORS[idx1][2],
    )
}

/// Earlier two-anchor scheme: blend from white toward blue for light load,
/// toward red once the load crosses the threshold.
pub fn threshold_color(load: f64, threshold: f64) -> Rgb {
    const WHITE: [f64; 3] = [255.0, 255.0, 255.0];
    const BLUE: [f64; 3] = [153.0, 204.0, 255.0];
    const RED: [f64; 3] = [255.0, 85.0, 102.0];

    let w1 = (load / 100.0).clamp(0.0, 1.0);
    let w2 = 1.0 - w1;
    let target = if load < threshold { BLUE } else { RED };

    Rgb::new(
        (target[0] * w1 + WHITE[0] * w2).round(),
        (target[1] * w1 + WHITE[1] * w2).round(),
        (target[2] * w1 + WHITE[2] * w2).round(),
    )
}
