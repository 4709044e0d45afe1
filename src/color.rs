use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

/// Primary series colour (sales lines and single-series bars).
pub const PRIMARY: Color32 = Color32::from_rgb(0x00, 0x77, 0xb6);
/// Secondary series colour (inventory line).
pub const SECONDARY: Color32 = Color32::from_rgb(0x48, 0xca, 0xe4);

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues,
/// starting from the blue end of the wheel.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = 200.0 + (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.5);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Scale from light to `PRIMARY` by `t` in `[0, 1]`, for bars coloured by value.
pub fn intensity(t: f64) -> Color32 {
    let t = t.clamp(0.0, 1.0) as f32;
    let hsl = Hsl::new(200.0, 0.35 + 0.6 * t, 0.8 - 0.45 * t);
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Color mapping: category label → Color32
// ---------------------------------------------------------------------------

/// Maps the labels of a grouped aggregate to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a String>) -> Self {
        let labels: Vec<&String> = labels.into_iter().collect();
        let palette = generate_palette(labels.len());
        let mapping = labels
            .into_iter()
            .zip(palette)
            .map(|(label, c)| (label.clone(), c))
            .collect();

        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, label: &str) -> Color32 {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }
}
