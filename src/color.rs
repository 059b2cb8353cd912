use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

pub const NEUTRAL: RGBColor = RGBColor(128, 128, 128);

/// `n` distinct colours at evenly spaced hues. Large palettes alternate
/// between a dark and a light tone so neighbouring hues stay apart.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    (0..n)
        .map(|i| {
            let hue = i as f32 * 360.0 / n as f32;
            let lightness = if n > 6 && i % 2 == 1 { 0.60 } else { 0.42 };
            let srgb: Srgb = Hsl::new(hue, 0.75, lightness).into_color();
            let rgb: Srgb<u8> = srgb.into_format();
            RGBColor(rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: category label → RGBColor
// ---------------------------------------------------------------------------

/// Maps the distinct values of a categorical column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, RGBColor>,
    default_color: RGBColor,
}

impl ColorMap {
    /// Build a colour map; colours follow the order of `labels`.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        let palette = generate_palette(labels.len());
        let mapping = labels
            .iter()
            .zip(palette)
            .map(|(label, color)| (label.as_ref().to_string(), color))
            .collect();

        ColorMap {
            mapping,
            default_color: NEUTRAL,
        }
    }

    /// Look up the colour for a given label.
    pub fn color_for(&self, label: &str) -> RGBColor {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }
}
