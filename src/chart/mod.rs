//! Chart layer: plan builders and their drawing code.
//!
//! Every chart is first built as a plain data plan from a (selected)
//! [`ResistanceTable`](crate::data::model::ResistanceTable), then drawn onto
//! a drawing area handed in by the caller. Nothing here keeps a "current
//! figure"; [`export::save`] allocates a fresh surface per call.
//!
//! ```text
//!   subset ──► BarChart / TrendChart / GridChart / PairPlot   (plans, testable)
//!                              │
//!                              ▼  Render::draw(&area)
//!                  plotters DrawingArea (bitmap buffer or SVG)
//!                              │
//!                              ▼  export
//!                     .png / .jpg / .pdf / .svg
//! ```
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::color::NEUTRAL;
use crate::error::RenderError;

pub mod bar;
pub mod export;
pub mod grid;
pub mod pairs;
pub mod trend;

pub use bar::BarChart;
pub use grid::GridChart;
pub use pairs::PairPlot;
pub use trend::TrendChart;

pub(crate) const FONT: &str = "sans-serif";

/// Something that can draw itself onto a caller-provided surface.
pub trait Render {
    fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), RenderError>;

    /// Pixel size used when the caller does not ask for one.
    fn preferred_size(&self) -> (u32, u32) {
        (1200, 800)
    }
}

/// Centered "no data" note, used when a plan has nothing to show.
pub(crate) fn draw_placeholder<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
) -> Result<(), RenderError> {
    let (w, h) = area.dim_in_pixel();
    let style = TextStyle::from((FONT, font_size(h)).into_font())
        .color(&NEUTRAL)
        .pos(Pos::new(HPos::Center, VPos::Center));
    let text = if title.is_empty() {
        "no data".to_string()
    } else {
        format!("{title}: no data")
    };
    area.draw(&Text::new(text, ((w / 2) as i32, (h / 2) as i32), style))
        .map_err(RenderError::draw)
}

/// Base font size for a drawing area of the given pixel height.
pub(crate) fn font_size(height: u32) -> u32 {
    (height / 40).clamp(10, 20)
}

/// Shorten long category names (e.g. the combined-resistance group) for axes and legends.
pub(crate) fn short_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_string();
    }
    let mut out: String = label.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Padded (min, max) of finite values; a flat or empty input still gets a usable span.
pub(crate) fn padded_bounds<I: IntoIterator<Item = f64>>(values: I) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_label_truncates_on_char_boundary() {
        assert_eq!(short_label("Carbapenems", 20), "Carbapenems");
        let long = "Combined resistance (third-generation cephalosporins, fluoroquinolones, and aminoglycosides)";
        let short = short_label(long, 20);
        assert_eq!(short.chars().count(), 20);
        assert!(short.ends_with('…'));
    }

    #[test]
    fn padded_bounds_handles_flat_and_empty_input() {
        assert_eq!(padded_bounds(Vec::<f64>::new()), (0.0, 1.0));
        assert_eq!(padded_bounds([5.0, 5.0]), (4.0, 6.0));
        let (lo, hi) = padded_bounds([0.0, 10.0, f64::NAN]);
        assert!(lo < 0.0 && hi > 10.0);
    }
}
