use std::collections::HashMap;

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{draw_placeholder, font_size, short_label, Render, FONT};
use crate::color::ColorMap;
use crate::data::model::ResistanceTable;
use crate::error::RenderError;
use crate::stats;

/// One bar: mean resistance of an antimicrobial group with its standard error.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub group: String,
    pub mean: f64,
    /// `None` when the group has a single observation.
    pub standard_error: Option<f64>,
    pub n: usize,
}

/// Grouped bar chart of PercentageResistant per AntimicrobialGroup.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    /// Aggregate `table` into one bar per antimicrobial group, in first-seen order.
    /// Rows without a reported percentage are ignored.
    pub fn build(table: &ResistanceTable) -> Self {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(&str, Vec<f64>)> = Vec::new();
        for obs in &table.observations {
            let Some(pct) = obs.percentage_resistant else {
                continue;
            };
            let group = obs.antimicrobial_group.as_str();
            let slot = *slots.entry(group).or_insert_with(|| {
                groups.push((group, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(pct);
        }

        let bars = groups
            .into_iter()
            .filter_map(|(group, values)| {
                Some(Bar {
                    group: group.to_string(),
                    mean: stats::mean(&values)?,
                    standard_error: stats::standard_error(&values),
                    n: values.len(),
                })
            })
            .collect();

        BarChart {
            title: String::new(),
            bars,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl Render for BarChart {
    fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), RenderError> {
        if self.bars.is_empty() {
            return draw_placeholder(area, &self.title);
        }

        let n = self.bars.len();
        let font = font_size(area.dim_in_pixel().1);
        let y_max = self
            .bars
            .iter()
            .map(|b| b.mean + b.standard_error.unwrap_or(0.0))
            .fold(1.0, f64::max)
            * 1.1;
        let names: Vec<String> = self.bars.iter().map(|b| short_label(&b.group, 24)).collect();
        let colors = ColorMap::new(&self.bars.iter().map(|b| b.group.as_str()).collect::<Vec<_>>());

        let mut chart = ChartBuilder::on(area)
            .caption(&self.title, (FONT, font + 4))
            .margin(15)
            .x_label_area_size(font * 4)
            .y_label_area_size(font * 4)
            .build_cartesian_2d((0..n).into_segmented(), 0f64..y_max)
            .map_err(RenderError::draw)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Antimicrobial Group")
            .y_desc("Resistance (%)")
            .x_labels(n)
            .x_label_formatter(&|v: &SegmentValue<usize>| match v {
                SegmentValue::CenterOf(i) => names.get(*i).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .label_style((FONT, font))
            .draw()
            .map_err(RenderError::draw)?;

        chart
            .draw_series(self.bars.iter().enumerate().map(|(i, bar)| {
                let mut rect = Rectangle::new(
                    [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), bar.mean)],
                    colors.color_for(&bar.group).filled(),
                );
                rect.set_margin(0, 0, 10, 10);
                rect
            }))
            .map_err(RenderError::draw)?;

        chart
            .draw_series(self.bars.iter().enumerate().filter_map(|(i, bar)| {
                let se = bar.standard_error?;
                Some(ErrorBar::new_vertical(
                    SegmentValue::CenterOf(i),
                    bar.mean - se,
                    bar.mean,
                    bar.mean + se,
                    BLACK.stroke_width(2),
                    12,
                ))
            }))
            .map_err(RenderError::draw)?;

        Ok(())
    }

    fn preferred_size(&self) -> (u32, u32) {
        let width = (self.bars.len() as u32 * 160).clamp(800, 1800);
        (width, 700)
    }
}
