use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{draw_placeholder, padded_bounds, Render, FONT};
use crate::data::model::ResistanceTable;
use crate::error::RenderError;

const HISTOGRAM_BINS: usize = 10;
const CELL_SIZE: u32 = 300;

/// Content of one cell of the scatter matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum PairCell {
    /// Diagonal: (bin start, bin end, count).
    Histogram(Vec<(f64, f64, usize)>),
    /// Off-diagonal: (x, y) over rows where both columns are present.
    Scatter(Vec<(f64, f64)>),
}

/// All-pairs scatter matrix over the numeric columns of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct PairPlot {
    pub columns: Vec<String>,
    /// `values[c][row]` for column `c`.
    values: Vec<Vec<Option<f64>>>,
}

impl PairPlot {
    pub fn build(table: &ResistanceTable) -> Self {
        let columns = table.numeric_columns();
        let values = columns.iter().map(|c| table.numeric_values(c)).collect();
        PairPlot { columns, values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|col| col.iter().all(Option::is_none))
    }

    /// Cell at matrix row `i` (y = column i) and matrix column `j` (x = column j).
    pub fn cell(&self, i: usize, j: usize) -> PairCell {
        if i == j {
            return PairCell::Histogram(histogram(&self.values[i], HISTOGRAM_BINS));
        }
        let points = self.values[j]
            .iter()
            .zip(&self.values[i])
            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
            .collect();
        PairCell::Scatter(points)
    }

    fn bounds(&self, column: usize) -> (f64, f64) {
        padded_bounds(self.values[column].iter().flatten().copied())
    }
}

fn histogram(values: &[Option<f64>], bins: usize) -> Vec<(f64, f64, usize)> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return Vec::new();
    }
    let lo = present.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = present.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (hi - lo).abs() < f64::EPSILON {
        return vec![(lo - 0.5, hi + 0.5, present.len())];
    }
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in present {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, n)| (lo + i as f64 * width, lo + (i + 1) as f64 * width, n))
        .collect()
}

impl Render for PairPlot {
    fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), RenderError> {
        let k = self.columns.len();
        if k == 0 || self.is_empty() {
            return draw_placeholder(area, "pairwise plot");
        }

        let cells = area.split_evenly((k, k));
        for i in 0..k {
            for j in 0..k {
                let cell_area = &cells[i * k + j];
                let bottom = i + 1 == k;
                let left = j == 0;
                let (x_lo, x_hi) = self.bounds(j);

                match self.cell(i, j) {
                    PairCell::Histogram(bins) => {
                        let y_hi = bins.iter().map(|b| b.2).max().unwrap_or(1).max(1) as f64 * 1.1;
                        let mut chart = ChartBuilder::on(cell_area)
                            .margin(5)
                            .x_label_area_size(if bottom { 35 } else { 15 })
                            .y_label_area_size(if left { 50 } else { 15 })
                            .build_cartesian_2d(x_lo..x_hi, 0f64..y_hi)
                            .map_err(RenderError::draw)?;
                        configure(&mut chart, &self.columns[j], &self.columns[i], bottom, left)?;
                        chart
                            .draw_series(bins.iter().map(|&(start, end, n)| {
                                Rectangle::new([(start, 0.0), (end, n as f64)], BLUE.mix(0.5).filled())
                            }))
                            .map_err(RenderError::draw)?;
                    }
                    PairCell::Scatter(points) => {
                        let (y_lo, y_hi) = self.bounds(i);
                        let mut chart = ChartBuilder::on(cell_area)
                            .margin(5)
                            .x_label_area_size(if bottom { 35 } else { 15 })
                            .y_label_area_size(if left { 50 } else { 15 })
                            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
                            .map_err(RenderError::draw)?;
                        configure(&mut chart, &self.columns[j], &self.columns[i], bottom, left)?;
                        chart
                            .draw_series(
                                points
                                    .iter()
                                    .map(|&(x, y)| Circle::new((x, y), 2, BLUE.mix(0.6).filled())),
                            )
                            .map_err(RenderError::draw)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn preferred_size(&self) -> (u32, u32) {
        let side = CELL_SIZE * self.columns.len().max(1) as u32;
        (side, side)
    }
}

/// Axis names only along the outer edge of the matrix.
fn configure<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    x_name: &str,
    y_name: &str,
    bottom: bool,
    left: bool,
) -> Result<(), RenderError> {
    let blank = |_: &f64| String::new();
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh().label_style((FONT, 10)).x_labels(4).y_labels(4);
    if bottom {
        mesh.x_desc(x_name);
    } else {
        mesh.x_label_formatter(&blank);
    }
    if left {
        mesh.y_desc(y_name);
    } else {
        mesh.y_label_formatter(&blank);
    }
    mesh.draw().map_err(RenderError::draw)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::chart::export::save;
    use crate::data::model::tests::{obs, table};
    use crate::data::model::{MetadataValue, PERCENTAGE_RESISTANT, YEAR};

    fn sample() -> ResistanceTable {
        let mut rows = vec![
            obs("E. coli", "Malta", "Carbapenems", 2019, Some(10.0)),
            obs("E. coli", "Malta", "Carbapenems", 2020, None),
            obs("E. coli", "Malta", "Carbapenems", 2021, Some(30.0)),
        ];
        for (i, row) in rows.iter_mut().enumerate() {
            row.extra.insert("NumIsolates".into(), MetadataValue::Integer(100 + i as i64));
        }
        let mut t = table(rows);
        t.column_names.push("NumIsolates".into());
        t
    }

    #[test]
    fn uses_numeric_columns_only() {
        let plot = PairPlot::build(&sample());
        assert_eq!(plot.columns, vec![YEAR, PERCENTAGE_RESISTANT, "NumIsolates"]);
    }

    #[test]
    fn scatter_skips_rows_with_missing_values() {
        let plot = PairPlot::build(&sample());
        // y = PercentageResistant (1), x = Year (0)
        assert_eq!(
            plot.cell(1, 0),
            PairCell::Scatter(vec![(2019.0, 10.0), (2021.0, 30.0)])
        );
    }

    #[test]
    fn diagonal_histogram_counts_every_present_value() {
        let plot = PairPlot::build(&sample());
        match plot.cell(0, 0) {
            PairCell::Histogram(bins) => {
                assert_eq!(bins.len(), HISTOGRAM_BINS);
                assert_eq!(bins.iter().map(|b| b.2).sum::<usize>(), 3);
                assert_eq!(bins[0].2, 1);
                assert_eq!(bins[HISTOGRAM_BINS - 1].2, 1);
            }
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn constant_column_has_single_bin() {
        let bins = histogram(&[Some(4.0), Some(4.0), None], HISTOGRAM_BINS);
        assert_eq!(bins, vec![(3.5, 4.5, 2)]);
    }

    #[test]
    fn empty_table_is_empty_plot() {
        assert!(PairPlot::build(&table(Vec::new())).is_empty());
    }

    #[test]
    fn renders_every_cell_of_the_matrix() {
        let plot = PairPlot::build(&sample());
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.pdf");

        save(&plot, &path, plot.preferred_size()).unwrap();
        let doc = lopdf::Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
