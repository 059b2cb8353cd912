use log::{debug, warn};
use plotters::coord::Shift;
use plotters::prelude::*;

use super::trend::TrendChart;
use super::Render;
use crate::data::filter::{select, Selection};
use crate::data::model::ResistanceTable;
use crate::error::RenderError;

/// Size of one grid cell in pixels when no explicit size is requested.
const CELL_SIZE: (u32, u32) = (480, 360);

/// One grid cell: a trend chart for an (organism, region) pair, or blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub organism: String,
    pub region: String,
    /// `None` when the pair has no rows; the cell stays blank.
    pub chart: Option<TrendChart>,
}

impl Panel {
    pub fn is_blank(&self) -> bool {
        self.chart.is_none()
    }
}

/// Fixed-geometry grid of per-pair trend charts.
#[derive(Debug, Clone, PartialEq)]
pub struct GridChart {
    pub columns: usize,
    pub rows: usize,
    /// One panel per requested pair, row-major.
    pub panels: Vec<Panel>,
}

/// All (organism, region) pairs, regions outermost.
pub fn cross_pairs(organisms: &[String], regions: &[String]) -> Vec<(String, String)> {
    regions
        .iter()
        .flat_map(|region| {
            organisms
                .iter()
                .map(move |organism| (organism.clone(), region.clone()))
        })
        .collect()
}

impl GridChart {
    /// Lay out one panel per pair in a grid of `columns` columns.
    ///
    /// The geometry depends only on the number of pairs; each panel re-runs
    /// the selection for its pair and is left blank when nothing matches.
    pub fn build(
        table: &ResistanceTable,
        pairs: &[(String, String)],
        columns: usize,
        regression: bool,
    ) -> Result<Self, RenderError> {
        if columns == 0 {
            return Err(RenderError::EmptyGrid);
        }
        let rows = pairs.len().div_ceil(columns);

        let panels: Vec<Panel> = pairs
            .iter()
            .map(|(organism, region)| {
                let selection = Selection::new()
                    .organism(organism.as_str())
                    .region(region.as_str());
                let subset = select(table, &selection);
                let chart = if subset.is_empty() {
                    None
                } else {
                    Some(
                        TrendChart::build(&subset, regression)
                            .with_title(format!("{organism} in {region}")),
                    )
                };
                Panel {
                    organism: organism.clone(),
                    region: region.clone(),
                    chart,
                }
            })
            .collect();

        let blank = panels.iter().filter(|p| p.is_blank()).count();
        if blank > 0 {
            warn!("{blank} of {} grid panels have no data and stay blank", panels.len());
        }
        debug!("grid layout {rows}x{columns} for {} panels", panels.len());

        Ok(GridChart {
            columns,
            rows,
            panels,
        })
    }
}

impl Render for GridChart {
    fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), RenderError> {
        if self.rows == 0 {
            return Ok(());
        }
        let cells = area.split_evenly((self.rows, self.columns));
        for (panel, cell) in self.panels.iter().zip(cells.iter()) {
            // Blank panels keep their cell but draw nothing.
            if let Some(chart) = &panel.chart {
                chart.draw(cell)?;
            }
        }
        Ok(())
    }

    fn preferred_size(&self) -> (u32, u32) {
        (
            CELL_SIZE.0 * self.columns as u32,
            CELL_SIZE.1 * self.rows.max(1) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;
    use tempfile::TempDir;

    use super::*;
    use crate::chart::export::save;
    use crate::data::model::tests::{obs, table};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> ResistanceTable {
        table(vec![
            obs("Klebsiella pneumoniae", "Greece", "Carbapenems", 2020, Some(66.0)),
            obs("Klebsiella pneumoniae", "Greece", "Carbapenems", 2021, Some(73.0)),
            obs("Staphylococcus aureus", "Bulgaria", "Meticillin (MRSA)", 2021, Some(20.0)),
        ])
    }

    #[test]
    fn cross_pairs_are_region_major() {
        let pairs = cross_pairs(&names(&["A", "B"]), &names(&["X", "Y"]));
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "X".to_string()),
                ("B".to_string(), "X".to_string()),
                ("A".to_string(), "Y".to_string()),
                ("B".to_string(), "Y".to_string()),
            ]
        );
    }

    #[test]
    fn panel_count_ignores_missing_data() {
        let organisms = names(&["Klebsiella pneumoniae", "Staphylococcus aureus"]);
        let regions = names(&["Greece", "Bulgaria", "Poland"]);
        let pairs = cross_pairs(&organisms, &regions);
        let grid = GridChart::build(&sample(), &pairs, 4, false).unwrap();

        assert_eq!(grid.panels.len(), organisms.len() * regions.len());
        assert_eq!((grid.rows, grid.columns), (2, 4));
        let filled: Vec<bool> = grid.panels.iter().map(|p| !p.is_blank()).collect();
        assert_eq!(filled, vec![true, false, false, true, false, false]);
        assert_eq!(
            grid.panels[0].chart.as_ref().map(|c| c.title.as_str()),
            Some("Klebsiella pneumoniae in Greece")
        );
    }

    #[test]
    fn absent_pair_renders_blank() {
        let pairs = vec![("Acinetobacter spp.".to_string(), "Malta".to_string())];
        let grid = GridChart::build(&sample(), &pairs, 2, true).unwrap();
        assert_eq!(grid.panels.len(), 1);
        assert!(grid.panels[0].is_blank());
        assert_eq!(grid.rows, 1);
    }

    #[test]
    fn zero_columns_is_rejected() {
        assert!(matches!(
            GridChart::build(&sample(), &[], 0, false),
            Err(RenderError::EmptyGrid)
        ));
    }

    #[test]
    fn geometry_is_fixed_by_pair_count() {
        let pairs = cross_pairs(&names(&["Klebsiella pneumoniae"]), &names(&["Greece", "Bulgaria"]));
        let grid = GridChart::build(&sample(), &pairs, 4, false).unwrap();
        assert_eq!((grid.rows, grid.columns), (1, 4));
        assert_eq!(grid.preferred_size(), (4 * CELL_SIZE.0, CELL_SIZE.1));
    }

    #[test]
    fn renders_mixed_blank_and_filled_panels() {
        let organisms = names(&["Klebsiella pneumoniae", "Staphylococcus aureus"]);
        let regions = names(&["Greece", "Bulgaria"]);
        let grid = GridChart::build(&sample(), &cross_pairs(&organisms, &regions), 2, true).unwrap();
        assert!(grid.panels.iter().any(Panel::is_blank));
        assert!(grid.panels.iter().any(|p| !p.is_blank()));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid.jpg");
        save(&grid, &path, grid.preferred_size()).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (2 * CELL_SIZE.0, 2 * CELL_SIZE.1));
    }
}
