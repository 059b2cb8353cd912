use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::chart::export;
use crate::chart::grid::cross_pairs;
use crate::chart::{BarChart, GridChart, PairPlot, Render, TrendChart};
use crate::config::{ChartJob, ChartKind, Workflow};
use crate::data::filter::select;
use crate::data::loader::load_file;
use crate::data::model::ResistanceTable;

/// Render one chart job from `table` into `output`.
///
/// Returns `None` when the job's selection is empty: nothing is written,
/// since there is nothing to show. Grids are the exception; their geometry
/// is fixed and empty panels stay blank.
pub fn render_job(table: &ResistanceTable, job: &ChartJob, output: &Path) -> Result<Option<PathBuf>> {
    match job.kind {
        ChartKind::Grid => {
            let pairs = cross_pairs(&job.organisms, &job.regions);
            let chart = GridChart::build(table, &pairs, job.columns, job.regression)?;
            save(&chart, job, output)?;
        }
        kind => {
            let selection = job.selection();
            let subset = select(table, &selection);
            if subset.is_empty() {
                warn!(
                    "no rows match [{}]; skipping {}",
                    selection.describe(),
                    output.display()
                );
                return Ok(None);
            }
            let title = job.title.clone().unwrap_or_else(|| selection.describe());
            match kind {
                ChartKind::Bar => save(&BarChart::build(&subset).with_title(title), job, output)?,
                ChartKind::Trend => save(
                    &TrendChart::build(&subset, job.regression).with_title(title),
                    job,
                    output,
                )?,
                _ => save(&PairPlot::build(&subset), job, output)?,
            }
        }
    }
    Ok(Some(output.to_path_buf()))
}

fn save<C: Render>(chart: &C, job: &ChartJob, output: &Path) -> Result<()> {
    export::save(chart, output, job.size(chart.preferred_size()))?;
    Ok(())
}

/// Load the workflow's dataset once and render every chart in order.
/// Returns the paths actually written.
pub fn run(workflow: &Workflow) -> Result<Vec<PathBuf>> {
    let table = load_file(&workflow.dataset, &workflow.load)
        .with_context(|| format!("loading {}", workflow.dataset.display()))?;

    let mut written = Vec::new();
    for (i, job) in workflow.charts.iter().enumerate() {
        let output = workflow.output_path(job);
        let result = render_job(&table, job, &output)
            .with_context(|| format!("chart #{i} ({})", output.display()))?;
        written.extend(result);
    }
    info!(
        "workflow finished: {} of {} charts written",
        written.len(),
        workflow.charts.len()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::GenericImageView;
    use tempfile::TempDir;

    use super::*;
    use crate::data::loader::LoadOptions;

    const DATA: &str = "Organism,RegionName,AntimicrobialGroup,Year,PercentageResistant\n\
                        Klebsiella pneumoniae,Greece,Carbapenems,2020,12.5\n\
                        Klebsiella pneumoniae,Greece,Carbapenems,2021,15.0\n";

    fn job(kind: ChartKind, output: &str) -> ChartJob {
        ChartJob {
            kind,
            output: PathBuf::from(output),
            title: None,
            organism: None,
            region: None,
            group: None,
            year: None,
            from: None,
            to: None,
            organisms: Vec::new(),
            regions: Vec::new(),
            columns: 4,
            regression: false,
            width: None,
            height: None,
        }
    }

    fn workflow(dir: &TempDir, charts: Vec<ChartJob>) -> Workflow {
        let dataset = dir.path().join("amr.csv");
        fs::write(&dataset, DATA).unwrap();
        Workflow {
            dataset,
            output_dir: dir.path().join("out"),
            load: LoadOptions::default(),
            charts,
        }
    }

    #[test]
    fn empty_selection_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut bar = job(ChartKind::Bar, "bar.png");
        bar.region = Some(crate::config::OneOrMany::One("Malta".into()));
        let wf = workflow(&dir, vec![bar]);

        let written = run(&wf).unwrap();
        assert!(written.is_empty());
        assert!(!dir.path().join("out").join("bar.png").exists());
    }

    #[test]
    fn grid_of_absent_pairs_keeps_its_geometry() {
        let dir = TempDir::new().unwrap();
        let mut grid = job(ChartKind::Grid, "grid.png");
        grid.organisms = vec!["Staphylococcus aureus".into()];
        grid.regions = vec!["Malta".into(), "Cyprus".into(), "Latvia".into()];
        grid.columns = 2;
        grid.width = Some(200);
        grid.height = Some(100);
        let wf = workflow(&dir, vec![grid]);

        let written = run(&wf).unwrap();
        assert_eq!(written.len(), 1);
        let img = image::open(&written[0]).unwrap();
        assert_eq!((img.width(), img.height()), (200, 100));
    }

    #[test]
    fn missing_dataset_names_the_path() {
        let dir = TempDir::new().unwrap();
        let mut wf = workflow(&dir, Vec::new());
        wf.dataset = dir.path().join("nope.csv");
        let err = run(&wf).unwrap_err();
        assert!(format!("{err:#}").contains("nope.csv"));
    }
}
