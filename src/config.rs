use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::Selection;
use crate::data::loader::LoadOptions;

// ---------------------------------------------------------------------------
// Workflow file
// ---------------------------------------------------------------------------

/// A batch of charts rendered from one dataset, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workflow {
    pub dataset: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub load: LoadOptions,
    #[serde(default)]
    pub charts: Vec<ChartJob>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("figures")
}

fn default_columns() -> usize {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Trend,
    Grid,
    Pairs,
}

/// A single value or a list, so `"organism": "E. coli"` and
/// `"organism": ["E. coli", "S. aureus"]` both work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(vs) => vs.clone(),
        }
    }
}

fn values(field: &Option<OneOrMany>) -> Vec<String> {
    field.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
}

/// One chart to render. Which fields apply depends on `kind`:
/// `grid` uses `organisms`/`regions`/`columns`, the others use the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartJob {
    pub kind: ChartKind,
    /// File name; relative paths land in the workflow's output directory.
    pub output: PathBuf,
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub organism: Option<OneOrMany>,
    #[serde(default)]
    pub region: Option<OneOrMany>,
    #[serde(default)]
    pub group: Option<OneOrMany>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub from: Option<i32>,
    #[serde(default)]
    pub to: Option<i32>,

    #[serde(default)]
    pub organisms: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default = "default_columns")]
    pub columns: usize,

    #[serde(default)]
    pub regression: bool,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl ChartJob {
    pub fn selection(&self) -> Selection {
        Selection::from_filters(
            &values(&self.organism),
            &values(&self.region),
            &values(&self.group),
            self.year,
            self.from,
            self.to,
        )
    }

    /// Explicit size, falling back to `preferred` for missing dimensions.
    pub fn size(&self, preferred: (u32, u32)) -> (u32, u32) {
        (
            self.width.unwrap_or(preferred.0),
            self.height.unwrap_or(preferred.1),
        )
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.kind == ChartKind::Grid {
            if self.organisms.is_empty() || self.regions.is_empty() {
                bail!("chart #{index}: grid needs non-empty 'organisms' and 'regions'");
            }
            if self.columns == 0 {
                bail!("chart #{index}: grid 'columns' must be at least 1");
            }
        }
        if self.width == Some(0) || self.height == Some(0) {
            bail!("chart #{index}: width and height must be positive");
        }
        Ok(())
    }
}

impl Workflow {
    /// Read a workflow file. Relative `dataset` and `output_dir` paths are
    /// resolved against the directory containing the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading workflow {}", path.display()))?;
        let mut workflow: Workflow = serde_json::from_str(&text)
            .with_context(|| format!("parsing workflow {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        if workflow.dataset.is_relative() {
            workflow.dataset = base.join(&workflow.dataset);
        }
        if workflow.output_dir.is_relative() {
            workflow.output_dir = base.join(&workflow.output_dir);
        }
        for (i, job) in workflow.charts.iter().enumerate() {
            job.validate(i)?;
        }
        Ok(workflow)
    }

    pub fn output_path(&self, job: &ChartJob) -> PathBuf {
        self.output_dir.join(&job.output)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::data::loader::MalformedRowPolicy;

    const WORKFLOW: &str = r#"{
        "dataset": "ECDC_percentage_resistant.csv",
        "load": { "on_malformed": "quarantine" },
        "charts": [
            { "kind": "bar", "output": "estonia_2021.png",
              "organism": "Pseudomonas aeruginosa", "region": "Estonia", "year": 2021 },
            { "kind": "trend", "output": "kp.pdf", "organism": ["Klebsiella pneumoniae"],
              "from": 2010, "regression": true, "width": 900 },
            { "kind": "grid", "output": "grid.png", "columns": 2,
              "organisms": ["Klebsiella pneumoniae"], "regions": ["Greece", "Bulgaria"] },
            { "kind": "pairs", "output": "pairs.svg" }
        ]
    }"#;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("workflow.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_jobs_and_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let wf = Workflow::load(&write(&dir, WORKFLOW)).unwrap();

        assert_eq!(wf.dataset, dir.path().join("ECDC_percentage_resistant.csv"));
        assert_eq!(wf.output_dir, dir.path().join("figures"));
        assert_eq!(wf.load.on_malformed, MalformedRowPolicy::Quarantine);
        assert_eq!(wf.load.delimiter, ',');
        assert_eq!(wf.charts.len(), 4);

        let bar = &wf.charts[0];
        assert_eq!(bar.kind, ChartKind::Bar);
        assert_eq!(bar.selection().describe(), "Pseudomonas aeruginosa, Estonia, 2021");
        assert_eq!(wf.output_path(bar), dir.path().join("figures").join("estonia_2021.png"));

        let trend = &wf.charts[1];
        assert!(trend.regression);
        assert_eq!(trend.size((1200, 800)), (900, 800));

        let grid = &wf.charts[2];
        assert_eq!(grid.columns, 2);
        assert_eq!(wf.charts[3].columns, 4);
    }

    #[test]
    fn grid_without_regions_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{ "dataset": "d.csv", "charts": [
                { "kind": "grid", "output": "g.png", "organisms": ["E. coli"] } ] }"#,
        );
        let err = Workflow::load(&path).unwrap_err();
        assert!(err.to_string().contains("grid"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{ "dataset": "d.csv", "charts": [ { "kind": "bar", "output": "b.png", "regoin": "Malta" } ] }"#,
        );
        assert!(Workflow::load(&path).is_err());
    }
}
