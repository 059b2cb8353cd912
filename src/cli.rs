use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use crate::config::{ChartJob, ChartKind, OneOrMany, Workflow};
use crate::data::filter::{select, Selection};
use crate::data::loader::{load_file, LoadOptions, MalformedRowPolicy};
use crate::data::model::{
    MetadataValue, ResistanceTable, ANTIMICROBIAL_GROUP, ORGANISM, REGION_NAME, YEAR,
};
use crate::data::summary::{describe, duplicate_keys, value_counts};
use crate::workflow;

#[derive(Debug, Parser)]
#[command(name = "amr-explorer", version, about = "Explore antimicrobial-resistance surveillance data")]
pub struct Cli {
    /// Field delimiter for delimited text files [default: ,]
    #[arg(long, global = true)]
    pub delimiter: Option<char>,
    /// Skip malformed rows instead of failing the load
    #[arg(long, global = true)]
    pub quarantine: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Row count, columns, year span and data quality
    Describe { data: PathBuf },
    /// Frequency tables and duplicated key tuples
    Counts {
        data: PathBuf,
        /// Column to count; repeatable
        #[arg(long = "column", short)]
        columns: Vec<String>,
    },
    /// Write matching rows as CSV to stdout
    Select {
        data: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Mean resistance per antimicrobial group, with standard-error bars
    Bar {
        data: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Resistance over time, one series per antimicrobial group
    Trend {
        data: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Add a least-squares fit with a 95% confidence band
        #[arg(long)]
        regression: bool,
    },
    /// One trend panel per organism/region pair
    Grid {
        data: PathBuf,
        /// Organism; repeatable
        #[arg(long = "organism", required = true)]
        organisms: Vec<String>,
        /// Region; repeatable
        #[arg(long = "region", required = true)]
        regions: Vec<String>,
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
        columns: u16,
        #[arg(long)]
        regression: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Scatter matrix of the numeric columns
    Pairs {
        data: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Render every chart of a workflow file
    Run { workflow: PathBuf },
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Keep these organisms; repeatable
    #[arg(long)]
    pub organism: Vec<String>,
    /// Keep these regions; repeatable
    #[arg(long)]
    pub region: Vec<String>,
    /// Keep these antimicrobial groups; repeatable
    #[arg(long)]
    pub group: Vec<String>,
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub year: Option<i32>,
    /// First year, inclusive
    #[arg(long)]
    pub from: Option<i32>,
    /// Last year, inclusive
    #[arg(long)]
    pub to: Option<i32>,
}

impl FilterArgs {
    pub fn selection(&self) -> Selection {
        Selection::from_filters(
            &self.organism,
            &self.region,
            &self.group,
            self.year,
            self.from,
            self.to,
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output file; format follows the extension (png, jpg, pdf, svg)
    #[arg(short, long)]
    pub output: PathBuf,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: Option<u32>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: Option<u32>,
}

fn many(values: &[String]) -> Option<OneOrMany> {
    (!values.is_empty()).then(|| OneOrMany::Many(values.to_vec()))
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        let mut options = LoadOptions::default();
        self.override_load(&mut options);
        options
    }

    /// Flags given on the command line take precedence over a workflow's `load` section.
    fn override_load(&self, load: &mut LoadOptions) {
        if let Some(delimiter) = self.delimiter {
            load.delimiter = delimiter;
        }
        if self.quarantine {
            load.on_malformed = MalformedRowPolicy::Quarantine;
        }
    }

    /// The chart this command asks for, as a workflow job.
    pub fn chart_job(&self) -> Option<ChartJob> {
        let (kind, filter, output, regression) = match &self.command {
            Commands::Bar { filter, output, .. } => (ChartKind::Bar, filter.clone(), output, false),
            Commands::Trend {
                filter,
                output,
                regression,
                ..
            } => (ChartKind::Trend, filter.clone(), output, *regression),
            Commands::Pairs { filter, output, .. } => {
                (ChartKind::Pairs, filter.clone(), output, false)
            }
            Commands::Grid {
                organisms,
                regions,
                columns,
                regression,
                output,
                ..
            } => {
                let mut job = job_from(ChartKind::Grid, &FilterArgs::default(), output, *regression);
                job.organisms = organisms.clone();
                job.regions = regions.clone();
                job.columns = usize::from(*columns);
                return Some(job);
            }
            _ => return None,
        };
        Some(job_from(kind, &filter, output, regression))
    }
}

fn job_from(kind: ChartKind, filter: &FilterArgs, output: &OutputArgs, regression: bool) -> ChartJob {
    ChartJob {
        kind,
        output: output.output.clone(),
        title: output.title.clone(),
        organism: many(&filter.organism),
        region: many(&filter.region),
        group: many(&filter.group),
        year: filter.year,
        from: filter.from,
        to: filter.to,
        organisms: Vec::new(),
        regions: Vec::new(),
        columns: 4,
        regression,
        width: output.width,
        height: output.height,
    }
}

fn load(path: &Path, options: &LoadOptions) -> Result<ResistanceTable> {
    load_file(path, options).with_context(|| format!("loading {}", path.display()))
}

/// Execute the parsed command line.
pub fn execute(cli: &Cli) -> Result<()> {
    let options = cli.load_options();
    let stdout = io::stdout();

    match &cli.command {
        Commands::Describe { data } => {
            let table = load(data, &options)?;
            writeln!(stdout.lock(), "{}", describe(&table))?;
        }
        Commands::Counts { data, columns } => {
            let table = load(data, &options)?;
            print_counts(&table, columns, &mut stdout.lock())?;
        }
        Commands::Select { data, filter } => {
            let table = load(data, &options)?;
            let subset = select(&table, &filter.selection());
            info!("{} of {} rows selected", subset.len(), table.len());
            write_csv(&subset, stdout.lock())?;
        }
        Commands::Bar { data, .. }
        | Commands::Trend { data, .. }
        | Commands::Grid { data, .. }
        | Commands::Pairs { data, .. } => {
            let table = load(data, &options)?;
            if let Some(job) = cli.chart_job() {
                if let Some(path) = workflow::render_job(&table, &job, &job.output)? {
                    writeln!(stdout.lock(), "{}", path.display())?;
                }
            }
        }
        Commands::Run { workflow: path } => {
            let mut wf = Workflow::load(path)?;
            cli.override_load(&mut wf.load);
            for written in workflow::run(&wf)? {
                writeln!(stdout.lock(), "{}", written.display())?;
            }
        }
    }
    Ok(())
}

const DEFAULT_COUNT_COLUMNS: [&str; 4] = [REGION_NAME, ANTIMICROBIAL_GROUP, ORGANISM, YEAR];

fn print_counts<W: Write>(table: &ResistanceTable, columns: &[String], out: &mut W) -> Result<()> {
    let columns: Vec<String> = if columns.is_empty() {
        DEFAULT_COUNT_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        columns.to_vec()
    };

    for column in &columns {
        let counts = value_counts(table, column)?;
        writeln!(out, "{column}")?;
        for (value, n) in counts {
            writeln!(out, "  {:<40} {n:>6}", value.to_string())?;
        }
        writeln!(out)?;
    }

    let duplicates = duplicate_keys(table);
    writeln!(out, "duplicated key tuples: {}", duplicates.len())?;
    for (key, n) in duplicates {
        writeln!(out, "  {key}  ×{n}")?;
    }
    Ok(())
}

/// Write `table` as CSV, all columns in source order. Empty cells stay empty.
pub fn write_csv<W: Write>(table: &ResistanceTable, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&table.column_names)?;
    for obs in &table.observations {
        let record = table.column_names.iter().map(|column| {
            match obs.value(column).unwrap_or(MetadataValue::Null) {
                MetadataValue::Null => String::new(),
                value => value.to_string(),
            }
        });
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}
