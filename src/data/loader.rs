use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::datatypes::DataType;
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::model::{
    MetadataValue, Observation, RejectedRow, ResistanceTable, ANTIMICROBIAL_GROUP, ORGANISM,
    PERCENTAGE_RESISTANT, REGION_NAME, REQUIRED_COLUMNS, YEAR,
};
use super::summary::duplicate_keys;
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do with a row that cannot be turned into an [`Observation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRowPolicy {
    /// Abort the load, naming the offending line and column.
    #[default]
    Reject,
    /// Skip the row and record it in [`ResistanceTable::quarantined`].
    Quarantine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Field delimiter for delimited text (`.tsv`/`.tab` always use tab).
    pub delimiter: char,
    pub on_malformed: MalformedRowPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            on_malformed: MalformedRowPolicy::Reject,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a surveillance dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – Arrow-typed columns
/// * `.json`    – `[{ "Organism": "...", "Year": 2020, ... }, ...]`
/// * `.tsv`     – tab separated text
/// * anything else – delimited text using [`LoadOptions::delimiter`]
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<ResistanceTable, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path, options)?,
        "json" => load_json(path, options)?,
        "tsv" | "tab" => load_delimited(path, b'\t', options)?,
        _ => {
            let delimiter = u8::try_from(options.delimiter)
                .ok()
                .filter(u8::is_ascii)
                .ok_or(LoadError::InvalidDelimiter(options.delimiter))?;
            load_delimited(path, delimiter, options)?
        }
    };

    info!(
        "loaded {} observations from {}",
        table.len(),
        path.display()
    );
    let duplicates = duplicate_keys(&table);
    if !duplicates.is_empty() {
        warn!(
            "{} key tuples occur more than once in {} (kept as separate observations)",
            duplicates.len(),
            path.display()
        );
    }
    Ok(table)
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                source,
                path: path.to_path_buf(),
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Row conversion shared by all formats
// ---------------------------------------------------------------------------

/// Raw cells of one source row: column_name → value.
type RawRecord = BTreeMap<String, MetadataValue>;

/// Why a raw record could not become an observation.
struct RowDefect {
    column: &'static str,
    reason: String,
}

impl RowDefect {
    fn new(column: &'static str, reason: impl Into<String>) -> Self {
        Self {
            column,
            reason: reason.into(),
        }
    }
}

fn observation_from_record(mut record: RawRecord) -> Result<Observation, RowDefect> {
    let organism = take_text(&mut record, ORGANISM)?;
    let region = take_text(&mut record, REGION_NAME)?;
    let antimicrobial_group = take_text(&mut record, ANTIMICROBIAL_GROUP)?;
    let year = take_year(&mut record)?;
    let percentage_resistant = take_percentage(&mut record)?;

    Ok(Observation {
        organism,
        region,
        antimicrobial_group,
        year,
        percentage_resistant,
        extra: record,
    })
}

fn take_text(record: &mut RawRecord, column: &'static str) -> Result<String, RowDefect> {
    match record.remove(column) {
        Some(MetadataValue::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        None | Some(MetadataValue::Null) | Some(MetadataValue::String(_)) => {
            Err(RowDefect::new(column, "missing value"))
        }
        Some(other) => Ok(other.to_string()),
    }
}

fn take_year(record: &mut RawRecord) -> Result<i32, RowDefect> {
    match record.remove(YEAR) {
        Some(MetadataValue::Integer(i)) => {
            i32::try_from(i).map_err(|_| RowDefect::new(YEAR, format!("year {i} out of range")))
        }
        Some(MetadataValue::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
            if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&f) {
                Ok(f as i32)
            } else {
                Err(RowDefect::new(YEAR, format!("year {f} out of range")))
            }
        }
        Some(MetadataValue::String(s)) if !s.trim().is_empty() => s
            .trim()
            .parse::<i32>()
            .map_err(|_| RowDefect::new(YEAR, format!("'{s}' is not an integer year"))),
        None | Some(MetadataValue::Null) | Some(MetadataValue::String(_)) => {
            Err(RowDefect::new(YEAR, "missing value"))
        }
        Some(other) => Err(RowDefect::new(
            YEAR,
            format!("'{other}' is not an integer year"),
        )),
    }
}

fn take_percentage(record: &mut RawRecord) -> Result<Option<f64>, RowDefect> {
    let value = match record.remove(PERCENTAGE_RESISTANT) {
        None | Some(MetadataValue::Null) => return Ok(None),
        Some(MetadataValue::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(v) => v,
    };
    let pct = value.as_f64().ok_or_else(|| {
        RowDefect::new(PERCENTAGE_RESISTANT, format!("'{value}' is not a number"))
    })?;
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(RowDefect::new(
            PERCENTAGE_RESISTANT,
            format!("{pct} is outside 0–100"),
        ));
    }
    Ok(Some(pct))
}

/// Accumulates observations, applying the malformed-row policy.
struct TableBuilder<'a> {
    path: &'a Path,
    policy: MalformedRowPolicy,
    observations: Vec<Observation>,
    quarantined: Vec<RejectedRow>,
}

impl<'a> TableBuilder<'a> {
    fn new(path: &'a Path, options: &LoadOptions) -> Self {
        Self {
            path,
            policy: options.on_malformed,
            observations: Vec::new(),
            quarantined: Vec::new(),
        }
    }

    fn push(&mut self, line: u64, record: RawRecord) -> Result<(), LoadError> {
        match observation_from_record(record) {
            Ok(obs) => {
                self.observations.push(obs);
                Ok(())
            }
            Err(defect) => self.reject(line, defect.column, defect.reason),
        }
    }

    fn reject(&mut self, line: u64, column: &str, reason: String) -> Result<(), LoadError> {
        match self.policy {
            MalformedRowPolicy::Reject => Err(LoadError::MalformedRow {
                path: self.path.to_path_buf(),
                line,
                column: column.to_string(),
                reason,
            }),
            MalformedRowPolicy::Quarantine => {
                warn!(
                    "{}: quarantined line {line} (column '{column}': {reason})",
                    self.path.display()
                );
                self.quarantined.push(RejectedRow {
                    line,
                    column: column.to_string(),
                    reason,
                });
                Ok(())
            }
        }
    }

    fn finish(self, column_names: Vec<String>) -> ResistanceTable {
        let mut table = ResistanceTable::new(self.observations, column_names);
        table.quarantined = self.quarantined;
        table
    }
}

fn check_required_columns(path: &Path, columns: &[String]) -> Result<(), LoadError> {
    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|c| c == required) {
            return Err(LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: required.to_string(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Header row with column names, one observation per line.
/// Columns beyond the required five are kept as extra metadata.
fn load_delimited(
    path: &Path,
    delimiter: u8,
    options: &LoadOptions,
) -> Result<ResistanceTable, LoadError> {
    let parse_err = |err: csv::Error| LoadError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let file = open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();
    check_required_columns(path, &headers)?;

    let mut builder = TableBuilder::new(path, options);

    for (row_no, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                if let csv::ErrorKind::UnequalLengths {
                    pos,
                    expected_len,
                    len,
                } = err.kind()
                {
                    let line = pos.as_ref().map(|p| p.line()).unwrap_or(row_no as u64 + 2);
                    builder.reject(
                        line,
                        "<row>",
                        format!("expected {expected_len} fields, found {len}"),
                    )?;
                    continue;
                }
                return Err(parse_err(err));
            }
        };
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(row_no as u64 + 2);

        let raw: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), cell_value(col, value)))
            .collect();
        builder.push(line, raw)?;
    }

    Ok(builder.finish(headers))
}

/// Key columns keep their source text as-is; other cells are typed.
fn cell_value(column: &str, s: &str) -> MetadataValue {
    match column {
        ORGANISM | REGION_NAME | ANTIMICROBIAL_GROUP => MetadataValue::String(s.to_string()),
        _ => guess_metadata_type(s),
    }
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s == "-" {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "Organism": "Klebsiella pneumoniae",
///     "RegionName": "Greece",
///     "AntimicrobialGroup": "Carbapenems",
///     "Year": 2020,
///     "PercentageResistant": 66.3
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path, options: &LoadOptions) -> Result<ResistanceTable, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let file = open(path)?;
    let root: JsonValue =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| parse_err(e.to_string()))?;
    let records = root
        .as_array()
        .ok_or_else(|| parse_err("expected top-level JSON array".to_string()))?;

    // Records carry no header: a column exists if any record has the key.
    let mut seen: Vec<String> = Vec::new();
    for obj in records.iter().filter_map(JsonValue::as_object) {
        for key in obj.keys() {
            if !seen.contains(key) {
                seen.push(key.clone());
            }
        }
    }
    check_required_columns(path, &seen)?;

    let mut column_names: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
    column_names.extend(seen.into_iter().filter(|k| !REQUIRED_COLUMNS.contains(&k.as_str())));

    let mut builder = TableBuilder::new(path, options);
    for (i, rec) in records.iter().enumerate() {
        let line = i as u64 + 1;
        let Some(obj) = rec.as_object() else {
            builder.reject(line, "<row>", "not a JSON object".to_string())?;
            continue;
        };
        let raw: RawRecord = obj
            .iter()
            .map(|(key, val)| (key.clone(), json_to_metadata(val)))
            .collect();
        builder.push(line, raw)?;
    }

    Ok(builder.finish(column_names))
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one observation per row.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Year may be stored as any integer or
/// integral float column.
fn load_parquet(path: &Path, options: &LoadOptions) -> Result<ResistanceTable, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: PathBuf::from(path),
        message,
    };

    let file = open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| parse_err(format!("reading parquet metadata: {e}")))?;
    let column_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    check_required_columns(path, &column_names)?;

    let reader = builder
        .build()
        .map_err(|e| parse_err(format!("building parquet reader: {e}")))?;

    let mut table = TableBuilder::new(path, options);
    let mut line: u64 = 0;

    for batch_result in reader {
        let batch = batch_result.map_err(|e| parse_err(format!("reading record batch: {e}")))?;
        let schema = batch.schema();

        for row in 0..batch.num_rows() {
            line += 1;
            let raw: RawRecord = schema
                .fields()
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    (
                        field.name().clone(),
                        extract_metadata_value(batch.column(i), row),
                    )
                })
                .collect();
            table.push(line, raw)?;
        }
    }

    Ok(table.finish(column_names))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|arr| MetadataValue::Integer(arr.value(row) as i64))
            .unwrap_or(MetadataValue::Null),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|arr| MetadataValue::Integer(arr.value(row)))
            .unwrap_or(MetadataValue::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|arr| MetadataValue::Float(arr.value(row) as f64))
            .unwrap_or(MetadataValue::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|arr| MetadataValue::Float(arr.value(row)))
            .unwrap_or(MetadataValue::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|arr| MetadataValue::Bool(arr.value(row)))
            .unwrap_or(MetadataValue::Null),
        other => MetadataValue::String(format!("{other:?}")),
    }
}
