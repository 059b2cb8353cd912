use std::collections::HashMap;
use std::fmt;

use super::model::{MetadataValue, ObservationKey, ResistanceTable};
use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Frequency tables
// ---------------------------------------------------------------------------

/// Count rows per distinct value of `column`, most frequent first.
///
/// Ties keep first-seen order. Empty cells are counted under
/// [`MetadataValue::Null`], so the counts always sum to `table.len()`.
pub fn value_counts(
    table: &ResistanceTable,
    column: &str,
) -> Result<Vec<(MetadataValue, usize)>, QueryError> {
    if !table.has_column(column) {
        return Err(QueryError::UnknownColumn(column.to_string()));
    }

    let mut slots: HashMap<MetadataValue, usize> = HashMap::new();
    let mut counts: Vec<(MetadataValue, usize)> = Vec::new();
    for obs in &table.observations {
        let value = obs.value(column).unwrap_or(MetadataValue::Null);
        match slots.get(&value) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(value.clone(), counts.len());
                counts.push((value, 1));
            }
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}

/// Key tuples that occur more than once, with their multiplicity,
/// in order of first appearance.
pub fn duplicate_keys(table: &ResistanceTable) -> Vec<(ObservationKey, usize)> {
    let mut slots: HashMap<ObservationKey, usize> = HashMap::new();
    let mut counts: Vec<(ObservationKey, usize)> = Vec::new();
    for obs in &table.observations {
        let key = obs.key();
        match slots.get(&key) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }
    counts.retain(|(_, n)| *n > 1);
    counts
}

// ---------------------------------------------------------------------------
// Dataset overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub non_null: usize,
    /// Dtype of the non-null values, `"mixed"` when they disagree.
    pub dtype: String,
}

/// Shape of a table, in the spirit of `DataFrame.info()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
    pub year_span: Option<(i32, i32)>,
    /// (min, mean, max) over reported percentages.
    pub percentage: Option<(f64, f64, f64)>,
    pub duplicate_keys: usize,
    pub quarantined: usize,
}

pub fn describe(table: &ResistanceTable) -> Overview {
    let columns = table
        .column_names
        .iter()
        .map(|name| {
            let mut non_null = 0;
            let mut dtype: Option<&'static str> = None;
            for obs in &table.observations {
                let value = obs.value(name).unwrap_or(MetadataValue::Null);
                if value.is_null() {
                    continue;
                }
                non_null += 1;
                dtype = match dtype {
                    None => Some(value.type_name()),
                    Some(t) if t == value.type_name() => Some(t),
                    Some(_) => Some("mixed"),
                };
            }
            ColumnInfo {
                name: name.clone(),
                non_null,
                dtype: dtype.unwrap_or("null").to_string(),
            }
        })
        .collect();

    let year_span = table
        .observations
        .iter()
        .map(|o| o.year)
        .fold(None, |span: Option<(i32, i32)>, y| match span {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        });

    let pcts: Vec<f64> = table
        .observations
        .iter()
        .filter_map(|o| o.percentage_resistant)
        .collect();
    let percentage = if pcts.is_empty() {
        None
    } else {
        let min = pcts.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = pcts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = pcts.iter().sum::<f64>() / pcts.len() as f64;
        Some((min, mean, max))
    };

    Overview {
        rows: table.len(),
        columns,
        year_span,
        percentage,
        duplicate_keys: duplicate_keys(table).len(),
        quarantined: table.quarantined.len(),
    }
}

impl fmt::Display for Overview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} rows, {} columns", self.rows, self.columns.len())?;
        for (i, col) in self.columns.iter().enumerate() {
            writeln!(
                f,
                "  {i:>2}  {:<24} {:>8} non-null  {}",
                col.name, col.non_null, col.dtype
            )?;
        }
        if let Some((lo, hi)) = self.year_span {
            writeln!(f, "years: {lo}–{hi}")?;
        }
        if let Some((min, mean, max)) = self.percentage {
            writeln!(f, "resistance %: min {min:.1}, mean {mean:.1}, max {max:.1}")?;
        }
        writeln!(f, "duplicated key tuples: {}", self.duplicate_keys)?;
        write!(f, "quarantined rows: {}", self.quarantined)
    }
}
