use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Column names of the surveillance export
// ---------------------------------------------------------------------------

pub const ORGANISM: &str = "Organism";
pub const REGION_NAME: &str = "RegionName";
pub const ANTIMICROBIAL_GROUP: &str = "AntimicrobialGroup";
pub const YEAR: &str = "Year";
pub const PERCENTAGE_RESISTANT: &str = "PercentageResistant";

/// Columns every dataset must provide, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    ORGANISM,
    REGION_NAME,
    ANTIMICROBIAL_GROUP,
    YEAR,
    PERCENTAGE_RESISTANT,
];

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a dynamically typed column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
/// Used as a map key downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put MetadataValue in BTreeMap keys --

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64` for numeric columns.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }

    /// Short dtype label, in the spirit of `DataFrame.info()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::String(_) => "string",
            MetadataValue::Integer(_) => "int64",
            MetadataValue::Float(_) => "float64",
            MetadataValue::Bool(_) => "bool",
            MetadataValue::Null => "null",
        }
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of the surveillance table
// ---------------------------------------------------------------------------

/// The key tuple of an observation. Not unique within a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObservationKey {
    pub organism: String,
    pub region: String,
    pub antimicrobial_group: String,
    pub year: i32,
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {}",
            self.organism, self.region, self.antimicrobial_group, self.year
        )
    }
}

/// A single resistance observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub organism: String,
    pub region: String,
    pub antimicrobial_group: String,
    pub year: i32,
    /// Percentage of tested isolates found resistant (0–100), if reported.
    pub percentage_resistant: Option<f64>,
    /// Any further columns of the source file: column_name → value.
    pub extra: BTreeMap<String, MetadataValue>,
}

impl Observation {
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            organism: self.organism.clone(),
            region: self.region.clone(),
            antimicrobial_group: self.antimicrobial_group.clone(),
            year: self.year,
        }
    }

    /// Look a column up by name. `None` means the column does not exist,
    /// `Some(MetadataValue::Null)` means the cell is empty.
    pub fn value(&self, column: &str) -> Option<MetadataValue> {
        match column {
            ORGANISM => Some(MetadataValue::String(self.organism.clone())),
            REGION_NAME => Some(MetadataValue::String(self.region.clone())),
            ANTIMICROBIAL_GROUP => Some(MetadataValue::String(self.antimicrobial_group.clone())),
            YEAR => Some(MetadataValue::Integer(self.year as i64)),
            PERCENTAGE_RESISTANT => Some(
                self.percentage_resistant
                    .map(MetadataValue::Float)
                    .unwrap_or(MetadataValue::Null),
            ),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// A row the loader refused, kept when running in quarantine mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line number in the source (record number for non-text formats).
    pub line: u64,
    pub column: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// ResistanceTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The loaded dataset. Read-only once built; selections produce copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResistanceTable {
    /// All observations (rows), in source order.
    pub observations: Vec<Observation>,
    /// Column names in source order, required columns included.
    pub column_names: Vec<String>,
    /// Rows skipped by the loader in quarantine mode.
    pub quarantined: Vec<RejectedRow>,
}

impl ResistanceTable {
    pub fn new(observations: Vec<Observation>, column_names: Vec<String>) -> Self {
        ResistanceTable {
            observations,
            column_names,
            quarantined: Vec::new(),
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        REQUIRED_COLUMNS.contains(&column) || self.column_names.iter().any(|c| c == column)
    }

    /// Copy of the rows at `indices`, in the order given.
    pub fn subset(&self, indices: &[usize]) -> ResistanceTable {
        ResistanceTable {
            observations: indices
                .iter()
                .filter_map(|&i| self.observations.get(i).cloned())
                .collect(),
            column_names: self.column_names.clone(),
            quarantined: Vec::new(),
        }
    }

    /// Columns whose non-null values are all numeric, in source order.
    /// Year and PercentageResistant always qualify.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.column_names
            .iter()
            .filter(|col| match col.as_str() {
                YEAR | PERCENTAGE_RESISTANT => true,
                ORGANISM | REGION_NAME | ANTIMICROBIAL_GROUP => false,
                other => {
                    let mut seen_value = false;
                    let all_numeric = self.observations.iter().all(|obs| {
                        match obs.extra.get(other) {
                            None | Some(MetadataValue::Null) => true,
                            Some(v) => {
                                seen_value = true;
                                v.as_f64().is_some()
                            }
                        }
                    });
                    all_numeric && seen_value
                }
            })
            .cloned()
            .collect()
    }

    /// Values of a numeric column, one entry per row (`None` when missing).
    pub fn numeric_values(&self, column: &str) -> Vec<Option<f64>> {
        self.observations
            .iter()
            .map(|obs| obs.value(column).and_then(|v| v.as_f64()))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn obs(organism: &str, region: &str, group: &str, year: i32, pct: Option<f64>) -> Observation {
        Observation {
            organism: organism.to_string(),
            region: region.to_string(),
            antimicrobial_group: group.to_string(),
            year,
            percentage_resistant: pct,
            extra: BTreeMap::new(),
        }
    }

    pub(crate) fn table(rows: Vec<Observation>) -> ResistanceTable {
        ResistanceTable::new(rows, REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn value_lookup_distinguishes_missing_cell_from_unknown_column() {
        let o = obs("Escherichia coli", "Malta", "Carbapenems", 2019, None);
        assert_eq!(o.value(PERCENTAGE_RESISTANT), Some(MetadataValue::Null));
        assert_eq!(o.value(YEAR), Some(MetadataValue::Integer(2019)));
        assert_eq!(o.value("NoSuchColumn"), None);
    }

    #[test]
    fn numeric_columns_skip_text_extras() {
        let mut a = obs("E. coli", "Malta", "Carbapenems", 2019, Some(1.0));
        a.extra.insert("NumIsolates".into(), MetadataValue::Integer(40));
        a.extra.insert("Unit".into(), MetadataValue::String("%".into()));
        let mut b = a.clone();
        b.extra.insert("NumIsolates".into(), MetadataValue::Null);

        let mut t = table(vec![a, b]);
        t.column_names.push("NumIsolates".into());
        t.column_names.push("Unit".into());

        assert_eq!(
            t.numeric_columns(),
            vec![YEAR.to_string(), PERCENTAGE_RESISTANT.to_string(), "NumIsolates".to_string()]
        );
        assert_eq!(t.numeric_values("NumIsolates"), vec![Some(40.0), None]);
    }

    #[test]
    fn subset_preserves_given_order_and_duplicates() {
        let t = table(vec![
            obs("A", "X", "G", 2000, Some(1.0)),
            obs("A", "X", "G", 2000, Some(1.0)),
            obs("B", "Y", "G", 2001, None),
        ]);
        let s = t.subset(&[2, 0, 1]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.observations[0].organism, "B");
        assert_eq!(s.observations[1], s.observations[2]);
    }
}
