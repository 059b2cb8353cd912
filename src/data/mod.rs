/// Data layer: core types, loading, selection and summaries.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → ResistanceTable (reject or quarantine bad rows)
///   └──────────┘
///        │
///        ▼
///   ┌─────────────────┐
///   │ ResistanceTable  │  Vec<Observation>, multiset, read-only
///   └─────────────────┘
///        │
///        ├──────────────┐
///        ▼              ▼
///   ┌──────────┐   ┌──────────┐
///   │  filter   │   │ summary  │  value counts, duplicates, overview
///   └──────────┘   └──────────┘
///        │
///        ▼
///   derived subset → chart
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod summary;
