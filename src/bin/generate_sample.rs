use std::sync::Arc;

use arrow::array::{Float64Builder, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const ORGANISMS: [(&str, &[&str]); 8] = [
    ("Escherichia coli", &["Aminopenicillins", "Fluoroquinolones", "Carbapenems"]),
    ("Klebsiella pneumoniae", &["Fluoroquinolones", "Aminoglycosides", "Carbapenems"]),
    ("Pseudomonas aeruginosa", &["Piperacillin-tazobactam", "Carbapenems", "Aminoglycosides"]),
    ("Acinetobacter spp.", &["Carbapenems", "Fluoroquinolones"]),
    ("Staphylococcus aureus", &["Meticillin (MRSA)", "Rifampicin"]),
    ("Streptococcus pneumoniae", &["Penicillins", "Macrolides"]),
    ("Enterococcus faecalis", &["High-level gentamicin"]),
    ("Enterococcus faecium", &["Vancomycin", "Aminopenicillins"]),
];

const REGIONS: [&str; 10] = [
    "Greece", "Italy", "Malta", "Cyprus", "Bulgaria", "Estonia", "Latvia", "Sweden", "Norway",
    "Portugal",
];

const YEARS: std::ops::RangeInclusive<i32> = 2001..=2021;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Row {
    organism: &'static str,
    region: &'static str,
    group: &'static str,
    year: i32,
    percentage: Option<f64>,
    isolates: i64,
}

fn generate(rng: &mut SimpleRng) -> Vec<Row> {
    let mut rows = Vec::new();
    for (organism, groups) in ORGANISMS {
        for region in REGIONS {
            for group in groups.iter().copied() {
                // Per-series baseline and drift in percentage points per year.
                let base = rng.next_f64() * 40.0;
                let drift = rng.gauss(0.4, 0.6);
                let isolates_base = 50.0 + rng.next_f64() * 950.0;
                for year in YEARS {
                    let t = f64::from(year - YEARS.start());
                    let pct = (base + drift * t + rng.gauss(0.0, 2.5)).clamp(0.0, 100.0);
                    // About one cell in 25 is not reported.
                    let percentage = (rng.next_f64() >= 0.04).then(|| (pct * 10.0).round() / 10.0);
                    let isolates = (isolates_base * (1.0 + 0.03 * t)).round() as i64;
                    rows.push(Row {
                        organism,
                        region,
                        group,
                        year,
                        percentage,
                        isolates,
                    });
                }
            }
        }
    }
    rows
}

fn write_csv(rows: &[Row], path: &str) {
    let mut writer = csv::Writer::from_path(path).expect("Failed to create output file");
    writer
        .write_record([
            "Organism",
            "RegionName",
            "AntimicrobialGroup",
            "Year",
            "PercentageResistant",
            "NumIsolates",
        ])
        .expect("Failed to write header");
    for row in rows {
        writer
            .write_record([
                row.organism.to_string(),
                row.region.to_string(),
                row.group.to_string(),
                row.year.to_string(),
                row.percentage.map(|p| p.to_string()).unwrap_or_default(),
                row.isolates.to_string(),
            ])
            .expect("Failed to write row");
    }
    writer.flush().expect("Failed to flush writer");
}

fn write_parquet(rows: &[Row], path: &str) {
    let mut pct_builder = Float64Builder::new();
    for row in rows {
        pct_builder.append_option(row.percentage);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("Organism", DataType::Utf8, false),
        Field::new("RegionName", DataType::Utf8, false),
        Field::new("AntimicrobialGroup", DataType::Utf8, false),
        Field::new("Year", DataType::Int32, false),
        Field::new("PercentageResistant", DataType::Float64, true),
        Field::new("NumIsolates", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.organism))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.region))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.group))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
            Arc::new(pct_builder.finish()),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.isolates))),
        ],
    )
    .expect("Failed to create RecordBatch");

    let file = std::fs::File::create(path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");
}

fn main() {
    let stem = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_amr".to_string());
    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng);

    let csv_path = format!("{stem}.csv");
    let parquet_path = format!("{stem}.parquet");
    write_csv(&rows, &csv_path);
    write_parquet(&rows, &parquet_path);

    let missing = rows.iter().filter(|r| r.percentage.is_none()).count();
    println!(
        "Wrote {} observations ({missing} unreported) to {csv_path} and {parquet_path}",
        rows.len()
    );
}
