use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use parquet::arrow::ArrowWriter;

use tabular_lens::data::arrow_bridge::to_record_batch;
use tabular_lens::data::export::serialize;
use tabular_lens::{Cell, Column, ColumnType, Dataset};

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

    /// Missing with probability `p`.
    fn maybe(&mut self, p: f64, cell: Cell) -> Cell {
        if self.next_f64() < p {
            Cell::Missing
        } else {
            cell
        }
    }
}

/// (region, latitude, longitude, base demand)
const REGIONS: &[(&str, f64, f64, f64)] = &[
    ("Marmara", 41.01, 28.97, 120.0),
    ("Aegean", 38.42, 27.14, 80.0),
    ("Central Anatolia", 39.93, 32.86, 95.0),
    ("Mediterranean", 36.89, 30.71, 70.0),
];

fn build(rng: &mut SimpleRng, days: u64) -> Result<Dataset> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).context("start date")?;

    let mut date = Vec::new();
    let mut region = Vec::new();
    let mut units = Vec::new();
    let mut price = Vec::new();
    let mut lat = Vec::new();
    let mut lon = Vec::new();

    for day in 0..days {
        let d = start + Days::new(day);
        let midnight = d.and_hms_opt(0, 0, 0).context("midnight")?;
        // Mild yearly seasonality on demand.
        let season = 1.0 + 0.3 * (day as f64 / 365.0 * 2.0 * std::f64::consts::PI).sin();

        for &(name, la, lo, base) in REGIONS {
            let demand = rng.gauss(base * season, base * 0.15).max(0.0).round() as i64;
            let unit_price = (rng.gauss(24.9, 3.0).max(1.0) * 100.0).round() / 100.0;

            date.push(Cell::Date(midnight));
            region.push(Cell::from(name));
            units.push(rng.maybe(0.02, Cell::Integer(demand)));
            price.push(rng.maybe(0.02, Cell::Float(unit_price)));
            lat.push(Cell::Float(la + rng.gauss(0.0, 0.05)));
            lon.push(Cell::Float(lo + rng.gauss(0.0, 0.05)));
        }
    }

    Ok(Dataset::new(vec![
        Column::new("date", ColumnType::Temporal, date),
        Column::new("region", ColumnType::Categorical, region),
        Column::new("units", ColumnType::Numeric, units),
        Column::new("price", ColumnType::Numeric, price),
        Column::new("lat", ColumnType::Numeric, lat),
        Column::new("lon", ColumnType::Numeric, lon),
    ])?)
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);
    let dataset = build(&mut rng, 365)?;

    let out_dir = Path::new("sample_data");
    std::fs::create_dir_all(out_dir).context("creating sample_data/")?;

    let csv_path = out_dir.join("sales.csv");
    std::fs::write(&csv_path, serialize(&dataset)?).context("writing CSV")?;

    let parquet_path = out_dir.join("sales.parquet");
    let batch = to_record_batch(&dataset)?;
    let file = std::fs::File::create(&parquet_path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    println!(
        "Wrote {} rows to {} and {}",
        dataset.row_count(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
