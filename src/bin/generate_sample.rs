use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::ArrowWriter;

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

    /// Log-normal intensity, never negative.
    fn intensity(&mut self, median: f64, spread: f64) -> f64 {
        (median.ln() + self.gauss(0.0, spread)).exp()
    }
}

/// Marker panel: (name, background median, fraction of positive cells, fold change).
const PROTEINS: [(&str, f64, f64, f64); 12] = [
    ("DAPI", 40.0, 0.95, 1.5),
    ("CD3", 2.0, 0.25, 18.0),
    ("CD4", 1.5, 0.15, 12.0),
    ("CD8", 1.5, 0.10, 14.0),
    ("CD20", 1.0, 0.08, 20.0),
    ("CD68", 3.0, 0.12, 8.0),
    ("PanCK", 2.5, 0.40, 25.0),
    ("Ki67", 1.2, 0.10, 6.0),
    ("SMA", 4.0, 0.20, 5.0),
    ("PD-L1", 1.0, 0.05, 3.0),
    ("FoxP3", 0.8, 0.03, 10.0),
    ("Vimentin", 5.0, 0.30, 4.0),
];

fn main() {
    let mut rng = SimpleRng::new(42);

    // (sample id, number of cells, per-sample staining quality)
    // The last slide is too small to get any result.
    let samples = [("slide_A", 800, 1.0), ("slide_B", 600, 0.6), ("slide_C", 15, 1.0)];
    let regions = ["tumor", "stroma", "immune"];

    let mut image_ids: Vec<&str> = Vec::new();
    let mut region_col: Vec<&str> = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); PROTEINS.len()];
    // Mostly-zero channel: its noise slice averages to exactly zero.
    let mut dropout: Vec<f64> = Vec::new();

    for &(sample, n_cells, quality) in &samples {
        for _ in 0..n_cells {
            image_ids.push(sample);
            region_col.push(regions[(rng.next_u64() % regions.len() as u64) as usize]);

            for (col, &(_, background, positive_rate, fold)) in columns.iter_mut().zip(&PROTEINS) {
                let mut value = rng.intensity(background, 0.4);
                if rng.next_f64() < positive_rate {
                    value *= 1.0 + (fold - 1.0) * quality;
                }
                col.push(value);
            }

            dropout.push(if rng.next_f64() < 0.7 {
                0.0
            } else {
                rng.intensity(3.0, 0.5)
            });
        }
    }

    let mut fields = vec![
        Field::new("ImageID", DataType::Utf8, false),
        Field::new("region", DataType::Utf8, false),
    ];
    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(image_ids.clone())),
        Arc::new(StringArray::from(region_col)),
    ];
    for (&(name, ..), values) in PROTEINS.iter().zip(columns) {
        fields.push(Field::new(name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(values)));
    }
    fields.push(Field::new("CD45RO", DataType::Float64, false));
    arrays.push(Arc::new(Float64Array::from(dropout)));

    let schema = Arc::new(Schema::new(fields));
    let batch =
        RecordBatch::try_new(schema.clone(), arrays).expect("Failed to create RecordBatch");

    // Write Parquet
    let output_path = "sample_spatial.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    let preview = pretty_format_batches(&[batch.slice(0, 5)]).expect("Failed to format preview");
    println!("{preview}");
    println!(
        "Wrote {} cells from {} slides ({} proteins) to {output_path}",
        image_ids.len(),
        samples.len(),
        PROTEINS.len() + 1
    );
}
