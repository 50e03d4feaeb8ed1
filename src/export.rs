use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::snr::SnrResultSet;

/// Default file name offered by the save dialog.
pub const DEFAULT_FILE_NAME: &str = "snr_results.csv";

const HEADER: [&str; 3] = ["Sample", "Protein", "SNR"];

/// Write `Sample,Protein,SNR` rows. Undefined ratios are written as empty
/// cells, the way dataframe CSV export writes missing values.
pub fn write_csv<W: Write>(writer: W, results: &SnrResultSet) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER).context("writing CSV header")?;
    for record in results {
        let snr = if record.snr.is_nan() {
            String::new()
        } else {
            record.snr.to_string()
        };
        wtr.write_record([record.sample.as_str(), record.protein.as_str(), snr.as_str()])
            .with_context(|| format!("writing row {}/{}", record.sample, record.protein))?;
    }
    wtr.flush().context("flushing CSV output")?;
    Ok(())
}

pub fn save_csv(path: &Path, results: &SnrResultSet) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_csv(std::io::BufWriter::new(file), results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snr::SnrRecord;

    fn to_csv_string(results: &SnrResultSet) -> String {
        let mut buf = Vec::new();
        write_csv(&mut buf, results).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn results() -> SnrResultSet {
        SnrResultSet {
            records: vec![
                SnrRecord {
                    sample: "s1".into(),
                    protein: "CD3".into(),
                    snr: 2.5,
                },
                SnrRecord {
                    sample: "s1".into(),
                    protein: "PD-L1, total".into(),
                    snr: f64::NAN,
                },
            ],
        }
    }

    #[test]
    fn header_and_nan_as_empty_cell() {
        let csv = to_csv_string(&results());
        assert_eq!(
            csv,
            "Sample,Protein,SNR\ns1,CD3,2.5\ns1,\"PD-L1, total\",\n"
        );
    }

    #[test]
    fn empty_results_still_have_header() {
        let csv = to_csv_string(&SnrResultSet::default());
        assert_eq!(csv, "Sample,Protein,SNR\n");
    }

    #[test]
    fn save_csv_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE_NAME);
        save_csv(&path, &results()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Sample,Protein,SNR\n"));
        assert_eq!(text.lines().count(), 3);
    }
}
