use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{ExpressionMatrix, MetadataValue, SpatialDataset};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a spatial omics dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per observation; numeric columns are proteins,
///   string / bool / categorical columns are observation metadata
/// * `.csv`     – same layout as Parquet; numeric-looking columns are proteins
///
/// Numeric columns still serve as grouping keys, so integer sample IDs work
/// either way (see `SpatialDataset::group_labels`).
/// * `.json`    – `{ "var_names": [...], "X": [[...], ...], "obs": {...} }`
pub fn load_file(path: &Path) -> Result<SpatialDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;

    if dataset.feature_names().is_empty() {
        bail!("No numeric protein columns found");
    }
    if dataset.is_empty() {
        bail!("Dataset contains no observations");
    }
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Annotated-matrix layout: `X` holds one row per observation, `obs` holds
/// one array per metadata column.
///
/// ```json
/// {
///   "var_names": ["CD3", "CD8", "PanCK"],
///   "X": [[1.0, 0.2, 5.1], [0.0, 3.3, 0.7]],
///   "obs": { "ImageID": ["s1", "s2"] }
/// }
/// ```
#[derive(Debug, Deserialize)]
struct JsonDataset {
    var_names: Vec<String>,
    #[serde(rename = "X")]
    x: Vec<Vec<f64>>,
    #[serde(default)]
    obs: serde_json::Map<String, JsonValue>,
}

fn load_json(path: &Path) -> Result<SpatialDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let parsed: JsonDataset = serde_json::from_str(&text).context("parsing JSON")?;

    let n_features = parsed.var_names.len();
    let n_obs = parsed.x.len();
    let mut values = Vec::with_capacity(n_obs * n_features);
    for (i, row) in parsed.x.into_iter().enumerate() {
        if row.len() != n_features {
            bail!("Row {i}: expected {n_features} values but found {}", row.len());
        }
        values.extend(row);
    }
    let matrix = ExpressionMatrix::new(values, n_obs, parsed.var_names)?;

    let mut obs_columns = Vec::with_capacity(parsed.obs.len());
    for (name, column) in parsed.obs {
        let cells = column
            .as_array()
            .with_context(|| format!("obs column '{name}' is not an array"))?;
        obs_columns.push((name, cells.iter().map(json_to_metadata).collect()));
    }

    Ok(SpatialDataset::new(matrix, obs_columns)?)
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
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one row per observation.
/// A column whose non-empty cells all parse as floats is a protein (empty
/// cells become NaN); every other column is observation metadata.
fn load_csv(path: &Path) -> Result<SpatialDataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "CSV row {row_no}: expected {} fields but found {}",
                headers.len(),
                record.len()
            );
        }
        for (col, cell) in columns.iter_mut().zip(record.iter()) {
            col.push(cell.trim().to_string());
        }
    }

    let mut feature_names = Vec::new();
    let mut feature_columns = Vec::new();
    let mut obs_columns = Vec::new();

    for (name, cells) in headers.into_iter().zip(columns) {
        match parse_numeric_column(&cells) {
            Some(values) => {
                feature_names.push(name);
                feature_columns.push(values);
            }
            None => {
                let values = cells.iter().map(|c| guess_metadata_type(c)).collect();
                obs_columns.push((name, values));
            }
        }
    }

    let n_obs = obs_columns
        .first()
        .map(|(_, v): &(String, Vec<MetadataValue>)| v.len())
        .or_else(|| feature_columns.first().map(Vec::len))
        .unwrap_or(0);
    let matrix = if feature_columns.is_empty() {
        ExpressionMatrix::new(Vec::new(), n_obs, Vec::new())?
    } else {
        ExpressionMatrix::from_columns(feature_names, feature_columns)?
    };
    Ok(SpatialDataset::new(matrix, obs_columns)?)
}

/// `Some` when every non-empty cell is a float and at least one cell is set.
fn parse_numeric_column(cells: &[String]) -> Option<Vec<f64>> {
    let mut any_value = false;
    let values = cells
        .iter()
        .map(|c| {
            if c.is_empty() {
                Some(f64::NAN)
            } else {
                any_value = true;
                c.parse::<f64>().ok()
            }
        })
        .collect::<Option<Vec<f64>>>()?;
    any_value.then_some(values)
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
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
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing one row per observation.
///
/// Expected schema:
/// - float / integer columns – protein measurements
/// - Utf8 / LargeUtf8 / Boolean / Dictionary columns – observation metadata
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<SpatialDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let mut feature_names = Vec::new();
    let mut meta_names = Vec::new();
    for field in schema.fields() {
        if is_measurement_type(field.data_type()) {
            feature_names.push(field.name().clone());
        } else {
            meta_names.push(field.name().clone());
        }
    }

    let mut feature_columns: Vec<Vec<f64>> = vec![Vec::new(); feature_names.len()];
    let mut meta_columns: BTreeMap<String, Vec<MetadataValue>> = BTreeMap::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        for (name, values) in feature_names.iter().zip(feature_columns.iter_mut()) {
            let col = batch
                .column_by_name(name)
                .with_context(|| format!("Parquet batch missing '{name}' column"))?;
            values.extend(extract_f64_column(col).with_context(|| format!("reading '{name}'"))?);
        }

        for name in &meta_names {
            let col = batch
                .column_by_name(name)
                .with_context(|| format!("Parquet batch missing '{name}' column"))?;
            let cells = extract_metadata_column(col)
                .with_context(|| format!("reading metadata column '{name}'"))?;
            meta_columns.entry(name.clone()).or_default().extend(cells);
        }
    }

    let n_obs = feature_columns
        .first()
        .map(Vec::len)
        .or_else(|| meta_columns.values().next().map(Vec::len))
        .unwrap_or(0);
    let matrix = if feature_names.is_empty() {
        ExpressionMatrix::new(Vec::new(), n_obs, Vec::new())?
    } else {
        ExpressionMatrix::from_columns(feature_names, feature_columns)?
    };
    let obs_columns = meta_names
        .into_iter()
        .map(|name| {
            let cells = meta_columns.remove(&name).unwrap_or_default();
            (name, cells)
        })
        .collect();
    Ok(SpatialDataset::new(matrix, obs_columns)?)
}

// -- Parquet / Arrow helpers --

fn is_measurement_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Float64
            | DataType::Float32
            | DataType::Float16
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Cast a numeric column to `f64`, nulls become NaN.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    let as_f64 = cast(col, &DataType::Float64).context("casting to Float64")?;
    let arr = as_f64.as_primitive::<Float64Type>();
    Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Convert a whole Arrow column into metadata values.
///
/// Strings and booleans keep their type; everything else (dictionary
/// categoricals, dates, timestamps, decimals, …) is rendered with Arrow's
/// display formatting so distinct values stay distinct.
fn extract_metadata_column(col: &Arc<dyn Array>) -> Result<Vec<MetadataValue>> {
    let cell = |row: usize, value: MetadataValue| {
        if col.is_null(row) {
            MetadataValue::Null
        } else {
            value
        }
    };
    let values: Vec<MetadataValue> = match col.data_type() {
        DataType::Utf8 => {
            let arr = col.as_string::<i32>();
            (0..arr.len())
                .map(|i| cell(i, MetadataValue::String(arr.value(i).to_string())))
                .collect()
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            (0..arr.len())
                .map(|i| cell(i, MetadataValue::String(arr.value(i).to_string())))
                .collect()
        }
        DataType::Boolean => {
            let arr = col.as_boolean();
            (0..arr.len())
                .map(|i| cell(i, MetadataValue::Bool(arr.value(i))))
                .collect()
        }
        other => {
            let formatter = ArrayFormatter::try_new(&**col, &FormatOptions::default())
                .with_context(|| format!("no display format for {other:?} column"))?;
            (0..col.len())
                .map(|i| cell(i, MetadataValue::String(formatter.value(i).to_string())))
                .collect()
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::array::{Date32Array, DictionaryArray, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Int32Type, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::Builder;

    use crate::data::model::FeatureMatrix;

    fn temp_with(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn csv_splits_numeric_and_metadata_columns() {
        let file = temp_with(
            ".csv",
            "ImageID,CD3,CD8\ns1,1.5,2\ns1,0,\ns2,3.25,4\n",
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.feature_names(), ["CD3", "CD8"]);
        assert_eq!(ds.obs_columns, vec!["ImageID"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.matrix.get(2, 0), 3.25);
        assert!(ds.matrix.get(1, 1).is_nan());
        assert_eq!(
            ds.obs_column("ImageID").unwrap()[2],
            MetadataValue::String("s2".into())
        );
    }

    #[test]
    fn json_reads_annotated_layout() {
        let file = temp_with(
            ".json",
            r#"{"var_names":["CD3","PanCK"],"X":[[1,2],[3,4]],"obs":{"ImageID":[7,8]}}"#,
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.feature_names(), ["CD3", "PanCK"]);
        assert_eq!(ds.matrix.values_for_feature(1, &[0, 1]).unwrap(), vec![2.0, 4.0]);
        assert_eq!(
            ds.obs_column("ImageID").unwrap(),
            [MetadataValue::Integer(7), MetadataValue::Integer(8)]
        );
    }

    #[test]
    fn json_rejects_ragged_rows() {
        let file = temp_with(".json", r#"{"var_names":["A","B"],"X":[[1,2],[3]]}"#);
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Row 1"));
    }

    #[test]
    fn parquet_reads_measurements_and_categoricals() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("CD3", DataType::Float64, true),
            Field::new("count", DataType::Int32, false),
            Field::new("region", DataType::Utf8, false),
            Field::new(
                "ImageID",
                DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8)),
                false,
            ),
        ]));
        let image_ids: DictionaryArray<Int32Type> =
            vec!["s1", "s2", "s1"].into_iter().collect();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![Some(1.0), None, Some(3.0)])),
                Arc::new(Int32Array::from(vec![4, 5, 6])),
                Arc::new(StringArray::from(vec!["tumor", "stroma", "tumor"])),
                Arc::new(image_ids),
            ],
        )
        .unwrap();

        let file = Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer =
            ArrowWriter::try_new(std::fs::File::create(file.path()).unwrap(), schema, None)
                .unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.feature_names(), ["CD3", "count"]);
        assert_eq!(ds.obs_columns, vec!["region", "ImageID"]);
        assert!(ds.matrix.get(1, 0).is_nan());
        assert_eq!(ds.matrix.get(2, 1), 6.0);
        assert_eq!(
            ds.obs_column("ImageID").unwrap()[1],
            MetadataValue::String("s2".into())
        );
    }

    #[test]
    fn csv_integer_sample_ids_group_cells() {
        let mut csv = String::from("ImageID,CD3\n");
        for i in 0..60 {
            csv.push_str(&format!("{},{}\n", if i < 30 { 1 } else { 2 }, i % 30 + 1));
        }
        let file = temp_with(".csv", &csv);
        let ds = load_file(file.path()).unwrap();

        let results = crate::snr::compute_snr(
            &ds,
            crate::snr::SnrParams::default(),
            &crate::data::grouping::Grouping::Column("ImageID".into()),
        )
        .unwrap();
        assert_eq!(results.samples(), vec!["1", "2"]);
        assert!(results.iter().all(|r| r.protein == "CD3"));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn parquet_dates_keep_distinct_labels() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("CD3", DataType::Float64, false),
            Field::new("acquired", DataType::Date32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0])),
                Arc::new(Date32Array::from(vec![Some(19723), Some(19724), None])),
            ],
        )
        .unwrap();

        let file = Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer =
            ArrowWriter::try_new(std::fs::File::create(file.path()).unwrap(), schema, None)
                .unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(file.path()).unwrap();
        assert_eq!(
            ds.obs_column("acquired").unwrap(),
            [
                MetadataValue::String("2024-01-01".into()),
                MetadataValue::String("2024-01-02".into()),
                MetadataValue::Null,
            ]
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = temp_with(".h5ad", "");
        let err = load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    #[test]
    fn metadata_only_file_is_rejected() {
        let file = temp_with(".csv", "ImageID,region\ns1,tumor\n");
        assert!(load_file(file.path()).is_err());
    }
}
