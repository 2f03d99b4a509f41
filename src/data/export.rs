use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::model::{ColumnKey, MeasuredMatrix, RowLabel};

const LABEL_COLUMN: &str = "label";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Write a measured matrix to a file.  Dispatch by extension.
///
/// Layout: one row per matrix row, a leading `label` column holding
/// `OBS`/`STD`/realization number, then one column per data point named
/// `<key>/<index>`. Missing values are empty cells (CSV) or nulls (Parquet).
pub fn write_file(matrix: &MeasuredMatrix, path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "parquet" | "pq" => write_parquet(matrix, path),
        "csv" => write_csv(matrix, path),
        other => bail!("Unsupported output extension: .{other}"),
    }
}

/// Read back a matrix written by [`write_file`].
pub fn read_file(path: &Path) -> Result<MeasuredMatrix> {
    match extension(path).as_str() {
        "parquet" | "pq" => read_parquet(path),
        "csv" => read_csv(path),
        other => bail!("Unsupported input extension: .{other}"),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn parse_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Result<Vec<ColumnKey>> {
    headers
        .map(|h| h.parse::<ColumnKey>().map_err(anyhow::Error::msg))
        .collect()
}

fn parse_label(s: &str) -> Result<RowLabel> {
    s.parse::<RowLabel>().map_err(anyhow::Error::msg)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn write_csv(matrix: &MeasuredMatrix, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let mut header = vec![LABEL_COLUMN.to_string()];
    header.extend(matrix.columns().iter().map(ToString::to_string));
    writer.write_record(&header).context("writing CSV header")?;

    for (label, row) in matrix.rows().iter().zip(matrix.values().rows()) {
        let mut record = vec![label.to_string()];
        record.extend(row.iter().map(|v| if v.is_nan() { String::new() } else { v.to_string() }));
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {label}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn read_csv(path: &Path) -> Result<MeasuredMatrix> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    if headers.get(0) != Some(LABEL_COLUMN) {
        bail!("CSV missing leading '{LABEL_COLUMN}' column");
    }
    let columns = parse_columns(headers.iter().skip(1))?;

    let mut rows = Vec::new();
    let mut cells = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(parse_label(record.get(0).unwrap_or(""))?);
        for (j, tok) in record.iter().skip(1).enumerate() {
            let v = if tok.trim().is_empty() {
                f64::NAN
            } else {
                tok.trim()
                    .parse::<f64>()
                    .with_context(|| format!("Row {row_no}, column {j}: '{tok}' is not a number"))?
            };
            cells.push(v);
        }
    }

    let values = Array2::from_shape_vec((rows.len(), columns.len()), cells).context("CSV rows of uneven length")?;
    Ok(MeasuredMatrix::new(rows, columns, values))
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn write_parquet(matrix: &MeasuredMatrix, path: &Path) -> Result<()> {
    let mut fields = vec![Field::new(LABEL_COLUMN, DataType::Utf8, false)];
    fields.extend(
        matrix
            .columns()
            .iter()
            .map(|c| Field::new(c.to_string(), DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let labels: Vec<String> = matrix.rows().iter().map(ToString::to_string).collect();
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(labels))];
    for col in matrix.values().columns() {
        let values: Vec<Option<f64>> = col.iter().map(|v| (!v.is_nan()).then_some(*v)).collect();
        arrays.push(Arc::new(Float64Array::from(values)));
    }

    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;
    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<MeasuredMatrix> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Option<Vec<ColumnKey>> = None;
    let mut rows = Vec::new();
    let mut row_cells: Vec<Vec<f64>> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let label_idx = schema
            .index_of(LABEL_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{LABEL_COLUMN}' column"))?;
        if columns.is_none() {
            columns = Some(parse_columns(
                schema
                    .fields()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != label_idx)
                    .map(|(_, f)| f.name().as_str()),
            )?);
        }

        let labels = batch
            .column(label_idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .context("label column is not Utf8")?;
        let value_arrays: Vec<&Float64Array> = (0..batch.num_columns())
            .filter(|i| *i != label_idx)
            .map(|i| {
                batch
                    .column(i)
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .with_context(|| format!("column {i} is not Float64"))
            })
            .collect::<Result<_>>()?;

        for row in 0..batch.num_rows() {
            rows.push(parse_label(labels.value(row))?);
            row_cells.push(
                value_arrays
                    .iter()
                    .map(|a| if a.is_null(row) { f64::NAN } else { a.value(row) })
                    .collect(),
            );
        }
    }

    let columns = columns.unwrap_or_default();
    let cells: Vec<f64> = row_cells.into_iter().flatten().collect();
    let values = Array2::from_shape_vec((rows.len(), columns.len()), cells).context("parquet shape")?;
    Ok(MeasuredMatrix::new(rows, columns, values))
}
