//! Human-readable structural summary of a record batch.

use arrow_array::{Array, RecordBatch};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Describe a batch: row and column counts, then one line per column with
/// its position, name, non-null count and data type.
///
/// ```text
/// RecordBatch: 2 entries
/// Data columns (total 2 columns):
///  #  Column  Non-Null Count  Dtype
/// --- ------  --------------  -----
///  0  name    2 non-null      Utf8
///  1  value   2 non-null      Int64
/// dtypes: Int64(1), Utf8(1)
/// memory usage: 192 bytes
/// ```
pub fn describe(batch: &RecordBatch) -> String {
    let schema = batch.schema();
    let rows = batch.num_rows();

    let mut lines: Vec<[String; 4]> = Vec::with_capacity(batch.num_columns());
    let mut dtypes: BTreeMap<String, usize> = BTreeMap::new();

    for (i, (field, column)) in schema.fields().iter().zip(batch.columns()).enumerate() {
        let dtype = field.data_type().to_string();
        *dtypes.entry(dtype.clone()).or_default() += 1;
        lines.push([
            i.to_string(),
            field.name().clone(),
            format!("{} non-null", rows - column.logical_null_count()),
            dtype,
        ]);
    }

    let headers = ["#", "Column", "Non-Null Count", "Dtype"];
    let mut widths = headers.map(str::len);
    for line in &lines {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "RecordBatch: {} entries", rows);
    let _ = writeln!(out, "Data columns (total {} columns):", lines.len());
    push_row(&mut out, &widths, &headers.map(str::to_string));
    push_row(&mut out, &widths, &headers.map(|h| "-".repeat(h.len())));
    for line in &lines {
        push_row(&mut out, &widths, line);
    }

    let dtypes = dtypes
        .iter()
        .map(|(dtype, count)| format!("{}({})", dtype, count))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "dtypes: {}", dtypes);
    let _ = writeln!(out, "memory usage: {} bytes", batch.get_array_memory_size());

    out
}

fn push_row(out: &mut String, widths: &[usize; 4], cells: &[String; 4]) {
    let row = widths
        .iter()
        .zip(cells)
        .map(|(width, cell)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, " {}", row.trim_end());
}
