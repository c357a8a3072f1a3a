//! Parquet encoding of record batches.

use arrow_array::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use tablegate_common::{Error, Result};

/// Encode a batch as a Parquet file.
pub fn encode(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
        .map_err(|e| Error::Codec(format!("Arrow writer error: {}", e)))?;

    writer
        .write(batch)
        .map_err(|e| Error::Codec(format!("Write batch error: {}", e)))?;
    writer
        .close()
        .map_err(|e| Error::Codec(format!("Close writer error: {}", e)))?;

    Ok(buffer)
}

/// Decode a Parquet file into a single batch.
///
/// Row groups are concatenated in file order. A file without rows yields
/// an empty batch carrying the stored schema.
pub fn decode(data: Vec<u8>) -> Result<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))
        .map_err(|e| Error::Codec(format!("Parquet reader error: {}", e)))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| Error::Codec(format!("Build reader error: {}", e)))?;

    let mut batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Codec(format!("Read batch error: {}", e)))?;

    if batches.len() > 1 {
        return arrow_select::concat::concat_batches(&schema, &batches)
            .map_err(|e| Error::Codec(format!("Concat batches error: {}", e)));
    }

    Ok(batches
        .pop()
        .unwrap_or_else(|| RecordBatch::new_empty(schema)))
}
