//! Parquet destination adapter. Unlike the line-oriented sinks, Parquet
//! files are written in row-group batches: the driver accumulates rows
//! per `replicateBatch` call and this adapter appends one row group per
//! call rather than per row.

use std::{path::PathBuf, sync::Arc};

use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType as ArrowDataType, Field, Schema};
use model::core::value::DataMap;
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

use crate::error::DbError;

pub struct ParquetAdapter {
    path: PathBuf,
}

impl ParquetAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ParquetAdapter { path: path.into() }
    }

    /// Writes one row group containing `rows`. Values are stringified via
    /// `to_display_string` — Parquet's typed-column model doesn't map
    /// cleanly onto arbitrary per-resource schemas without a prior schema
    /// negotiation pass, so this sink favors portability over native
    /// column typing.
    pub fn append_batch(&self, rows: &[DataMap]) -> Result<(), DbError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut columns: Vec<String> = rows[0].keys().cloned().collect();
        columns.sort();

        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(c, ArrowDataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<ArrayRef> = columns
            .iter()
            .map(|col| {
                let values: Vec<Option<String>> = rows
                    .iter()
                    .map(|row| row.get(col).map(|v| v.to_display_string()))
                    .collect();
                Arc::new(StringArray::from(values)) as ArrayRef
            })
            .collect();

        let batch = RecordBatch::try_new(schema.clone(), arrays)
            .map_err(|e| DbError::Write(e.to_string()))?;

        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(!self.path.exists())
            .open(&self.path)?;
        let mut writer = ArrowWriter::try_new(file, schema, Some(WriterProperties::builder().build()))
            .map_err(|e| DbError::Write(e.to_string()))?;
        writer
            .write(&batch)
            .map_err(|e| DbError::Write(e.to_string()))?;
        writer.close().map_err(|e| DbError::Write(e.to_string()))?;
        Ok(())
    }
}
