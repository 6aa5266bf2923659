//! Excel (.xlsx) destination adapter. `rust_xlsxwriter` is write-only (no
//! existing-workbook read support), so this adapter keeps the accumulated
//! rows in memory for the process lifetime and rewrites the whole
//! worksheet on every `append_batch` call.

use std::{path::PathBuf, sync::Mutex};

use model::core::value::DataMap;
use rust_xlsxwriter::Workbook;

use crate::error::DbError;

pub struct ExcelAdapter {
    path: PathBuf,
    sheet_name: String,
    rows: Mutex<Vec<DataMap>>,
}

impl ExcelAdapter {
    pub fn new(path: impl Into<PathBuf>, sheet_name: impl Into<String>) -> Self {
        ExcelAdapter {
            path: path.into(),
            sheet_name: sheet_name.into(),
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn append_batch(&self, new_rows: &[DataMap]) -> Result<(), DbError> {
        if new_rows.is_empty() {
            return Ok(());
        }

        let mut rows = self.rows.lock().expect("excel row buffer poisoned");
        rows.extend_from_slice(new_rows);

        let mut columns: Vec<String> = rows[0].keys().cloned().collect();
        columns.sort();

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(&self.sheet_name)
            .map_err(|e| DbError::Write(e.to_string()))?;

        for (col, name) in columns.iter().enumerate() {
            sheet
                .write_string(0, col as u16, name)
                .map_err(|e| DbError::Write(e.to_string()))?;
        }
        for (row_idx, row) in rows.iter().enumerate() {
            for (col, name) in columns.iter().enumerate() {
                let value = row
                    .get(name)
                    .map(|v| v.to_display_string())
                    .unwrap_or_default();
                sheet
                    .write_string(row_idx as u32 + 1, col as u16, &value)
                    .map_err(|e| DbError::Write(e.to_string()))?;
            }
        }

        workbook
            .save(&self.path)
            .map_err(|e| DbError::Write(e.to_string()))?;
        Ok(())
    }
}
