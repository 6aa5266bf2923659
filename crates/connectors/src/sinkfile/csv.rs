//! CSV destination adapter. Columns are written in the lexicographic
//! order `DataMap` (a `BTreeMap`) already iterates in, satisfying the
//! "columns sorted lexicographically" requirement without extra sorting.

use std::{path::Path, sync::Mutex};

use model::core::value::DataMap;

use crate::error::DbError;

pub struct CsvAdapter {
    writer: Mutex<csv::Writer<std::fs::File>>,
    header_written: Mutex<bool>,
}

impl CsvAdapter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let exists = path.as_ref().exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(CsvAdapter {
            writer: Mutex::new(csv::Writer::from_writer(file)),
            header_written: Mutex::new(exists),
        })
    }

    pub fn append(&self, row: &DataMap) -> Result<(), DbError> {
        let mut writer = self.writer.lock().expect("csv writer poisoned");
        let mut header_written = self.header_written.lock().expect("header flag poisoned");

        if !*header_written {
            let headers: Vec<&str> = row.keys().map(String::as_str).collect();
            writer
                .write_record(&headers)
                .map_err(|e| DbError::Write(e.to_string()))?;
            *header_written = true;
        }

        let values: Vec<String> = row.values().map(|v| v.to_display_string()).collect();
        writer
            .write_record(&values)
            .map_err(|e| DbError::Write(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}
