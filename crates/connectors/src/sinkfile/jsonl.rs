//! JSONL destination adapter: appends one canonical-envelope-shaped JSON
//! object per line.

use std::path::Path;

use model::core::value::DataMap;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

use crate::error::DbError;

pub struct JsonlAdapter {
    path: std::path::PathBuf,
}

impl JsonlAdapter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonlAdapter {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub async fn append(&self, row: &DataMap) -> Result<(), DbError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = serde_json::to_string(row).map_err(|e| DbError::Write(e.to_string()))?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}
