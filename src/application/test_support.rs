//! Mock ports shared by the application tests.

use crate::domain::entities::{
    ColumnSchema, DataType, FileFormat, LoadJob, TableSchema, WriteDisposition,
};
use crate::domain::errors::{LoaderError, Result};
use crate::ports::bucket_port::BucketPort;
use crate::ports::warehouse_port::{QueryResult, WarehousePort};
use std::path::Path;
use std::sync::Mutex;

pub const LOAD_ID: &str = "1700000000.000001";

/// Records every statement. Canned results and failures are matched by
/// substring, first match wins.
#[derive(Default)]
pub struct RecordingWarehouse {
    statements: Mutex<Vec<String>>,
    responses: Vec<(String, QueryResult)>,
    failures: Vec<(String, String)>,
}

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, pattern: &str, result: QueryResult) -> Self {
        self.responses.push((pattern.to_string(), result));
        self
    }

    pub fn fail_on(mut self, pattern: &str, message: &str) -> Self {
        self.failures.push((pattern.to_string(), message.to_string()));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// Position of the first statement containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.statements().iter().position(|s| s.contains(pattern))
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.statements().iter().filter(|s| s.contains(pattern)).count()
    }
}

impl WarehousePort for RecordingWarehouse {
    fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.statements.lock().unwrap().push(sql.to_string());
        if let Some((_, msg)) = self.failures.iter().find(|(p, _)| sql.contains(p.as_str())) {
            return Err(LoaderError::WarehouseError(msg.clone()));
        }
        Ok(self
            .responses
            .iter()
            .find(|(p, _)| sql.contains(p.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingBucket {
    uploaded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_delete: bool,
}

impl RecordingBucket {
    /// A bucket whose deletes always fail.
    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Self::default()
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl BucketPort for RecordingBucket {
    fn upload(&self, _local: &Path, remote_url: &str) -> Result<()> {
        self.uploaded.lock().unwrap().push(remote_url.to_string());
        Ok(())
    }

    fn delete(&self, remote_url: &str) -> Result<()> {
        if self.fail_delete {
            return Err(LoaderError::WarehouseError("permission denied".into()));
        }
        self.deleted.lock().unwrap().push(remote_url.to_string());
        Ok(())
    }
}

pub fn sample_table(name: &str, disposition: WriteDisposition) -> TableSchema {
    let mut id = ColumnSchema::new("id", DataType::Bigint);
    id.primary_key = true;
    id.nullable = false;
    TableSchema {
        name: name.to_string(),
        columns: vec![id, ColumnSchema::new("value", DataType::Text)],
        write_disposition: disposition,
    }
}

/// Writes `content` into `dir` and returns an append job for it.
pub fn sample_job(dir: &Path, table: &str, content: &[u8]) -> LoadJob {
    sample_job_with(dir, table, "f0", content, WriteDisposition::Append)
}

pub fn sample_job_with(
    dir: &Path,
    table: &str,
    file_id: &str,
    content: &[u8],
    disposition: WriteDisposition,
) -> LoadJob {
    let path = dir.join(format!("{}.{}.jsonl.gz", table, file_id));
    std::fs::write(&path, content).unwrap();
    LoadJob {
        load_id: LOAD_ID.to_string(),
        file_id: file_id.to_string(),
        schema: "analytics".to_string(),
        table: sample_table(table, disposition),
        file_format: FileFormat::Jsonl,
        local_file: path,
        write_disposition: disposition,
    }
}

pub fn copy_result(rows: &[(&str, &str, u64, u64, u64, Option<&str>)]) -> QueryResult {
    QueryResult::new(
        ["file", "status", "rows_parsed", "rows_loaded", "errors_seen", "first_error"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rows.iter()
            .map(|(file, status, parsed, loaded, errors, first)| {
                vec![
                    Some(file.to_string()),
                    Some(status.to_string()),
                    Some(parsed.to_string()),
                    Some(loaded.to_string()),
                    Some(errors.to_string()),
                    first.map(|f| f.to_string()),
                ]
            })
            .collect(),
    )
}
