// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Domain Entities
//!
//! The nouns of the loader: load files, tables, stages, copy results and the
//! per-table report rows. Most of them derive `serde` traits so they can be
//! read from configuration and written into the JSON load report.

use crate::domain::errors::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// `FileFormat` defines how extracted records are serialized before staging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Newline-delimited JSON, gzip compressed unless compression is disabled.
    #[default]
    Jsonl,
    /// Comma-separated values with a header row, gzip compressed.
    Csv,
    /// Apache Parquet.
    Parquet,
}

impl FileFormat {
    /// File extension used for staged files of this format.
    pub fn extension(&self, compressed: bool) -> &'static str {
        match (self, compressed) {
            (FileFormat::Jsonl, true) => "jsonl.gz",
            (FileFormat::Jsonl, false) => "jsonl",
            (FileFormat::Csv, true) => "csv.gz",
            (FileFormat::Csv, false) => "csv",
            // Parquet compresses its pages internally.
            (FileFormat::Parquet, _) => "parquet",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Jsonl => write!(f, "JSONL"),
            FileFormat::Csv => write!(f, "CSV"),
            FileFormat::Parquet => write!(f, "PARQUET"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jsonl" | "json" => Ok(FileFormat::Jsonl),
            "csv" => Ok(FileFormat::Csv),
            "parquet" => Ok(FileFormat::Parquet),
            other => Err(LoaderError::ConfigError(format!(
                "Unsupported loader file format '{}'",
                other
            ))),
        }
    }
}

/// How new data interacts with the data already in the target table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteDisposition {
    #[default]
    Append,
    Replace,
    Merge,
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteDisposition::Append => write!(f, "append"),
            WriteDisposition::Replace => write!(f, "replace"),
            WriteDisposition::Merge => write!(f, "merge"),
        }
    }
}

/// Strategy used for the `replace` write disposition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceStrategy {
    /// Truncate the target, then copy straight into it.
    #[default]
    TruncateAndInsert,
    /// Copy into a staging table, then delete and re-insert in one transaction.
    InsertFromStaging,
    /// Copy into a staging table, clone it and swap it with the target.
    StagingOptimized,
}

/// Value of the `ON_ERROR` copy option.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Skip bad rows and report them as rejected.
    #[default]
    Continue,
    /// Abort the whole copy statement on the first bad row.
    AbortStatement,
}

impl OnError {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnError::Continue => "CONTINUE",
            OnError::AbortStatement => "ABORT_STATEMENT",
        }
    }
}

/// Logical column type of extracted data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Bigint,
    Double,
    Bool,
    Timestamp,
    Date,
    Time,
    Decimal,
    Binary,
    Json,
}

fn default_true() -> bool {
    true
}

/// A single column of a destination table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub merge_key: bool,
}

impl ColumnSchema {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable: true,
            primary_key: false,
            merge_key: false,
        }
    }
}

/// The blueprint of a destination table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

impl TableSchema {
    pub fn new(name: &str, write_disposition: WriteDisposition) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            write_disposition,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Keys used to find the rows a merge replaces: merge keys first,
    /// falling back to the primary key.
    pub fn merge_keys(&self) -> Vec<&str> {
        let merge: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.merge_key)
            .map(|c| c.name.as_str())
            .collect();
        if merge.is_empty() {
            self.primary_key()
        } else {
            merge
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Appends columns that are not yet part of the schema. Existing columns
    /// keep their declared type.
    pub fn merge_columns(&mut self, columns: impl IntoIterator<Item = ColumnSchema>) {
        for col in columns {
            if self.get_column(&col.name).is_none() {
                self.columns.push(col);
            }
        }
    }
}

/// A unit of work: one serialized file to be staged and copied into one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadJob {
    /// Identifier of the load package this job belongs to.
    pub load_id: String,
    /// Unique identifier of the file within the package.
    pub file_id: String,
    /// Target schema (dataset) in the warehouse.
    pub schema: String,
    /// The destination table, including its columns.
    pub table: TableSchema,
    pub file_format: FileFormat,
    /// Serialized file on the local disk.
    pub local_file: PathBuf,
    pub write_disposition: WriteDisposition,
}

impl LoadJob {
    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    /// Name of the file once staged.
    pub fn file_name(&self) -> String {
        self.local_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_id.clone())
    }
}

/// Where staged files land before the copy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Table stage (`@%"table"`) or user stage (`@~`).
    Internal,
    /// A stage created up front, either internal or backed by a bucket.
    Named,
    /// A bucket referenced directly by URL with inline credentials.
    ExternalBucket,
}

/// Credentials the warehouse needs to read the staged file.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialRef {
    /// The warehouse owns the stage; nothing to pass.
    Warehouse,
    /// The named stage carries a storage integration.
    StorageIntegration(String),
    AwsKeys {
        access_key_id: String,
        secret_access_key: String,
    },
    AzureSas(String),
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialRef::Warehouse => write!(f, "Warehouse"),
            CredentialRef::StorageIntegration(stage) => {
                write!(f, "StorageIntegration({})", stage)
            }
            CredentialRef::AwsKeys { access_key_id, .. } => {
                write!(f, "AwsKeys({}, ***)", access_key_id)
            }
            CredentialRef::AzureSas(_) => write!(f, "AzureSas(***)"),
        }
    }
}

/// The resolved staging location for a table. Immutable for the duration of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    /// Stage name without the `@` (e.g. `%"events"`, `~`, `PUBLIC.my_stage`)
    /// or the bucket URL for external buckets.
    pub location: String,
    /// Bucket the files are uploaded to, when the stage is bucket backed.
    pub bucket_url: Option<String>,
    pub credential: CredentialRef,
}

impl StageDescriptor {
    pub fn is_bucket_backed(&self) -> bool {
        self.bucket_url.is_some()
    }
}

/// A file that is present in a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagedFile {
    pub file_name: String,
    /// Full reference: `@stage/"load_id"/file` or the object URL.
    pub staged_path: String,
    /// Path inside the bucket, used in the `FILES` clause of bucket-backed stages.
    pub bucket_path: Option<String>,
    pub bytes: u64,
    pub sha256: String,
}

/// Outcome of one copy command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopyResult {
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    pub staged_file_retained: bool,
    pub first_error: Option<String>,
}

/// Phases a table goes through during a load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobPhase {
    Resolved,
    Materialized,
    Staged,
    Copied,
    Finalized,
}

impl JobPhase {
    /// A copy is only ever entered from `Staged`, which itself requires the
    /// table to be materialized. `Copied -> Staged` starts the next file.
    pub fn can_advance_to(&self, next: JobPhase) -> bool {
        matches!(
            (self, next),
            (JobPhase::Resolved, JobPhase::Materialized)
                | (JobPhase::Materialized, JobPhase::Staged)
                | (JobPhase::Staged, JobPhase::Copied)
                | (JobPhase::Copied, JobPhase::Staged)
                | (JobPhase::Copied, JobPhase::Finalized)
        )
    }
}

/// Tracks the phase of one table load and rejects out-of-order steps.
#[derive(Debug)]
pub struct TableLoadState {
    table: String,
    phase: JobPhase,
}

impl TableLoadState {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            phase: JobPhase::Resolved,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn advance(&mut self, next: JobPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(LoaderError::StateError(format!(
                "{}: cannot move from {:?} to {:?}",
                self.table, self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }
}

/// Per-file line of the load report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub file_name: String,
    pub sha256: String,
    pub bytes: u64,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    pub retained: bool,
    pub first_error: Option<String>,
}

/// The report card of one table load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLoadResult {
    pub schema: String,
    pub table: String,
    pub write_disposition: WriteDisposition,
    pub files: Vec<FileReport>,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    /// Wall-clock time in seconds.
    pub duration: f64,
    /// Either "SUCCESS" or "FAILED".
    pub status: String,
    pub error: Option<String>,
}

impl TableLoadResult {
    pub fn success(
        schema: String,
        table: String,
        write_disposition: WriteDisposition,
        files: Vec<FileReport>,
        duration: f64,
    ) -> Self {
        let rows_loaded = files.iter().map(|f| f.rows_loaded).sum();
        let rows_rejected = files.iter().map(|f| f.rows_rejected).sum();
        Self {
            schema,
            table,
            write_disposition,
            files,
            rows_loaded,
            rows_rejected,
            duration,
            status: "SUCCESS".to_string(),
            error: None,
        }
    }

    pub fn failure(
        schema: String,
        table: String,
        write_disposition: WriteDisposition,
        error: String,
    ) -> Self {
        Self {
            schema,
            table,
            write_disposition,
            files: Vec::new(),
            rows_loaded: 0,
            rows_rejected: 0,
            duration: 0.0,
            status: "FAILED".to_string(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_format_extension() {
        assert_eq!(FileFormat::Jsonl.extension(true), "jsonl.gz");
        assert_eq!(FileFormat::Csv.extension(false), "csv");
        assert_eq!(FileFormat::Parquet.extension(true), "parquet");
        assert_eq!("PARQUET".parse::<FileFormat>().unwrap(), FileFormat::Parquet);
        assert!("avro".parse::<FileFormat>().is_err());
    }

    #[test]
    fn test_merge_keys_fall_back_to_primary_key() {
        let mut table = TableSchema::new("events", WriteDisposition::Merge);
        let mut id = ColumnSchema::new("id", DataType::Bigint);
        id.primary_key = true;
        table.columns.push(id);
        assert_eq!(table.merge_keys(), vec!["id"]);

        let mut day = ColumnSchema::new("day", DataType::Date);
        day.merge_key = true;
        table.columns.push(day);
        assert_eq!(table.merge_keys(), vec!["day"]);
    }

    #[test]
    fn test_merge_columns_keeps_declared_types() {
        let mut table = TableSchema::new("t", WriteDisposition::Append);
        table.columns.push(ColumnSchema::new("ID", DataType::Text));
        table.merge_columns(vec![
            ColumnSchema::new("id", DataType::Bigint),
            ColumnSchema::new("value", DataType::Double),
        ]);
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0].data_type, DataType::Text);
        assert_eq!(table.columns[1].name, "value");
    }

    #[test]
    fn test_phase_transitions() {
        let mut state = TableLoadState::new("events");
        assert!(state.advance(JobPhase::Copied).is_err());
        state.advance(JobPhase::Materialized).unwrap();
        assert!(state.advance(JobPhase::Copied).is_err());
        state.advance(JobPhase::Staged).unwrap();
        state.advance(JobPhase::Copied).unwrap();
        state.advance(JobPhase::Staged).unwrap();
        state.advance(JobPhase::Copied).unwrap();
        state.advance(JobPhase::Finalized).unwrap();
        assert_eq!(state.phase(), JobPhase::Finalized);
        assert!(state.advance(JobPhase::Staged).is_err());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = CredentialRef::AwsKeys {
            access_key_id: "AKIA".into(),
            secret_access_key: "very-secret".into(),
        };
        let printed = format!("{:?}", cred);
        assert!(printed.contains("AKIA"));
        assert!(!printed.contains("very-secret"));
    }

    #[test]
    fn test_table_result_totals() {
        let files = vec![
            FileReport {
                file_name: "a".into(),
                sha256: "x".into(),
                bytes: 10,
                rows_loaded: 5,
                rows_rejected: 1,
                retained: false,
                first_error: None,
            },
            FileReport {
                file_name: "b".into(),
                sha256: "y".into(),
                bytes: 10,
                rows_loaded: 7,
                rows_rejected: 0,
                retained: true,
                first_error: None,
            },
        ];
        let res = TableLoadResult::success(
            "s".into(),
            "t".into(),
            WriteDisposition::Append,
            files,
            1.0,
        );
        assert!(res.is_success());
        assert_eq!(res.rows_loaded, 12);
        assert_eq!(res.rows_rejected, 1);
    }
}
