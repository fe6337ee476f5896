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

//! # Load Executor
//!
//! Issues `COPY INTO` for one staged file and turns the per-file result rows
//! into a `CopyResult`. Rejected rows are reported, not retried: with
//! `ON_ERROR = CONTINUE` a partially loaded file is still a success.

use crate::domain::entities::{CopyResult, LoadJob, OnError, StageDescriptor, StageKind, StagedFile};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::snowflake_sql::{copy_into_statement, CopySource, TableRef};
use crate::ports::warehouse_port::{QueryResult, WarehousePort};
use log::{debug, info, warn};
use std::sync::Arc;

const PERMISSION_MARKERS: [&str; 4] = [
    "insufficient privileges",
    "not authorized",
    "access denied",
    "permission denied",
];

const SCHEMA_MARKERS: [&str; 4] = [
    "invalid identifier",
    "number of columns",
    "is not recognized",
    "type mismatch",
];

#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    pub on_error: OnError,
    pub csv_delimiter: u8,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            on_error: OnError::Continue,
            csv_delimiter: b',',
        }
    }
}

pub struct LoadExecutor {
    warehouse: Arc<dyn WarehousePort>,
    options: CopyOptions,
}

impl LoadExecutor {
    pub fn new(warehouse: Arc<dyn WarehousePort>, options: CopyOptions) -> Self {
        Self { warehouse, options }
    }

    /// Copies `staged` into `target`. The file must already be in the stage
    /// and `target` must already exist.
    pub fn copy(
        &self,
        job: &LoadJob,
        target: &TableRef,
        stage: &StageDescriptor,
        staged: &StagedFile,
    ) -> Result<CopyResult> {
        let source = copy_source(stage, staged);
        let sql = copy_into_statement(
            target,
            &source,
            &stage.credential,
            job.file_format,
            self.options.csv_delimiter,
            self.options.on_error,
        );
        debug!("{}", redact(&sql));

        let result = self
            .warehouse
            .execute(&sql)
            .map_err(|e| classify_error(&target.table, e))?;
        let copy = parse_copy_result(&target.table, &result)?;

        info!(
            "Copied {} into {}: {} rows loaded, {} rejected",
            staged.file_name, target, copy.rows_loaded, copy.rows_rejected
        );
        Ok(copy)
    }
}

fn copy_source(stage: &StageDescriptor, staged: &StagedFile) -> CopySource {
    match (stage.kind, &stage.bucket_url) {
        (StageKind::ExternalBucket, Some(bucket_url)) => {
            // Re-base the object URL onto the Snowflake form of the bucket.
            let suffix = staged
                .staged_path
                .strip_prefix(bucket_url.trim_end_matches('/'))
                .unwrap_or(&staged.staged_path);
            CopySource::Url(format!("{}{}", stage.location.trim_end_matches('/'), suffix))
        }
        (_, Some(_)) => CopySource::NamedStageFiles {
            stage: stage.location.clone(),
            files: vec![staged
                .bucket_path
                .clone()
                .unwrap_or_else(|| staged.file_name.clone())],
        },
        (_, None) => CopySource::StagePath(staged.staged_path.clone()),
    }
}

fn parse_copy_result(table: &str, result: &QueryResult) -> Result<CopyResult> {
    if result.column_index("rows_loaded").is_none() {
        // e.g. "Copy executed with 0 files processed." when the file was
        // loaded before and is skipped by the load metadata.
        warn!("Copy into {} processed no files", table);
        return Ok(CopyResult::default());
    }

    let mut copy = CopyResult::default();
    for row in 0..result.rows.len() {
        let number = |col: &str| {
            result
                .get(row, col)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0)
        };
        let parsed = number("rows_parsed");
        let loaded = number("rows_loaded");
        let errors = number("errors_seen");
        let status = result.get(row, "status").unwrap_or_default().to_uppercase();
        let first_error = result
            .get(row, "first_error")
            .filter(|e| !e.is_empty())
            .map(|e| e.to_string());

        if status == "LOAD_FAILED" && loaded == 0 {
            return Err(LoaderError::LoadError {
                table: table.to_string(),
                reason: first_error.unwrap_or_else(|| "load failed".to_string()),
            });
        }

        copy.rows_loaded += loaded;
        copy.rows_rejected += errors.max(parsed.saturating_sub(loaded));
        if copy.first_error.is_none() {
            copy.first_error = first_error;
        }
    }

    if copy.rows_rejected > 0 {
        warn!(
            "{} rows rejected while copying into {}: {}",
            copy.rows_rejected,
            table,
            copy.first_error.as_deref().unwrap_or("no error reported")
        );
    }
    Ok(copy)
}

/// Wraps a warehouse failure into a `LoadError`, naming the likely cause.
fn classify_error(table: &str, err: LoaderError) -> LoaderError {
    let message = match err {
        LoaderError::WarehouseError(m) => m,
        other => other.to_string(),
    };
    let lower = message.to_lowercase();
    let reason = if PERMISSION_MARKERS.iter().any(|m| lower.contains(m)) {
        format!("permission denied: {}", message)
    } else if SCHEMA_MARKERS.iter().any(|m| lower.contains(m)) {
        format!("schema mismatch: {}", message)
    } else {
        message
    };
    LoaderError::LoadError {
        table: table.to_string(),
        reason,
    }
}

/// Strips inline credentials before a statement is logged.
fn redact(sql: &str) -> String {
    sql.lines()
        .map(|l| {
            if l.starts_with("CREDENTIALS") {
                "CREDENTIALS = (***)"
            } else {
                l
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
