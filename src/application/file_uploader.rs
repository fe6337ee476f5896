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

//! # File Uploader
//!
//! Pushes a serialized load file into its stage: a `PUT` through the
//! warehouse for internal and named stages, an object upload through the
//! `BucketPort` for bucket-backed stages. Retries are left to the transport.

use crate::domain::entities::{LoadJob, StageDescriptor, StagedFile};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::snowflake_sql::{internal_staged_path, put_statement};
use crate::ports::bucket_port::BucketPort;
use crate::ports::warehouse_port::WarehousePort;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// `PUT` statuses that mean the file is in the stage.
const PUT_OK_STATUSES: [&str; 2] = ["UPLOADED", "SKIPPED"];

pub struct FileUploader {
    warehouse: Arc<dyn WarehousePort>,
    bucket: Option<Arc<dyn BucketPort>>,
    dataset: String,
}

impl FileUploader {
    pub fn new(
        warehouse: Arc<dyn WarehousePort>,
        bucket: Option<Arc<dyn BucketPort>>,
        dataset: &str,
    ) -> Self {
        Self {
            warehouse,
            bucket,
            dataset: dataset.to_string(),
        }
    }

    /// Uploads the job's file and returns where it landed.
    pub fn upload(&self, job: &LoadJob, stage: &StageDescriptor) -> Result<StagedFile> {
        let file_name = job.file_name();
        let local = job.local_file.as_path();
        if !local.is_file() {
            return Err(transfer_error(&file_name, "local file does not exist"));
        }
        let (bytes, sha256) = digest_file(local)
            .map_err(|e| transfer_error(&file_name, &e.to_string()))?;

        let staged = match &stage.bucket_url {
            Some(bucket_url) => {
                let remote = self.remote_url(bucket_url, job, &file_name);
                let bucket = self.bucket.as_ref().ok_or_else(|| {
                    LoaderError::ConfigError(format!(
                        "Stage {} is bucket backed but no bucket transport is configured",
                        stage.location
                    ))
                })?;
                bucket
                    .upload(local, &remote)
                    .map_err(|e| transfer_error(&file_name, &e.to_string()))?;
                let bucket_path = Url::parse(&remote)
                    .map(|u| u.path().trim_start_matches('/').to_string())
                    .map_err(|e| transfer_error(&file_name, &e.to_string()))?;
                StagedFile {
                    file_name: file_name.clone(),
                    staged_path: remote,
                    bucket_path: Some(bucket_path),
                    bytes,
                    sha256,
                }
            }
            None => {
                self.put(local, &stage.location, &job.load_id, &file_name)?;
                StagedFile {
                    file_name: file_name.clone(),
                    staged_path: internal_staged_path(&stage.location, &job.load_id, &file_name),
                    bucket_path: None,
                    bytes,
                    sha256,
                }
            }
        };

        info!(
            "Staged {} ({} bytes) at {}",
            file_name, staged.bytes, staged.staged_path
        );
        Ok(staged)
    }

    fn put(&self, local: &Path, stage_location: &str, load_id: &str, file_name: &str) -> Result<()> {
        let abs = std::fs::canonicalize(local)
            .map_err(|e| transfer_error(file_name, &e.to_string()))?;
        let sql = put_statement(&abs.to_string_lossy(), stage_location, load_id);
        debug!("{}", sql);

        let result = self
            .warehouse
            .execute(&sql)
            .map_err(|e| transfer_error(file_name, &e.to_string()))?;

        for row in 0..result.rows.len() {
            let status = result.get(row, "status").unwrap_or_default();
            if !PUT_OK_STATUSES.contains(&status.to_uppercase().as_str()) {
                return Err(transfer_error(
                    file_name,
                    &format!("PUT returned status '{}'", status),
                ));
            }
        }
        Ok(())
    }

    /// `<bucket_url>/<dataset>/<table>/<load_id>/<file name>`
    fn remote_url(&self, bucket_url: &str, job: &LoadJob, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            bucket_url.trim_end_matches('/'),
            self.dataset,
            job.table_name(),
            job.load_id,
            file_name
        )
    }
}

fn transfer_error(file: &str, reason: &str) -> LoaderError {
    LoaderError::TransferError {
        file: file.to_string(),
        reason: reason.to_string(),
    }
}

/// Size and SHA-256 hex digest of a file.
fn digest_file(path: &Path) -> std::io::Result<(u64, String)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    let hex = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>();
    Ok((total, hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{sample_job, RecordingBucket, RecordingWarehouse};
    use crate::domain::entities::{CredentialRef, StageKind};
    use crate::ports::warehouse_port::QueryResult;

    fn internal_stage() -> StageDescriptor {
        StageDescriptor {
            kind: StageKind::Internal,
            location: "%\"events\"".into(),
            bucket_url: None,
            credential: CredentialRef::Warehouse,
        }
    }

    #[test]
    fn test_put_into_internal_stage() {
        let dir = tempfile::tempdir().unwrap();
        let job = sample_job(dir.path(), "events", b"{\"id\":1}\n");
        let warehouse = Arc::new(RecordingWarehouse::new());
        let uploader = FileUploader::new(warehouse.clone(), None, "analytics");

        let staged = uploader.upload(&job, &internal_stage()).unwrap();
        assert_eq!(staged.staged_path, format!("@%\"events\"/\"{}\"/{}", job.load_id, job.file_name()));
        assert_eq!(staged.bytes, 9);
        assert_eq!(staged.sha256.len(), 64);

        let statements = warehouse.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("PUT 'file://"));
        assert!(statements[0].contains("AUTO_COMPRESS = FALSE"));
    }

    #[test]
    fn test_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = sample_job(dir.path(), "events", b"x");
        job.local_file = dir.path().join("gone.jsonl.gz");
        let uploader = FileUploader::new(Arc::new(RecordingWarehouse::new()), None, "analytics");
        let err = uploader.upload(&job, &internal_stage()).unwrap_err();
        assert!(matches!(err, LoaderError::TransferError { .. }));
    }

    #[test]
    fn test_put_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let job = sample_job(dir.path(), "events", b"x");
        let warehouse = Arc::new(RecordingWarehouse::new().respond(
            "PUT",
            QueryResult::new(
                vec!["source".into(), "status".into()],
                vec![vec![Some(job.file_name()), Some("ERROR".into())]],
            ),
        ));
        let uploader = FileUploader::new(warehouse, None, "analytics");
        let err = uploader.upload(&job, &internal_stage()).unwrap_err();
        assert!(matches!(err, LoaderError::TransferError { .. }));
    }

    #[test]
    fn test_warehouse_failure_is_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let job = sample_job(dir.path(), "events", b"x");
        let warehouse = Arc::new(RecordingWarehouse::new().fail_on("PUT", "Insufficient privileges"));
        let uploader = FileUploader::new(warehouse, None, "analytics");
        match uploader.upload(&job, &internal_stage()) {
            Err(LoaderError::TransferError { reason, .. }) => {
                assert!(reason.contains("Insufficient privileges"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_upload_to_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let job = sample_job(dir.path(), "events", b"x");
        let warehouse = Arc::new(RecordingWarehouse::new());
        let bucket = Arc::new(RecordingBucket::default());
        let uploader = FileUploader::new(warehouse.clone(), Some(bucket.clone()), "analytics");
        let stage = StageDescriptor {
            kind: StageKind::Named,
            location: "PUBLIC.s3_stage".into(),
            bucket_url: Some("s3://bucket/root/".into()),
            credential: CredentialRef::StorageIntegration("PUBLIC.s3_stage".into()),
        };

        let staged = uploader.upload(&job, &stage).unwrap();
        let expected = format!(
            "s3://bucket/root/analytics/events/{}/{}",
            job.load_id,
            job.file_name()
        );
        assert_eq!(staged.staged_path, expected);
        assert_eq!(
            staged.bucket_path.as_deref(),
            Some(expected.trim_start_matches("s3://bucket/"))
        );
        assert_eq!(bucket.uploaded(), vec![expected]);
        assert!(warehouse.statements().is_empty());
    }

    #[test]
    fn test_bucket_stage_without_transport() {
        let dir = tempfile::tempdir().unwrap();
        let job = sample_job(dir.path(), "events", b"x");
        let uploader = FileUploader::new(Arc::new(RecordingWarehouse::new()), None, "analytics");
        let stage = StageDescriptor {
            kind: StageKind::ExternalBucket,
            location: "s3://bucket".into(),
            bucket_url: Some("s3://bucket".into()),
            credential: CredentialRef::Warehouse,
        };
        assert!(matches!(
            uploader.upload(&job, &stage),
            Err(LoaderError::ConfigError(_))
        ));
    }
}
