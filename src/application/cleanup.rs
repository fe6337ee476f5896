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

//! # Cleanup Policy
//!
//! Removes a staged file after its copy when `keep_staged_files` is off.
//! A failed removal never fails the load: the file is reported as retained.

use crate::domain::entities::{CopyResult, StageDescriptor, StagedFile};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::snowflake_sql::remove_statement;
use crate::ports::bucket_port::BucketPort;
use crate::ports::warehouse_port::WarehousePort;
use log::{debug, warn};
use std::sync::Arc;

pub struct CleanupPolicy {
    keep_staged_files: bool,
    warehouse: Arc<dyn WarehousePort>,
    bucket: Option<Arc<dyn BucketPort>>,
}

impl CleanupPolicy {
    pub fn new(
        keep_staged_files: bool,
        warehouse: Arc<dyn WarehousePort>,
        bucket: Option<Arc<dyn BucketPort>>,
    ) -> Self {
        Self {
            keep_staged_files,
            warehouse,
            bucket,
        }
    }

    /// Applies the policy to a copied file and returns the updated result.
    pub fn apply(
        &self,
        stage: &StageDescriptor,
        staged: &StagedFile,
        mut result: CopyResult,
    ) -> CopyResult {
        if self.keep_staged_files {
            result.staged_file_retained = true;
            return result;
        }

        match self.remove(stage, staged) {
            Ok(()) => {
                debug!("Removed staged file {}", staged.staged_path);
                result.staged_file_retained = false;
            }
            Err(e) => {
                warn!(
                    "Could not remove staged file {}, leaving it in place: {}",
                    staged.staged_path, e
                );
                result.staged_file_retained = true;
            }
        }
        result
    }

    fn remove(&self, stage: &StageDescriptor, staged: &StagedFile) -> Result<()> {
        if stage.is_bucket_backed() {
            match &self.bucket {
                Some(bucket) => bucket.delete(&staged.staged_path),
                None => Err(LoaderError::ConfigError(
                    "no bucket transport configured".to_string(),
                )),
            }
        } else {
            self.warehouse
                .execute(&remove_statement(&staged.staged_path))
                .map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{RecordingBucket, RecordingWarehouse};
    use crate::domain::entities::{CredentialRef, StageKind};

    fn internal() -> (StageDescriptor, StagedFile) {
        (
            StageDescriptor {
                kind: StageKind::Internal,
                location: "%\"events\"".into(),
                bucket_url: None,
                credential: CredentialRef::Warehouse,
            },
            StagedFile {
                file_name: "events.f0.jsonl.gz".into(),
                staged_path: "@%\"events\"/\"1\"/events.f0.jsonl.gz".into(),
                bucket_path: None,
                bytes: 10,
                sha256: "ab".into(),
            },
        )
    }

    fn loaded() -> CopyResult {
        CopyResult {
            rows_loaded: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_keep_staged_files_skips_removal() {
        let wh = Arc::new(RecordingWarehouse::new());
        let policy = CleanupPolicy::new(true, wh.clone(), None);
        let (stage, staged) = internal();
        let result = policy.apply(&stage, &staged, loaded());
        assert!(result.staged_file_retained);
        assert_eq!(result.rows_loaded, 3);
        assert!(wh.statements().is_empty());
    }

    #[test]
    fn test_remove_from_internal_stage() {
        let wh = Arc::new(RecordingWarehouse::new());
        let policy = CleanupPolicy::new(false, wh.clone(), None);
        let (stage, staged) = internal();
        let result = policy.apply(&stage, &staged, loaded());
        assert!(!result.staged_file_retained);
        assert_eq!(
            wh.statements(),
            vec!["REMOVE @%\"events\"/\"1\"/events.f0.jsonl.gz".to_string()]
        );
    }

    #[test]
    fn test_remove_failure_retains_file() {
        let wh = Arc::new(RecordingWarehouse::new().fail_on("REMOVE", "Insufficient privileges"));
        let policy = CleanupPolicy::new(false, wh, None);
        let (stage, staged) = internal();
        let result = policy.apply(&stage, &staged, loaded());
        assert!(result.staged_file_retained);
        assert_eq!(result.rows_loaded, 3);
    }

    #[test]
    fn test_remove_from_bucket() {
        let wh = Arc::new(RecordingWarehouse::new());
        let bucket = Arc::new(RecordingBucket::default());
        let policy = CleanupPolicy::new(false, wh.clone(), Some(bucket.clone()));
        let (mut stage, mut staged) = internal();
        stage.bucket_url = Some("s3://bucket".into());
        staged.staged_path = "s3://bucket/analytics/events/1/events.f0.jsonl.gz".into();

        let result = policy.apply(&stage, &staged, loaded());
        assert!(!result.staged_file_retained);
        assert_eq!(bucket.deleted(), vec![staged.staged_path.clone()]);
        assert!(wh.statements().is_empty());
    }

    #[test]
    fn test_bucket_delete_failure_retains_file() {
        let bucket = Arc::new(RecordingBucket::failing_delete());
        let policy = CleanupPolicy::new(false, Arc::new(RecordingWarehouse::new()), Some(bucket));
        let (mut stage, staged) = internal();
        stage.bucket_url = Some("s3://bucket".into());
        assert!(policy.apply(&stage, &staged, loaded()).staged_file_retained);
    }
}
