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

//! # Stage Manager
//!
//! Decides where a table's files are staged. Precedence:
//! 1. a named stage (table override first, then the destination setting),
//!    bucket backed when a staging bucket is configured;
//! 2. the staging bucket itself, with credentials passed inline;
//! 3. the table stage `@%"table"`, or the user stage `@~` when table stages
//!    are disabled.

use crate::config::{DestinationConfig, StagingConfig};
use crate::domain::entities::{CredentialRef, StageDescriptor, StageKind};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::snowflake_sql::{table_stage, to_snowflake_url, user_stage};
use log::debug;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct StageManager {
    stage_name: Option<String>,
    use_table_stage: bool,
    staging: Option<StagingConfig>,
    env: EnvLookup,
}

impl StageManager {
    pub fn new(destination: &DestinationConfig) -> Self {
        Self {
            stage_name: destination.stage_name.clone(),
            use_table_stage: destination.use_table_stage,
            staging: destination.staging.clone(),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replaces the environment used to find bucket credentials.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// Resolves the stage for `table`. `table_stage_name` is the per-table
    /// override from the configuration.
    pub fn resolve(&self, table: &str, table_stage_name: Option<&str>) -> Result<StageDescriptor> {
        let bucket_url = self.staging.as_ref().map(|s| s.bucket_url.clone());

        let descriptor = if let Some(name) = table_stage_name.or(self.stage_name.as_deref()) {
            let credential = if bucket_url.is_some() {
                CredentialRef::StorageIntegration(name.to_string())
            } else {
                CredentialRef::Warehouse
            };
            StageDescriptor {
                kind: StageKind::Named,
                location: name.to_string(),
                bucket_url,
                credential,
            }
        } else if let Some(staging) = &self.staging {
            self.external_bucket(staging)?
        } else {
            let location = if self.use_table_stage {
                table_stage(table)
            } else {
                user_stage()
            };
            StageDescriptor {
                kind: StageKind::Internal,
                location,
                bucket_url: None,
                credential: CredentialRef::Warehouse,
            }
        };

        debug!(
            "Resolved {:?} stage '{}' for table {}",
            descriptor.kind, descriptor.location, table
        );
        Ok(descriptor)
    }

    fn external_bucket(&self, staging: &StagingConfig) -> Result<StageDescriptor> {
        let url = &staging.bucket_url;
        let scheme = url.split("://").next().unwrap_or_default();

        let credential = match scheme {
            "s3" => {
                let key_id = staging
                    .aws_access_key_id
                    .clone()
                    .or_else(|| (self.env)("AWS_ACCESS_KEY_ID"));
                let secret = staging
                    .aws_secret_access_key
                    .clone()
                    .or_else(|| (self.env)("AWS_SECRET_ACCESS_KEY"));
                match (key_id, secret) {
                    (Some(access_key_id), Some(secret_access_key)) => CredentialRef::AwsKeys {
                        access_key_id,
                        secret_access_key,
                    },
                    _ => {
                        return Err(LoaderError::ConfigError(format!(
                            "No AWS credentials resolvable for bucket {}; set aws_access_key_id/aws_secret_access_key or use a stage_name",
                            url
                        )))
                    }
                }
            }
            "az" | "azure" | "abfss" => {
                let token = staging
                    .azure_sas_token
                    .clone()
                    .or_else(|| (self.env)("AZURE_STORAGE_SAS_TOKEN"));
                match token {
                    Some(t) => CredentialRef::AzureSas(t),
                    None => {
                        return Err(LoaderError::ConfigError(format!(
                            "No Azure SAS token resolvable for bucket {}; set azure_sas_token or use a stage_name",
                            url
                        )))
                    }
                }
            }
            "gs" | "gcs" => {
                return Err(LoaderError::ConfigError(format!(
                    "Bucket {} can only be loaded through a named stage with a storage integration; set stage_name",
                    url
                )))
            }
            other => {
                return Err(LoaderError::ConfigError(format!(
                    "Unsupported bucket scheme '{}'",
                    other
                )))
            }
        };

        let location = to_snowflake_url(url, staging.azure_storage_account_name.as_deref())?;
        Ok(StageDescriptor {
            kind: StageKind::ExternalBucket,
            location,
            bucket_url: Some(url.clone()),
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{FileFormat, OnError, ReplaceStrategy};

    fn destination(stage_name: Option<&str>, staging: Option<StagingConfig>) -> DestinationConfig {
        DestinationConfig {
            dataset_name: "analytics".into(),
            credentials: Default::default(),
            stage_name: stage_name.map(|s| s.to_string()),
            keep_staged_files: true,
            use_table_stage: true,
            loader_file_format: FileFormat::Jsonl,
            replace_strategy: ReplaceStrategy::TruncateAndInsert,
            on_error: OnError::Continue,
            disable_compression: false,
            csv_delimiter: None,
            parquet_compression: None,
            staging,
        }
    }

    fn bucket(url: &str) -> StagingConfig {
        StagingConfig {
            bucket_url: url.into(),
            ..Default::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_is_table_stage() {
        let manager = StageManager::new(&destination(None, None)).with_env(no_env);
        let stage = manager.resolve("events", None).unwrap();
        assert_eq!(stage.kind, StageKind::Internal);
        assert_eq!(stage.location, "%\"events\"");
        assert_eq!(stage.credential, CredentialRef::Warehouse);
        assert!(!stage.is_bucket_backed());
    }

    #[test]
    fn test_user_stage_when_table_stage_disabled() {
        let mut dest = destination(None, None);
        dest.use_table_stage = false;
        let stage = StageManager::new(&dest).with_env(no_env).resolve("events", None).unwrap();
        assert_eq!(stage.kind, StageKind::Internal);
        assert_eq!(stage.location, "~");
    }

    #[test]
    fn test_named_stage_precedence() {
        let manager = StageManager::new(&destination(Some("PUBLIC.default_stage"), None)).with_env(no_env);
        let stage = manager.resolve("events", None).unwrap();
        assert_eq!(stage.kind, StageKind::Named);
        assert_eq!(stage.location, "PUBLIC.default_stage");

        let stage = manager.resolve("events", Some("PUBLIC.events_stage")).unwrap();
        assert_eq!(stage.location, "PUBLIC.events_stage");
    }

    #[test]
    fn test_named_stage_wins_over_bucket() {
        let manager = StageManager::new(&destination(
            Some("PUBLIC.dlt_gcs_stage"),
            Some(bucket("gs://bucket/data")),
        ))
        .with_env(no_env);
        let stage = manager.resolve("events", None).unwrap();
        assert_eq!(stage.kind, StageKind::Named);
        assert_eq!(stage.bucket_url.as_deref(), Some("gs://bucket/data"));
        assert_eq!(
            stage.credential,
            CredentialRef::StorageIntegration("PUBLIC.dlt_gcs_stage".into())
        );
    }

    #[test]
    fn test_gcs_bucket_without_stage_fails() {
        let manager = StageManager::new(&destination(None, Some(bucket("gs://bucket/data")))).with_env(no_env);
        let err = manager.resolve("events", None).unwrap_err();
        assert!(matches!(err, LoaderError::ConfigError(_)));
    }

    #[test]
    fn test_s3_bucket_credentials_from_env() {
        let manager = StageManager::new(&destination(None, Some(bucket("s3://bucket/data"))))
            .with_env(|k| match k {
                "AWS_ACCESS_KEY_ID" => Some("AKIA".to_string()),
                "AWS_SECRET_ACCESS_KEY" => Some("secret".to_string()),
                _ => None,
            });
        let stage = manager.resolve("events", None).unwrap();
        assert_eq!(stage.kind, StageKind::ExternalBucket);
        assert_eq!(stage.location, "s3://bucket/data");
        assert!(matches!(stage.credential, CredentialRef::AwsKeys { .. }));
    }

    #[test]
    fn test_s3_bucket_without_credentials_fails() {
        let manager = StageManager::new(&destination(None, Some(bucket("s3://bucket/data")))).with_env(no_env);
        assert!(matches!(
            manager.resolve("events", None),
            Err(LoaderError::ConfigError(_))
        ));
    }

    #[test]
    fn test_azure_bucket_with_sas_token() {
        let staging = StagingConfig {
            bucket_url: "az://container/data".into(),
            azure_storage_account_name: Some("acct".into()),
            azure_sas_token: Some("sv=1&sig=x".into()),
            ..Default::default()
        };
        let stage = StageManager::new(&destination(None, Some(staging)))
            .with_env(no_env)
            .resolve("events", None)
            .unwrap();
        assert_eq!(stage.location, "azure://acct.blob.core.windows.net/container/data");
        assert_eq!(stage.credential, CredentialRef::AzureSas("sv=1&sig=x".into()));
    }
}
