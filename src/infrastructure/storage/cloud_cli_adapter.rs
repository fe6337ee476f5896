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

//! Bucket transport over the cloud vendors' CLIs: `gcloud storage`,
//! `aws s3` and `az storage blob`, picked from the URL scheme.

use crate::config::StagingConfig;
use crate::domain::errors::{LoaderError, Result};
use crate::ports::bucket_port::BucketPort;
use log::info;
use std::path::Path;
use std::process::Command;
use url::Url;

/// A fully built CLI invocation.
#[derive(Debug, PartialEq, Eq)]
struct CliCommand {
    program: &'static str,
    args: Vec<String>,
    envs: Vec<(&'static str, String)>,
}

impl CliCommand {
    fn run(&self, remote_url: &str) -> Result<()> {
        let output = Command::new(self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (*k, v.as_str())))
            .output()
            .map_err(|e| transfer_error(remote_url, format!("Failed to start {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(transfer_error(remote_url, stderr.trim().to_string()));
        }
        Ok(())
    }
}

pub struct CloudCliAdapter {
    staging: StagingConfig,
}

impl CloudCliAdapter {
    pub fn new(staging: StagingConfig) -> Self {
        Self { staging }
    }

    fn upload_command(&self, local: &Path, remote_url: &str) -> Result<CliCommand> {
        let local = local.to_string_lossy().into_owned();
        match scheme(remote_url)? {
            "gs" | "gcs" => Ok(CliCommand {
                program: "gcloud",
                args: vec!["storage".into(), "cp".into(), local, remote_url.to_string()],
                envs: vec![],
            }),
            "s3" => Ok(CliCommand {
                program: "aws",
                args: vec!["s3".into(), "cp".into(), local, remote_url.to_string()],
                envs: self.aws_env(),
            }),
            "az" | "azure" | "abfss" => {
                let mut args = self.azure_blob_args("upload", remote_url)?;
                args.extend(["--file".into(), local, "--overwrite".into()]);
                Ok(CliCommand {
                    program: "az",
                    args,
                    envs: self.azure_env(),
                })
            }
            other => Err(LoaderError::ConfigError(format!(
                "Unsupported bucket scheme '{}'",
                other
            ))),
        }
    }

    fn delete_command(&self, remote_url: &str) -> Result<CliCommand> {
        match scheme(remote_url)? {
            "gs" | "gcs" => Ok(CliCommand {
                program: "gcloud",
                args: vec!["storage".into(), "rm".into(), remote_url.to_string()],
                envs: vec![],
            }),
            "s3" => Ok(CliCommand {
                program: "aws",
                args: vec!["s3".into(), "rm".into(), remote_url.to_string()],
                envs: self.aws_env(),
            }),
            "az" | "azure" | "abfss" => Ok(CliCommand {
                program: "az",
                args: self.azure_blob_args("delete", remote_url)?,
                envs: self.azure_env(),
            }),
            other => Err(LoaderError::ConfigError(format!(
                "Unsupported bucket scheme '{}'",
                other
            ))),
        }
    }

    /// Explicit keys override whatever profile the `aws` CLI would use.
    fn aws_env(&self) -> Vec<(&'static str, String)> {
        match (
            &self.staging.aws_access_key_id,
            &self.staging.aws_secret_access_key,
        ) {
            (Some(id), Some(secret)) => vec![
                ("AWS_ACCESS_KEY_ID", id.clone()),
                ("AWS_SECRET_ACCESS_KEY", secret.clone()),
            ],
            _ => vec![],
        }
    }

    /// `az://container/path/file` maps to container `container`, blob `path/file`.
    fn azure_blob_args(&self, action: &str, remote_url: &str) -> Result<Vec<String>> {
        let url = parse(remote_url)?;
        let container = url.host_str().unwrap_or_default().to_string();
        let blob = url.path().trim_start_matches('/').to_string();
        let account = self
            .staging
            .azure_storage_account_name
            .clone()
            .ok_or_else(|| {
                LoaderError::ConfigError(
                    "azure_storage_account_name is required for az:// buckets".to_string(),
                )
            })?;

        Ok(vec![
            "storage".to_string(),
            "blob".to_string(),
            action.to_string(),
            "--account-name".to_string(),
            account,
            "--container-name".to_string(),
            container,
            "--name".to_string(),
            blob,
        ])
    }

    /// `az` reads the SAS token from `AZURE_STORAGE_SAS_TOKEN`.
    fn azure_env(&self) -> Vec<(&'static str, String)> {
        self.staging
            .azure_sas_token
            .iter()
            .map(|t| ("AZURE_STORAGE_SAS_TOKEN", t.trim_start_matches('?').to_string()))
            .collect()
    }
}

impl BucketPort for CloudCliAdapter {
    fn upload(&self, local: &Path, remote_url: &str) -> Result<()> {
        info!("Uploading {} to {}", local.display(), remote_url);
        self.upload_command(local, remote_url)?.run(remote_url)
    }

    fn delete(&self, remote_url: &str) -> Result<()> {
        info!("Deleting {}", remote_url);
        self.delete_command(remote_url)?.run(remote_url)
    }
}

fn parse(remote_url: &str) -> Result<Url> {
    Url::parse(remote_url)
        .map_err(|e| LoaderError::ConfigError(format!("Invalid bucket url {}: {}", remote_url, e)))
}

fn scheme(remote_url: &str) -> Result<&str> {
    remote_url
        .split_once("://")
        .map(|(s, _)| s)
        .ok_or_else(|| LoaderError::ConfigError(format!("Invalid bucket url {}", remote_url)))
}

fn transfer_error(remote_url: &str, reason: String) -> LoaderError {
    LoaderError::TransferError {
        file: remote_url.to_string(),
        reason,
    }
}
