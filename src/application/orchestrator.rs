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

//! The core application logic that orchestrates a load package.
//!
//! Jobs are grouped by table. Tables load in parallel; the files of one table
//! load in order so the disposition's prepare and finalize steps run exactly
//! once around them. A failing table never stops the others.

use crate::application::cleanup::CleanupPolicy;
use crate::application::disposition::DispositionStrategy;
use crate::application::file_uploader::FileUploader;
use crate::application::load_executor::{CopyOptions, LoadExecutor};
use crate::application::schema_sync::SchemaSync;
use crate::application::stage_manager::StageManager;
use crate::config::AppConfig as Config;
use crate::domain::entities::{FileReport, JobPhase, LoadJob, TableLoadResult, TableLoadState};
use crate::domain::errors::Result;
use crate::domain::snowflake_sql::TableRef;
use crate::ports::bucket_port::BucketPort;
use crate::ports::job_source_port::{JobSourcePort, LoadPackage};
use crate::ports::warehouse_port::WarehousePort;
use log::{error, info};
use rayon::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Loads every job of a package into Snowflake.
pub struct Orchestrator {
    job_source: Arc<dyn JobSourcePort>,
    warehouse: Arc<dyn WarehousePort>,
    stage_manager: StageManager,
    uploader: FileUploader,
    executor: LoadExecutor,
    cleanup: CleanupPolicy,
    schema_sync: SchemaSync,
    strategy: DispositionStrategy,
    config: Config,
}

impl Orchestrator {
    pub fn new(
        job_source: Arc<dyn JobSourcePort>,
        warehouse: Arc<dyn WarehousePort>,
        bucket: Option<Arc<dyn BucketPort>>,
        config: Config,
    ) -> Result<Self> {
        Self::with_stage_manager(
            job_source,
            warehouse,
            bucket,
            StageManager::new(&config.destination),
            config,
        )
    }

    /// Like `new`, with an explicit stage manager (and so its environment).
    pub fn with_stage_manager(
        job_source: Arc<dyn JobSourcePort>,
        warehouse: Arc<dyn WarehousePort>,
        bucket: Option<Arc<dyn BucketPort>>,
        stage_manager: StageManager,
        config: Config,
    ) -> Result<Self> {
        let dest = &config.destination;
        let options = CopyOptions {
            on_error: dest.on_error,
            csv_delimiter: config.csv_delimiter()?,
        };
        Ok(Self {
            uploader: FileUploader::new(warehouse.clone(), bucket.clone(), &dest.dataset_name),
            executor: LoadExecutor::new(warehouse.clone(), options),
            cleanup: CleanupPolicy::new(dest.keep_staged_files, warehouse.clone(), bucket),
            schema_sync: SchemaSync::new(warehouse.clone()),
            strategy: DispositionStrategy::new(dest.replace_strategy),
            stage_manager,
            job_source,
            warehouse,
            config,
        })
    }

    /// Runs the whole package and writes the load report.
    ///
    /// Only failures to read the package or to write the report are returned
    /// as errors; table failures are reported in the results.
    pub fn run(&self) -> Result<Vec<TableLoadResult>> {
        let start_time = Instant::now();
        let load_id = self.job_source.load_id().to_string();
        info!("Starting load {}...", load_id);

        let package = self.job_source.load_jobs()?;
        if package.is_empty() {
            info!("No load jobs found in package {}.", load_id);
            return Ok(vec![]);
        }
        let LoadPackage {
            jobs,
            failed_tables,
        } = package;

        let mut by_table: BTreeMap<String, Vec<LoadJob>> = BTreeMap::new();
        for job in jobs {
            by_table.entry(job.table_name().to_string()).or_default().push(job);
        }
        info!("Loading {} tables", by_table.len());

        let mut results: Vec<TableLoadResult> = by_table
            .into_par_iter()
            .map(|(table, jobs)| match self.process_table(&table, &jobs) {
                Ok(res) => res,
                Err(e) => {
                    error!("Table {} failed: {}", table, e);
                    let first = &jobs[0];
                    TableLoadResult::failure(
                        first.schema.clone(),
                        table,
                        first.write_disposition,
                        e.to_string(),
                    )
                }
            })
            .collect();
        results.extend(failed_tables);

        self.generate_report(&load_id, &results, start_time.elapsed().as_secs_f64())?;

        Ok(results)
    }

    /// Loads all files of one table. `jobs` is never empty.
    fn process_table(&self, table: &str, jobs: &[LoadJob]) -> Result<TableLoadResult> {
        let start_time = Instant::now();
        let first = &jobs[0];
        info!("Processing {}.{} ({} files)", first.schema, table, jobs.len());

        let mut state = TableLoadState::new(table);
        let mut schema = first.table.clone();
        schema.write_disposition = first.write_disposition;

        let table_stage_name = self
            .config
            .table_config(table)
            .and_then(|t| t.stage_name.as_deref());
        let stage = self.stage_manager.resolve(table, table_stage_name)?;

        let target = TableRef::new(
            &self.config.destination.credentials.database,
            &first.schema,
            table,
        );
        let plan = self.strategy.plan(&schema, &target);

        self.schema_sync.materialize(&target, &schema)?;
        if plan.uses_staging() {
            self.schema_sync.materialize(&plan.copy_target, &schema)?;
        }
        state.advance(JobPhase::Materialized)?;

        plan.run_prepare(self.warehouse.as_ref())?;

        let mut files = Vec::with_capacity(jobs.len());
        for job in jobs {
            let staged = self.uploader.upload(job, &stage)?;
            state.advance(JobPhase::Staged)?;

            let copy = self.executor.copy(job, &plan.copy_target, &stage, &staged)?;
            state.advance(JobPhase::Copied)?;

            let copy = self.cleanup.apply(&stage, &staged, copy);
            files.push(FileReport {
                file_name: staged.file_name,
                sha256: staged.sha256,
                bytes: staged.bytes,
                rows_loaded: copy.rows_loaded,
                rows_rejected: copy.rows_rejected,
                retained: copy.staged_file_retained,
                first_error: copy.first_error,
            });
        }

        plan.run_finalize(self.warehouse.as_ref())?;
        state.advance(JobPhase::Finalized)?;

        let result = TableLoadResult::success(
            first.schema.clone(),
            table.to_string(),
            plan.disposition,
            files,
            start_time.elapsed().as_secs_f64(),
        );
        info!(
            "Loaded {}: {} rows, {} rejected in {:.2}s",
            target, result.rows_loaded, result.rows_rejected, result.duration
        );
        Ok(result)
    }

    fn generate_report(
        &self,
        load_id: &str,
        results: &[TableLoadResult],
        duration_secs: f64,
    ) -> Result<()> {
        let success = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - success;
        let total_rows: u64 = results.iter().map(|r| r.rows_loaded).sum();
        let total_rejected: u64 = results.iter().map(|r| r.rows_rejected).sum();
        let total_files: usize = results.iter().map(|r| r.files.len()).sum();
        let total_bytes: u64 = results
            .iter()
            .flat_map(|r| r.files.iter().map(|f| f.bytes))
            .sum();

        let report = json!({
            "summary": {
                "load_id": load_id,
                "finished_at": chrono::Local::now().to_rfc3339(),
                "total_tables": results.len(),
                "success": success,
                "failed": failed,
                "total_files": total_files,
                "total_bytes": total_bytes,
                "total_rows_loaded": total_rows,
                "total_rows_rejected": total_rejected,
                "total_duration_seconds": duration_secs,
            },
            "details": results
        });

        let output_dir = &self.config.load.output_dir;
        std::fs::create_dir_all(output_dir)?;
        let report_path = format!("{}/load_report_{}.json", output_dir, load_id);
        let file = std::fs::File::create(&report_path)?;
        serde_json::to_writer_pretty(file, &report)?;
        info!("Report written to {}", report_path);

        Ok(())
    }
}
