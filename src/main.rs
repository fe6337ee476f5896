//! `snowflake-loader`: loads a package of extracted JSONL files into
//! Snowflake through stages.

use clap::Parser;
use log::{error, info, warn};
use snowflake_loader::application::orchestrator::Orchestrator;
use snowflake_loader::application::runtime::RuntimeContext;
use snowflake_loader::config::{AppConfig, CliArgs};
use snowflake_loader::infrastructure::dry_run::dry_run_adapter::DryRunAdapter;
use snowflake_loader::infrastructure::local_storage::package_reader::PackageReader;
use snowflake_loader::infrastructure::snowsql::snowsql_adapter::SnowSqlAdapter;
use snowflake_loader::infrastructure::storage::cloud_cli_adapter::CloudCliAdapter;
use snowflake_loader::ports::bucket_port::BucketPort;
use snowflake_loader::ports::warehouse_port::WarehousePort;
use std::process;
use std::sync::Arc;

fn main() {
    // 1. Initialize Logging
    env_logger::init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config
    let mut config = if let Some(config_path) = &args.config {
        match AppConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config: {}", e);
                process::exit(1);
            }
        }
    } else {
        AppConfig::from_cli(&args)
    };

    // Merge CLI overrides, then resolve secrets
    let prepared = config
        .merge_cli(&args)
        .and_then(|_| config.resolve_credentials())
        .and_then(|_| config.validate());
    if let Err(e) = prepared {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    // 4. Setup Parallelism
    if let Err(e) = RuntimeContext::init(&config) {
        error!("Failed to initialize runtime: {}", e);
        process::exit(1);
    }

    // 5. Initialize Hexagonal Components
    let (warehouse, bucket): (Arc<dyn WarehousePort>, Option<Arc<dyn BucketPort>>) =
        if args.dry_run {
            warn!("Dry run: statements are printed, nothing is executed");
            let adapter = Arc::new(DryRunAdapter::new());
            let warehouse: Arc<dyn WarehousePort> = adapter.clone();
            let bucket: Arc<dyn BucketPort> = adapter;
            (warehouse, Some(bucket))
        } else {
            let warehouse = match SnowSqlAdapter::new(config.destination.credentials.clone()) {
                Ok(w) => w,
                Err(e) => {
                    error!("Invalid credentials: {}", e);
                    process::exit(1);
                }
            };
            let bucket = config
                .destination
                .staging
                .clone()
                .map(|s| Arc::new(CloudCliAdapter::new(s)) as Arc<dyn BucketPort>);
            (Arc::new(warehouse) as Arc<dyn WarehousePort>, bucket)
        };

    let job_source = match PackageReader::new(&config) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("Failed to open load package: {}", e);
            process::exit(1);
        }
    };

    // 6. Run Orchestrator
    let orchestrator = match Orchestrator::new(job_source, warehouse, bucket, config) {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to set up the load: {}", e);
            process::exit(1);
        }
    };

    info!("Starting load process...");
    match orchestrator.run() {
        Ok(results) => {
            let success_count = results.iter().filter(|r| r.is_success()).count();
            let rows: u64 = results.iter().map(|r| r.rows_loaded).sum();
            info!(
                "Load finished. {}/{} tables successful, {} rows loaded.",
                success_count,
                results.len(),
                rows
            );
            if success_count < results.len() {
                process::exit(2);
            }
        }
        Err(e) => {
            error!("Orchestrator failed: {}", e);
            process::exit(1);
        }
    }
}
