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

//! Reads a load package from the local disk.
//!
//! A package is a directory of extracted JSONL files named
//! `<table>[.<anything>].jsonl`. Records of one table are gathered, their
//! schema inferred (configured columns win), split into chunks of
//! `file_max_items` and written as load files under
//! `<output_dir>/<load_id>/<table>.<file_id>.<ext>`.

use crate::config::AppConfig;
use crate::domain::entities::{
    ColumnSchema, DataType, LoadJob, TableLoadResult, TableSchema, WriteDisposition,
};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::type_mapper::{infer_from_json, widen};
use crate::infrastructure::local_storage::load_file_writer::{LoadFileWriter, Record};
use crate::ports::job_source_port::{JobSourcePort, LoadPackage};
use log::{error, info, warn};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const FILE_ID_LEN: usize = 10;

pub struct PackageReader {
    input_dir: PathBuf,
    output_dir: PathBuf,
    dataset: String,
    load_id: String,
    file_max_items: Option<usize>,
    writer: LoadFileWriter,
    config: AppConfig,
}

impl PackageReader {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let dest = &config.destination;
        let writer = LoadFileWriter::new(
            dest.loader_file_format,
            !dest.disable_compression,
            config.csv_delimiter()?,
            dest.parquet_compression.clone(),
        );
        Ok(Self {
            input_dir: PathBuf::from(&config.load.input_dir),
            output_dir: PathBuf::from(&config.load.output_dir),
            dataset: dest.dataset_name.clone(),
            load_id: new_load_id(),
            file_max_items: config.load.file_max_items,
            writer,
            config: config.clone(),
        })
    }

    pub fn with_load_id(mut self, load_id: &str) -> Self {
        self.load_id = load_id.to_string();
        self
    }

    /// Input files grouped by table name, in name order.
    fn discover(&self) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        let mut tables: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for entry in std::fs::read_dir(&self.input_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('.').next())
                .unwrap_or_default()
                .to_string();
            if name.is_empty() {
                warn!("Skipping file without a table name: {}", path.display());
                continue;
            }
            tables.entry(name).or_default().push(path);
        }
        for files in tables.values_mut() {
            files.sort();
        }
        Ok(tables)
    }

    fn write_disposition(&self, table: &str) -> WriteDisposition {
        self.config
            .table_config(table)
            .map(|t| t.write_disposition)
            .unwrap_or(WriteDisposition::Append)
    }

    /// The schema of `table`: configured columns first, then inferred ones.
    fn table_schema(&self, table: &str, records: &[Record]) -> TableSchema {
        let table_config = self.config.table_config(table);
        let mut schema = TableSchema::new(table, self.write_disposition(table));
        if let Some(t) = table_config {
            schema.merge_columns(t.columns.iter().cloned());
        }
        schema.merge_columns(infer_columns(records));
        schema
    }

    fn load_table(&self, table: &str, files: &[PathBuf], out_dir: &Path) -> Result<Vec<LoadJob>> {
        let mut records = Vec::new();
        for file in files {
            records.extend(read_records(file)?);
        }
        if records.is_empty() {
            warn!("Table {} has no records, skipping", table);
            return Ok(vec![]);
        }

        let schema = self.table_schema(table, &records);
        let chunk_size = self.file_max_items.unwrap_or(records.len()).max(1);

        let mut jobs = Vec::new();
        for (index, chunk) in records.chunks(chunk_size).enumerate() {
            let file_id = file_id(&self.load_id, table, index, chunk)?;
            let local_file = out_dir.join(format!(
                "{}.{}.{}",
                table,
                file_id,
                self.writer.extension()
            ));
            self.writer.write(&local_file, &schema, chunk)?;
            jobs.push(LoadJob {
                load_id: self.load_id.clone(),
                file_id,
                schema: self.dataset.clone(),
                table: schema.clone(),
                file_format: self.writer.format(),
                local_file,
                write_disposition: schema.write_disposition,
            });
        }
        info!(
            "Prepared {} records of {} in {} files",
            records.len(),
            table,
            jobs.len()
        );
        Ok(jobs)
    }
}

impl JobSourcePort for PackageReader {
    fn load_id(&self) -> &str {
        &self.load_id
    }

    fn load_jobs(&self) -> Result<LoadPackage> {
        let tables = self.discover()?;
        let out_dir = self.output_dir.join(&self.load_id);
        std::fs::create_dir_all(&out_dir)?;

        let mut package = LoadPackage::default();
        for (table, files) in &tables {
            match self.load_table(table, files, &out_dir) {
                Ok(jobs) => package.jobs.extend(jobs),
                Err(e) => {
                    error!("Failed to prepare files of {}: {}", table, e);
                    package.failed_tables.push(TableLoadResult::failure(
                        self.dataset.clone(),
                        table.clone(),
                        self.write_disposition(table),
                        e.to_string(),
                    ));
                }
            }
        }
        Ok(package)
    }
}

/// `<unix seconds>.<microseconds>`
fn new_load_id() -> String {
    let now = chrono::Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

fn read_records(path: &Path) -> Result<Vec<Record>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line)? {
            Value::Object(map) => records.push(map),
            _ => {
                return Err(LoaderError::SerializationError(format!(
                    "{}:{}: expected a JSON object",
                    path.display(),
                    i + 1
                )))
            }
        }
    }
    Ok(records)
}

/// Column types seen across `records`; columns that are always NULL are text.
fn infer_columns(records: &[Record]) -> Vec<ColumnSchema> {
    let mut order: Vec<String> = Vec::new();
    let mut types: BTreeMap<String, Option<DataType>> = BTreeMap::new();
    for record in records {
        for (name, value) in record {
            if !types.contains_key(name) {
                order.push(name.clone());
                types.insert(name.clone(), None);
            }
            if let Some(seen) = infer_from_json(value) {
                let slot = types.entry(name.clone()).or_insert(None);
                *slot = Some(match *slot {
                    Some(current) => widen(current, seen),
                    None => seen,
                });
            }
        }
    }
    order
        .into_iter()
        .map(|name| {
            let data_type = types
                .get(&name)
                .copied()
                .flatten()
                .unwrap_or(DataType::Text);
            ColumnSchema::new(&name, data_type)
        })
        .collect()
}

/// Shortened hash of the chunk and its position, so equal chunks of one table
/// still land in distinct files.
fn file_id(load_id: &str, table: &str, index: usize, chunk: &[Record]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(load_id.as_bytes());
    hasher.update(table.as_bytes());
    hasher.update(index.to_le_bytes());
    for record in chunk {
        hasher.update(serde_json::to_vec(record)?);
    }
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    Ok(hex[..FILE_ID_LEN].to_string())
}
