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

//! # Disposition Strategy
//!
//! Turns a table's write disposition into a `DispositionPlan`:
//! - `prepare` statements run once before the first copy,
//! - every file is copied into `copy_target`,
//! - `finalize` statements run once, in one transaction, after the last copy.
//!
//! | disposition | strategy            | copy target | finalize                        |
//! |-------------|---------------------|-------------|---------------------------------|
//! | append      |                     | target      |                                 |
//! | replace     | truncate-and-insert | target      |                                 |
//! | replace     | insert-from-staging | staging     | delete all + insert select      |
//! | replace     | staging-optimized   | staging     | clone staging, swap, drop       |
//! | merge       | (keys present)      | staging     | delete matching + insert select |

use crate::domain::entities::{ReplaceStrategy, TableSchema, WriteDisposition};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::snowflake_sql::{
    clone_table_statement, delete_all_statement, delete_matching_statement,
    drop_table_statement, insert_select_statement, swap_statement, truncate_statement,
    TableRef, SWAP_TABLE_SUFFIX,
};
use crate::ports::warehouse_port::WarehousePort;
use log::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionPlan {
    /// Disposition actually applied (merge without keys becomes append).
    pub disposition: WriteDisposition,
    pub target: TableRef,
    pub copy_target: TableRef,
    pub prepare: Vec<String>,
    pub finalize: Vec<String>,
    /// Finalize statements that must run outside the transaction.
    pub finalize_cleanup: Vec<String>,
}

impl DispositionPlan {
    /// Whether files are copied into a staging table first.
    pub fn uses_staging(&self) -> bool {
        self.copy_target != self.target
    }

    pub fn run_prepare(&self, warehouse: &dyn WarehousePort) -> Result<()> {
        for sql in &self.prepare {
            debug!("{}", sql);
            warehouse.execute(sql).map_err(|e| load_error(&self.target, e))?;
        }
        Ok(())
    }

    pub fn run_finalize(&self, warehouse: &dyn WarehousePort) -> Result<()> {
        if !self.finalize.is_empty() {
            info!(
                "Finalizing {} into {} ({} statements)",
                self.disposition,
                self.target,
                self.finalize.len()
            );
            warehouse
                .execute_in_transaction(&self.finalize)
                .map_err(|e| load_error(&self.target, e))?;
        }
        for sql in &self.finalize_cleanup {
            // The swap already committed; a leftover swap table is harmless.
            if let Err(e) = warehouse.execute(sql) {
                warn!("Cleanup statement failed for {}: {}", self.target, e);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispositionStrategy {
    replace_strategy: ReplaceStrategy,
}

impl DispositionStrategy {
    pub fn new(replace_strategy: ReplaceStrategy) -> Self {
        Self { replace_strategy }
    }

    pub fn plan(&self, table: &TableSchema, target: &TableRef) -> DispositionPlan {
        let staging = target.staging();
        let columns = table.column_names();

        match table.write_disposition {
            WriteDisposition::Append => append(target),
            WriteDisposition::Replace => match self.replace_strategy {
                ReplaceStrategy::TruncateAndInsert => DispositionPlan {
                    disposition: WriteDisposition::Replace,
                    target: target.clone(),
                    copy_target: target.clone(),
                    prepare: vec![truncate_statement(target)],
                    finalize: vec![],
                    finalize_cleanup: vec![],
                },
                ReplaceStrategy::InsertFromStaging => DispositionPlan {
                    disposition: WriteDisposition::Replace,
                    target: target.clone(),
                    copy_target: staging.clone(),
                    prepare: vec![truncate_statement(&staging)],
                    finalize: vec![
                        delete_all_statement(target),
                        insert_select_statement(target, &staging, &columns, &[]),
                    ],
                    finalize_cleanup: vec![],
                },
                ReplaceStrategy::StagingOptimized => {
                    let swap = target.with_suffix(SWAP_TABLE_SUFFIX);
                    DispositionPlan {
                        disposition: WriteDisposition::Replace,
                        target: target.clone(),
                        copy_target: staging.clone(),
                        prepare: vec![truncate_statement(&staging)],
                        // The swap is atomic: readers see either the old or
                        // the new table, never a missing one.
                        finalize: vec![
                            clone_table_statement(&swap, &staging),
                            swap_statement(target, &swap),
                        ],
                        finalize_cleanup: vec![drop_table_statement(&swap)],
                    }
                }
            },
            WriteDisposition::Merge => {
                let keys = table.merge_keys();
                if keys.is_empty() {
                    warn!(
                        "Table {} has merge disposition but no primary or merge key; appending",
                        table.name
                    );
                    return append(target);
                }
                let primary_key = table.primary_key();
                DispositionPlan {
                    disposition: WriteDisposition::Merge,
                    target: target.clone(),
                    copy_target: staging.clone(),
                    prepare: vec![truncate_statement(&staging)],
                    finalize: vec![
                        delete_matching_statement(target, &staging, &keys),
                        insert_select_statement(target, &staging, &columns, &primary_key),
                    ],
                    finalize_cleanup: vec![],
                }
            }
        }
    }
}

fn append(target: &TableRef) -> DispositionPlan {
    DispositionPlan {
        disposition: WriteDisposition::Append,
        target: target.clone(),
        copy_target: target.clone(),
        prepare: vec![],
        finalize: vec![],
        finalize_cleanup: vec![],
    }
}

fn load_error(target: &TableRef, err: LoaderError) -> LoaderError {
    LoaderError::LoadError {
        table: target.table.clone(),
        reason: err.to_string(),
    }
}
