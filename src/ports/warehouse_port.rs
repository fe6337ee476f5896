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

//! # Warehouse Port
//!
//! The contract for talking SQL to the warehouse. The loader never opens a
//! connection itself: it hands statements to whatever implements
//! `WarehousePort` (the `snowsql` adapter, the dry-run adapter, a mock).

use crate::domain::errors::Result;
use log::warn;

/// Tabular result of a statement. Values are kept as text; `None` is NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of `column` in row `row`.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// All values of the first column.
    pub fn first_column(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.first().cloned().flatten())
            .collect()
    }
}

/// `WarehousePort` executes SQL on behalf of the loader.
///
/// Implementations must be `Send + Sync`: tables are loaded from a rayon pool.
pub trait WarehousePort: Send + Sync {
    /// Runs one statement and returns its result set (empty for DDL).
    fn execute(&self, sql: &str) -> Result<QueryResult>;

    /// Runs `statements` atomically. Adapters whose `execute` calls do not
    /// share a session must override this.
    fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        self.execute("BEGIN TRANSACTION")?;
        for stmt in statements {
            if let Err(e) = self.execute(stmt) {
                if let Err(rollback) = self.execute("ROLLBACK") {
                    warn!("Rollback failed: {}", rollback);
                }
                return Err(e);
            }
        }
        self.execute("COMMIT")?;
        Ok(())
    }
}
