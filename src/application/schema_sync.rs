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

//! Makes sure the target (and staging) tables exist with every column the
//! load file carries. Columns are only ever added, never altered or dropped.

use crate::domain::entities::{ColumnSchema, TableSchema};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::snowflake_sql::{
    add_column_statement, columns_query, create_schema_statement, create_table_statement,
    TableRef,
};
use crate::ports::warehouse_port::WarehousePort;
use log::info;
use std::sync::Arc;

pub struct SchemaSync {
    warehouse: Arc<dyn WarehousePort>,
}

impl SchemaSync {
    pub fn new(warehouse: Arc<dyn WarehousePort>) -> Self {
        Self { warehouse }
    }

    /// Creates the schema and table if missing, otherwise adds missing columns.
    pub fn materialize(&self, target: &TableRef, table: &TableSchema) -> Result<()> {
        self.run(target, &create_schema_statement(target))?;

        let existing = self
            .warehouse
            .execute(&columns_query(target))
            .map_err(|e| schema_error(target, e.to_string()))?
            .first_column();

        if existing.is_empty() {
            if table.columns.is_empty() {
                return Err(schema_error(
                    target,
                    "table does not exist and no columns are known".to_string(),
                ));
            }
            info!("Creating table {} ({} columns)", target, table.columns.len());
            return self.run(target, &create_table_statement(target, &table.columns));
        }

        let missing: Vec<&ColumnSchema> = table
            .columns
            .iter()
            .filter(|c| !existing.iter().any(|e| e.eq_ignore_ascii_case(&c.name)))
            .collect();
        for col in missing {
            info!("Adding column {} to {}", col.name, target);
            self.run(target, &add_column_statement(target, col))?;
        }
        Ok(())
    }

    fn run(&self, target: &TableRef, sql: &str) -> Result<()> {
        self.warehouse
            .execute(sql)
            .map(|_| ())
            .map_err(|e| schema_error(target, e.to_string()))
    }
}

fn schema_error(target: &TableRef, reason: String) -> LoaderError {
    LoaderError::SchemaError {
        table: target.table.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{sample_table, RecordingWarehouse};
    use crate::domain::entities::{DataType, WriteDisposition};
    use crate::ports::warehouse_port::QueryResult;

    fn target() -> TableRef {
        TableRef::new("DB", "analytics", "events")
    }

    fn existing(cols: &[&str]) -> QueryResult {
        QueryResult::new(
            vec!["COLUMN_NAME".into()],
            cols.iter().map(|c| vec![Some(c.to_string())]).collect(),
        )
    }

    #[test]
    fn test_creates_missing_table() {
        let wh = Arc::new(RecordingWarehouse::new());
        SchemaSync::new(wh.clone())
            .materialize(&target(), &sample_table("events", WriteDisposition::Append))
            .unwrap();
        let stmts = wh.statements();
        assert_eq!(stmts[0], "CREATE SCHEMA IF NOT EXISTS \"DB\".\"analytics\"");
        assert!(stmts[1].contains("INFORMATION_SCHEMA.COLUMNS"));
        assert!(stmts[2].starts_with("CREATE TABLE IF NOT EXISTS \"DB\".\"analytics\".\"events\""));
        assert!(stmts[2].contains("\"id\" NUMBER(19,0) NOT NULL"));
    }

    #[test]
    fn test_adds_only_missing_columns() {
        let wh = Arc::new(RecordingWarehouse::new().respond("INFORMATION_SCHEMA", existing(&["ID", "VALUE"])));
        let mut table = sample_table("events", WriteDisposition::Append);
        table.columns.push(ColumnSchema::new("created_at", DataType::Timestamp));

        SchemaSync::new(wh.clone()).materialize(&target(), &table).unwrap();
        assert_eq!(wh.count("ADD COLUMN"), 1);
        assert_eq!(wh.count("CREATE TABLE"), 0);
        assert!(wh.statements().last().unwrap().contains("\"created_at\" TIMESTAMP_TZ"));
    }

    #[test]
    fn test_unknown_table_without_columns() {
        let wh = Arc::new(RecordingWarehouse::new());
        let err = SchemaSync::new(wh)
            .materialize(&target(), &TableSchema::new("events", WriteDisposition::Append))
            .unwrap_err();
        assert!(matches!(err, LoaderError::SchemaError { .. }));
    }

    #[test]
    fn test_warehouse_failure_is_schema_error() {
        let wh = Arc::new(RecordingWarehouse::new().fail_on("CREATE SCHEMA", "Insufficient privileges"));
        let err = SchemaSync::new(wh)
            .materialize(&target(), &sample_table("events", WriteDisposition::Append))
            .unwrap_err();
        assert!(matches!(err, LoaderError::SchemaError { .. }));
    }
}
