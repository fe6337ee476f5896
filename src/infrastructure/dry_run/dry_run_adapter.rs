//! Adapter for `--dry-run`: prints every statement and transfer instead of
//! executing it, answering just enough for the load to run to completion.

use crate::domain::errors::Result;
use crate::ports::bucket_port::BucketPort;
use crate::ports::warehouse_port::{QueryResult, WarehousePort};
use log::info;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub struct DryRunAdapter {
    log: Mutex<Vec<String>>,
}

impl DryRunAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything that would have been executed, in order.
    pub fn planned(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn record(&self, entry: String) {
        info!("[dry-run] {}", entry);
        println!("{};", entry);
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }
}

impl WarehousePort for DryRunAdapter {
    fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.record(sql.to_string());
        let result = if sql.starts_with("PUT ") {
            QueryResult::new(
                vec!["status".to_string()],
                vec![vec![Some("UPLOADED".to_string())]],
            )
        } else if sql.starts_with("COPY INTO") {
            QueryResult::new(
                vec!["status".to_string(), "rows_loaded".to_string()],
                vec![vec![Some("SKIPPED".to_string()), Some("0".to_string())]],
            )
        } else {
            QueryResult::default()
        };
        Ok(result)
    }
}

impl BucketPort for DryRunAdapter {
    fn upload(&self, local: &Path, remote_url: &str) -> Result<()> {
        self.record(format!("-- upload {} to {}", local.display(), remote_url));
        Ok(())
    }

    fn delete(&self, remote_url: &str) -> Result<()> {
        self.record(format!("-- delete {}", remote_url));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_reports_uploaded() {
        let adapter = DryRunAdapter::new();
        let result = adapter.execute("PUT 'file:///tmp/f' @~/\"1\"/").unwrap();
        assert_eq!(result.get(0, "status"), Some("UPLOADED"));
        assert!(adapter.execute("TRUNCATE TABLE IF EXISTS t").unwrap().is_empty());
        assert_eq!(adapter.planned().len(), 2);
    }

    #[test]
    fn test_transaction_is_printed() {
        let adapter = DryRunAdapter::new();
        adapter
            .execute_in_transaction(&["DELETE FROM t".to_string()])
            .unwrap();
        assert_eq!(
            adapter.planned(),
            vec!["BEGIN TRANSACTION", "DELETE FROM t", "COMMIT"]
        );
    }
}
