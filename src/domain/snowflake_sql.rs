//! Utility functions for generating Snowflake SQL statements.
//!
//! This module renders the staging, copy, and disposition statements issued
//! by the application layer. Identifiers are always double quoted so the
//! names reach the warehouse exactly as configured.

use crate::domain::entities::{ColumnSchema, CredentialRef, FileFormat, OnError};
use crate::domain::errors::{LoaderError, Result};
use crate::domain::type_mapper::to_snowflake_ddl;
use std::fmt;
use url::Url;

/// Suffix of the schema holding staging tables.
pub const STAGING_SCHEMA_SUFFIX: &str = "_staging";

/// Suffix of the transient table used by the clone-and-swap replace.
pub const SWAP_TABLE_SUFFIX: &str = "__swap";

/// Quotes an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// A fully qualified `"database"."schema"."table"` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: &str, schema: &str, table: &str) -> Self {
        Self {
            database: database.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
        }
    }

    /// The same table in the staging schema.
    pub fn staging(&self) -> Self {
        Self {
            database: self.database.clone(),
            schema: format!("{}{}", self.schema, STAGING_SCHEMA_SUFFIX),
            table: self.table.clone(),
        }
    }

    /// A sibling table in the same schema.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            database: self.database.clone(),
            schema: self.schema.clone(),
            table: format!("{}{}", self.table, suffix),
        }
    }

    pub fn qualified_schema(&self) -> String {
        format!("{}.{}", quote_ident(&self.database), quote_ident(&self.schema))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            quote_ident(&self.database),
            quote_ident(&self.schema),
            quote_ident(&self.table)
        )
    }
}

// --- Staging ---------------------------------------------------------------

/// Location of a table stage, e.g. `%"events"`.
pub fn table_stage(table: &str) -> String {
    format!("%{}", quote_ident(table))
}

/// Location of the current user's stage.
pub fn user_stage() -> String {
    "~".to_string()
}

/// Path of a file uploaded into an internal stage.
pub fn internal_staged_path(stage_location: &str, load_id: &str, file_name: &str) -> String {
    format!("@{}/\"{}\"/{}", stage_location, load_id, file_name)
}

/// `PUT` uploads a local file into an internal stage. Files are already
/// compressed by the writer, so auto compression stays off.
pub fn put_statement(local_path: &str, stage_location: &str, load_id: &str) -> String {
    let path = local_path.replace('\\', "/");
    format!(
        "PUT 'file://{}' @{}/\"{}\"/ OVERWRITE = TRUE, AUTO_COMPRESS = FALSE",
        path.replace('\'', "\\'"),
        stage_location,
        load_id
    )
}

pub fn remove_statement(staged_path: &str) -> String {
    format!("REMOVE {}", staged_path)
}

/// Converts a bucket URL into the form Snowflake accepts in `COPY INTO`.
pub fn to_snowflake_url(bucket_url: &str, azure_account: Option<&str>) -> Result<String> {
    let url = Url::parse(bucket_url)
        .map_err(|e| LoaderError::ConfigError(format!("Invalid bucket url {}: {}", bucket_url, e)))?;
    let path = url.path().trim_start_matches('/');
    let host = url.host_str().unwrap_or_default();

    match url.scheme() {
        "s3" => Ok(bucket_url.to_string()),
        "gs" | "gcs" => Ok(format!("gcs://{}/{}", host, path)),
        "az" | "azure" => {
            let account = azure_account.ok_or_else(|| {
                LoaderError::ConfigError(
                    "azure_storage_account_name is required for az:// buckets".to_string(),
                )
            })?;
            Ok(format!(
                "azure://{}.blob.core.windows.net/{}/{}",
                account, host, path
            ))
        }
        "abfss" => {
            // abfss://container@account.dfs.core.windows.net/path
            let container = url.username();
            let account = host.split('.').next().unwrap_or_default();
            Ok(format!(
                "azure://{}.blob.core.windows.net/{}/{}",
                account, container, path
            ))
        }
        other => Err(LoaderError::ConfigError(format!(
            "Unsupported bucket scheme '{}'",
            other
        ))),
    }
}

// --- Copy ------------------------------------------------------------------

/// Where `COPY INTO` reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    /// A file in an internal stage: `@stage/"load_id"/file`.
    StagePath(String),
    /// Files of a bucket-backed named stage.
    NamedStageFiles { stage: String, files: Vec<String> },
    /// A bucket URL read with inline credentials.
    Url(String),
}

pub fn file_format_clause(format: FileFormat, csv_delimiter: u8) -> String {
    match format {
        FileFormat::Jsonl => "( TYPE = 'JSON', BINARY_FORMAT = 'BASE64' )".to_string(),
        FileFormat::Parquet => {
            "( TYPE = 'PARQUET', BINARY_AS_TEXT = FALSE, USE_LOGICAL_TYPE = TRUE )".to_string()
        }
        FileFormat::Csv => format!(
            "( TYPE = 'CSV', PARSE_HEADER = TRUE, FIELD_DELIMITER = {}, \
             FIELD_OPTIONALLY_ENCLOSED_BY = '\"', NULL_IF = (''), \
             ERROR_ON_COLUMN_COUNT_MISMATCH = FALSE, ENCODING = 'UTF8' )",
            quote_literal(&(csv_delimiter as char).to_string())
        ),
    }
}

pub fn credentials_clause(credential: &CredentialRef) -> Option<String> {
    match credential {
        CredentialRef::AwsKeys {
            access_key_id,
            secret_access_key,
        } => Some(format!(
            "CREDENTIALS = (AWS_KEY_ID = {} AWS_SECRET_KEY = {})",
            quote_literal(access_key_id),
            quote_literal(secret_access_key)
        )),
        CredentialRef::AzureSas(token) => Some(format!(
            "CREDENTIALS = (AZURE_SAS_TOKEN = {})",
            quote_literal(&format!("?{}", token.trim_start_matches('?')))
        )),
        CredentialRef::Warehouse | CredentialRef::StorageIntegration(_) => None,
    }
}

pub fn copy_into_statement(
    target: &TableRef,
    source: &CopySource,
    credential: &CredentialRef,
    format: FileFormat,
    csv_delimiter: u8,
    on_error: OnError,
) -> String {
    let mut parts = vec![format!("COPY INTO {}", target)];
    match source {
        CopySource::StagePath(path) => parts.push(format!("FROM {}", path)),
        CopySource::NamedStageFiles { stage, files } => {
            parts.push(format!("FROM @{}", stage));
            let files = files
                .iter()
                .map(|f| quote_literal(f))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("FILES = ({})", files));
        }
        CopySource::Url(url) => parts.push(format!("FROM {}", quote_literal(url))),
    }
    if let Some(creds) = credentials_clause(credential) {
        parts.push(creds);
    }
    parts.push(format!(
        "FILE_FORMAT = {}",
        file_format_clause(format, csv_delimiter)
    ));
    parts.push("MATCH_BY_COLUMN_NAME = 'CASE_INSENSITIVE'".to_string());
    parts.push(format!("ON_ERROR = {}", on_error.as_sql()));
    parts.join("\n")
}

// --- Schema ----------------------------------------------------------------

pub fn create_schema_statement(target: &TableRef) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", target.qualified_schema())
}

pub fn columns_query(target: &TableRef) -> String {
    format!(
        "SELECT COLUMN_NAME FROM {}.INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} ORDER BY ORDINAL_POSITION",
        quote_ident(&target.database),
        quote_literal(&target.schema),
        quote_literal(&target.table)
    )
}

fn column_definition(col: &ColumnSchema) -> String {
    let null = if col.nullable { "" } else { " NOT NULL" };
    format!(
        "{} {}{}",
        quote_ident(&col.name),
        to_snowflake_ddl(col.data_type),
        null
    )
}

pub fn create_table_statement(target: &TableRef, columns: &[ColumnSchema]) -> String {
    let defs = columns
        .iter()
        .map(|c| format!("  {}", column_definition(c)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n)", target, defs)
}

/// New columns are always added as nullable: existing rows have no value.
pub fn add_column_statement(target: &TableRef, col: &ColumnSchema) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        target,
        quote_ident(&col.name),
        to_snowflake_ddl(col.data_type)
    )
}

// --- Dispositions ----------------------------------------------------------

pub fn truncate_statement(target: &TableRef) -> String {
    format!("TRUNCATE TABLE IF EXISTS {}", target)
}

pub fn delete_all_statement(target: &TableRef) -> String {
    format!("DELETE FROM {}", target)
}

/// `INSERT ... SELECT`, keeping only the first row per `dedup_key` when given.
pub fn insert_select_statement(
    target: &TableRef,
    source: &TableRef,
    columns: &[&str],
    dedup_key: &[&str],
) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        target, cols, cols, source
    );
    if !dedup_key.is_empty() {
        let keys = dedup_key
            .iter()
            .map(|k| quote_ident(k))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(
            "\nQUALIFY ROW_NUMBER() OVER (PARTITION BY {} ORDER BY {}) = 1",
            keys, keys
        ));
    }
    sql
}

/// Deletes target rows that have a counterpart in `staging` on all `keys`.
pub fn delete_matching_statement(target: &TableRef, staging: &TableRef, keys: &[&str]) -> String {
    let predicate = keys
        .iter()
        .map(|k| format!("d.{} = s.{}", quote_ident(k), quote_ident(k)))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "DELETE FROM {} AS d WHERE EXISTS (SELECT 1 FROM {} AS s WHERE {})",
        target, staging, predicate
    )
}

pub fn clone_table_statement(dest: &TableRef, source: &TableRef) -> String {
    format!("CREATE OR REPLACE TABLE {} CLONE {}", dest, source)
}

pub fn swap_statement(target: &TableRef, other: &TableRef) -> String {
    format!("ALTER TABLE {} SWAP WITH {}", target, other)
}

pub fn drop_table_statement(target: &TableRef) -> String {
    format!("DROP TABLE IF EXISTS {}", target)
}
