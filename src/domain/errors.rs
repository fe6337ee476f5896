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

//! Core error definitions for the Snowflake loader.
//!
//! This module provides a centralized `LoaderError` enum and a `Result` type
//! used throughout the application to handle configuration, transfer,
//! warehouse and I/O errors.

use thiserror::Error;

/// Error types encountered during a load.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transfer of {file} failed: {reason}")]
    TransferError { file: String, reason: String },

    #[error("Load into {table} failed: {reason}")]
    LoadError { table: String, reason: String },

    #[error("Schema materialization for {table} failed: {reason}")]
    SchemaError { table: String, reason: String },

    #[error("Warehouse error: {0}")]
    WarehouseError(String),

    #[error("Invalid job state: {0}")]
    StateError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LoaderError {
    fn from(e: serde_json::Error) -> Self {
        LoaderError::SerializationError(e.to_string())
    }
}

impl From<csv::Error> for LoaderError {
    fn from(e: csv::Error) -> Self {
        LoaderError::SerializationError(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for LoaderError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        LoaderError::SerializationError(e.to_string())
    }
}

impl From<arrow_schema::ArrowError> for LoaderError {
    fn from(e: arrow_schema::ArrowError) -> Self {
        LoaderError::SerializationError(e.to_string())
    }
}

/// A specialized Result type for the Snowflake loader.
pub type Result<T> = std::result::Result<T, LoaderError>;
