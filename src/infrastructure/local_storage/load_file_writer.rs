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

//! Serializes extracted records into the loader file format.
//!
//! `jsonl` and `csv` are gzip compressed unless compression is disabled;
//! `parquet` carries its own column compression (zstd by default).

use crate::domain::entities::{DataType as ColumnType, FileFormat, TableSchema};
use crate::domain::errors::Result;
use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use csv::{QuoteStyle, WriterBuilder};
use flate2::write::GzEncoder;
use flate2::Compression as GzipCompression;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression as ParquetCompression;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

pub type Record = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct LoadFileWriter {
    format: FileFormat,
    compress: bool,
    csv_delimiter: u8,
    parquet_compression: Option<String>,
}

impl LoadFileWriter {
    pub fn new(
        format: FileFormat,
        compress: bool,
        csv_delimiter: u8,
        parquet_compression: Option<String>,
    ) -> Self {
        Self {
            format,
            compress,
            csv_delimiter,
            parquet_compression,
        }
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// File extension of the files this writer produces.
    pub fn extension(&self) -> &'static str {
        self.format.extension(self.compress)
    }

    /// Writes `records` to `path` with the columns of `table`.
    pub fn write(&self, path: &Path, table: &TableSchema, records: &[Record]) -> Result<()> {
        let file = File::create(path)?;
        let buf_writer = BufWriter::with_capacity(128 * 1024, file);
        match self.format {
            FileFormat::Parquet => self.write_parquet(buf_writer, table, records),
            FileFormat::Jsonl | FileFormat::Csv if self.compress => {
                let mut encoder = GzEncoder::new(buf_writer, GzipCompression::fast());
                self.write_text(&mut encoder, table, records)?;
                encoder.finish()?.flush()?;
                Ok(())
            }
            FileFormat::Jsonl | FileFormat::Csv => {
                let mut w = buf_writer;
                self.write_text(&mut w, table, records)?;
                w.flush()?;
                Ok(())
            }
        }
    }

    fn write_text<W: Write>(&self, w: &mut W, table: &TableSchema, records: &[Record]) -> Result<()> {
        match self.format {
            FileFormat::Csv => self.write_csv(w, table, records),
            _ => write_jsonl(w, records),
        }
    }

    fn write_csv<W: Write>(&self, w: W, table: &TableSchema, records: &[Record]) -> Result<()> {
        let mut wtr = WriterBuilder::new()
            .delimiter(self.csv_delimiter)
            .quote_style(QuoteStyle::Necessary)
            .from_writer(w);

        let names = table.column_names();
        wtr.write_record(&names)?;
        for record in records {
            wtr.write_record(names.iter().map(|n| csv_value(record.get(*n))))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_parquet<W: Write + Send>(&self, w: W, table: &TableSchema, records: &[Record]) -> Result<()> {
        let fields: Vec<Field> = table
            .columns
            .iter()
            .map(|c| Field::new(&c.name, arrow_type(c.data_type), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let props = WriterProperties::builder()
            .set_compression(map_parquet_compression(&self.parquet_compression))
            .build();
        let mut writer = ArrowWriter::try_new(w, schema.clone(), Some(props))?;

        let arrays: Vec<ArrayRef> = table
            .columns
            .iter()
            .map(|c| column_array(&c.name, c.data_type, records))
            .collect();
        let batch = RecordBatch::try_new(schema, arrays)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }
}

fn write_jsonl<W: Write>(w: &mut W, records: &[Record]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut *w, record)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// NULL is written as an empty field and read back through `NULL_IF = ('')`.
fn csv_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn arrow_type(data_type: ColumnType) -> DataType {
    match data_type {
        ColumnType::Bigint => DataType::Int64,
        ColumnType::Double => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        _ => DataType::Utf8,
    }
}

/// Builds one arrow column. Values that do not fit the column type are NULL.
fn column_array(name: &str, data_type: ColumnType, records: &[Record]) -> ArrayRef {
    let values = records.iter().map(|r| r.get(name).filter(|v| !v.is_null()));
    match data_type {
        ColumnType::Bigint => Arc::new(Int64Array::from(
            values.map(|v| v.and_then(Value::as_i64)).collect::<Vec<_>>(),
        )),
        ColumnType::Double => Arc::new(Float64Array::from(
            values.map(|v| v.and_then(Value::as_f64)).collect::<Vec<_>>(),
        )),
        ColumnType::Bool => Arc::new(BooleanArray::from(
            values.map(|v| v.and_then(Value::as_bool)).collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            values
                .map(|v| v.map(|v| csv_value(Some(v))))
                .collect::<Vec<Option<String>>>(),
        )),
    }
}

fn map_parquet_compression(c: &Option<String>) -> ParquetCompression {
    match c.as_deref().unwrap_or("zstd").to_lowercase().as_str() {
        "snappy" => ParquetCompression::SNAPPY,
        "gzip" => ParquetCompression::GZIP(Default::default()),
        "none" => ParquetCompression::UNCOMPRESSED,
        _ => ParquetCompression::ZSTD(Default::default()),
    }
}
