//! # Snowflake Loader
//!
//! Loads packages of extracted records into Snowflake through stages:
//! files are written in a loader file format, uploaded to an internal stage
//! or a cloud bucket, copied into the target table with `COPY INTO`, and
//! finalized according to the table's write disposition.
//!
//! This crate follows the **Hexagonal Architecture** (Ports and Adapters):
//! the load protocol in `application` only talks to the warehouse and the
//! bucket through the traits in `ports`.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;
