pub mod bucket_port;
pub mod job_source_port;
pub mod warehouse_port;
