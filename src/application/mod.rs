pub mod cleanup;
pub mod disposition;
pub mod file_uploader;
pub mod load_executor;
pub mod orchestrator;
pub mod runtime;
pub mod schema_sync;
pub mod stage_manager;

#[cfg(test)]
mod test_support;
