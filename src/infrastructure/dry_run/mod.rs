pub mod dry_run_adapter;
