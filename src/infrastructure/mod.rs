pub mod dry_run;
pub mod local_storage;
pub mod snowsql;
pub mod storage;
