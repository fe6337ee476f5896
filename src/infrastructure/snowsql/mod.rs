pub mod snowsql_adapter;
