pub mod credentials;
pub mod entities;
pub mod errors;
pub mod snowflake_sql;
pub mod type_mapper;
