pub mod mssql_legacy;
pub mod rules;
