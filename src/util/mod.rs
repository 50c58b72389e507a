pub mod dialects;
pub mod sql_escape;
