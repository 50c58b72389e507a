//! Connectivity adapter for legacy SQL Server sources.
//!
//! Turns a handful of source fields into an endpoint string, a lazily built
//! connection pool and a dialect that renders `N'...'` Unicode literals.
//!
//! ```rust,ignore
//! use mssql_legacy::config::RawConnectionConfig;
//! use mssql_legacy::engine::dialect::RuleSet;
//!
//! let plugin = mssql_legacy::plugin::assemble(RawConnectionConfig::from_toml_file("source.toml")?)?;
//! let literal = plugin.dialect().quote_string_literal("café", None); // N'café'
//! let mut conn = plugin.connection_factory().acquire().await?;
//! ```

pub mod config;
pub mod connection_string;
pub mod engine;
pub mod error;
pub mod plugin;
pub mod util;

pub use config::{ConnectionConfig, RawConnectionConfig};
pub use connection_string::{ConnectionString, DriverFamily};
pub use error::{Error, Result};
pub use plugin::{assemble, SourcePlugin};
pub use util::dialects::mssql_legacy::DialectAdapter;
