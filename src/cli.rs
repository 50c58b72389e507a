use clap::{Args, Parser, Subcommand};
use mssql_legacy::config::RawConnectionConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mssql-legacy")]
#[command(
    about = "Connection helper for legacy SQL Server sources",
    long_about = None
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the endpoint string for a source
    Url {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Quote a value as a string literal
    Quote {
        /// Text to quote
        value: String,

        /// Charset requested for the literal (forces the N'...' form)
        #[arg(long)]
        charset: Option<String>,
    },

    /// Borrow a pooled connection and run the validation query
    Ping {
        #[command(flatten)]
        source: SourceArgs,
    },
}

/// Source fields; flags override values read from `--config`
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// TOML file with source fields (host, port, database, username, ...)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<i64>,

    #[arg(long)]
    pub database: Option<String>,

    #[arg(short, long)]
    pub username: Option<String>,

    /// Password (prefer --password-env)
    #[arg(long)]
    pub password: Option<String>,

    /// Environment variable containing the password
    #[arg(long)]
    pub password_env: Option<String>,

    /// Encrypt the connection
    #[arg(long)]
    pub ssl: bool,

    /// Raw driver parameters appended to the endpoint string
    #[arg(long)]
    pub extra_params: Option<String>,
}

impl SourceArgs {
    /// Merge file, flags and environment into raw form data
    pub fn resolve(&self) -> anyhow::Result<RawConnectionConfig> {
        let base = match &self.config {
            Some(path) => RawConnectionConfig::from_toml_file(path)?,
            None => RawConnectionConfig::default(),
        };

        let password = match (&self.password, &self.password_env) {
            (Some(password), _) => Some(password.clone()),
            (None, Some(env)) => Some(
                std::env::var(env)
                    .map_err(|_| anyhow::anyhow!("Environment variable {} not found", env))?,
            ),
            (None, None) => None,
        };

        Ok(base.merge(RawConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            username: self.username.clone(),
            password,
            use_ssl: self.ssl.then_some(true),
            extra_params: self.extra_params.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_url_command() {
        let cli = Cli::try_parse_from([
            "mssql-legacy",
            "url",
            "--host",
            "dbhost",
            "-u",
            "sa",
            "--password",
            "pw",
            "--ssl",
        ])
        .unwrap();

        let Commands::Url { source } = cli.command else {
            panic!("expected url command");
        };
        let raw = source.resolve().unwrap();
        assert_eq!(raw.host.as_deref(), Some("dbhost"));
        assert_eq!(raw.use_ssl, Some(true));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn password_from_environment() {
        std::env::set_var("MSSQL_LEGACY_TEST_PASSWORD", "from-env");
        let args = SourceArgs {
            password_env: Some("MSSQL_LEGACY_TEST_PASSWORD".into()),
            ..Default::default()
        };
        assert_eq!(args.resolve().unwrap().password.as_deref(), Some("from-env"));

        let missing = SourceArgs {
            password_env: Some("MSSQL_LEGACY_TEST_MISSING".into()),
            ..Default::default()
        };
        assert!(missing.resolve().is_err());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"file-host\"\nuseSsl = true\ndatabase = \"Hr\"").unwrap();

        let args = SourceArgs {
            config: Some(file.path().to_path_buf()),
            host: Some("flag-host".into()),
            ..Default::default()
        };
        let raw = args.resolve().unwrap();
        assert_eq!(raw.host.as_deref(), Some("flag-host"));
        assert_eq!(raw.database.as_deref(), Some("Hr"));
        // an unset --ssl flag keeps the file value
        assert_eq!(raw.use_ssl, Some(true));
    }
}
