//! Endpoint string construction for the two supported driver families.
//!
//! The family is fixed when the crate is built (see [`DRIVER_FAMILY`]); end
//! users cannot pick a URL syntax, so a mismatched driver cannot be selected
//! through configuration.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use std::fmt;

/// Scheme prefix of the primary (semicolon-delimited) family
pub const PRIMARY_PREFIX: &str = "endpoint://";

/// Scheme prefix of the legacy (slash-delimited) family
pub const LEGACY_PREFIX: &str = "endpoint:legacy://";

/// URL syntax understood by the bundled driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFamily {
    /// `endpoint://host:port;databaseName=db;...`
    Primary,
    /// `endpoint:legacy://host:port/db;...`
    Legacy,
}

/// Family used by [`build`].
#[cfg(not(feature = "legacy-driver"))]
pub const DRIVER_FAMILY: DriverFamily = DriverFamily::Primary;

/// Family used by [`build`].
#[cfg(feature = "legacy-driver")]
pub const DRIVER_FAMILY: DriverFamily = DriverFamily::Legacy;

impl DriverFamily {
    pub fn name(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Legacy => "legacy",
        }
    }

    /// Render `config` in this family's syntax
    pub fn render(self, config: &ConnectionConfig) -> ConnectionString {
        match self {
            Self::Primary => render_primary(config),
            Self::Legacy => render_legacy(config),
        }
    }
}

/// Endpoint string derived from one [`ConnectionConfig`]. Never contains
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionString(String);

impl ConnectionString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn family(&self) -> DriverFamily {
        if self.0.starts_with(LEGACY_PREFIX) {
            DriverFamily::Legacy
        } else {
            DriverFamily::Primary
        }
    }

    /// Split the string back into its parts
    pub fn parse(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.0)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnectionString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the endpoint string for the compiled-in driver family
pub fn build(config: &ConnectionConfig) -> ConnectionString {
    DRIVER_FAMILY.render(config)
}

/// `endpoint://host:port[;databaseName=db][;encrypt=true;trustServerCertificate=true][;extra]`
///
/// No encrypt clause is written when SSL is off.
pub fn render_primary(config: &ConnectionConfig) -> ConnectionString {
    let mut url = String::with_capacity(64);
    url.push_str(PRIMARY_PREFIX);
    push_host_port(&mut url, config);

    if let Some(database) = config.database() {
        url.push_str(";databaseName=");
        url.push_str(database);
    }

    if config.use_ssl() {
        url.push_str(";encrypt=true;trustServerCertificate=true");
    }

    if let Some(extra) = config.extra_params() {
        if !extra.starts_with(';') {
            url.push(';');
        }
        url.push_str(extra);
    }

    ConnectionString(url)
}

/// `endpoint:legacy://host:port[/db][;ssl=require][;extra]`
pub fn render_legacy(config: &ConnectionConfig) -> ConnectionString {
    let mut url = String::with_capacity(64);
    url.push_str(LEGACY_PREFIX);
    push_host_port(&mut url, config);

    if let Some(database) = config.database() {
        url.push('/');
        url.push_str(database);
    }

    if config.use_ssl() {
        url.push_str(";ssl=require");
    }

    if let Some(extra) = config.extra_params() {
        url.push(';');
        url.push_str(extra);
    }

    ConnectionString(url)
}

fn push_host_port(url: &mut String, config: &ConnectionConfig) {
    url.push_str(config.host());
    url.push(':');
    url.push_str(&config.port().to_string());
}

/// Structured view of an endpoint string, used by the connectivity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub family: DriverFamily,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub use_ssl: bool,
    /// Remaining `key=value` pairs in order of appearance
    pub params: Vec<(String, String)>,
}

impl Endpoint {
    /// Parse either family. Malformed input yields [`Error::ConnectionBuild`].
    pub fn parse(text: &str) -> Result<Self> {
        let (family, rest) = if let Some(rest) = text.strip_prefix(LEGACY_PREFIX) {
            (DriverFamily::Legacy, rest)
        } else if let Some(rest) = text.strip_prefix(PRIMARY_PREFIX) {
            (DriverFamily::Primary, rest)
        } else {
            return Err(Error::connection_build(format!(
                "unknown scheme in '{}'",
                text
            )));
        };

        let mut segments = rest.split(';');
        let address = segments.next().unwrap_or_default();

        let (authority, mut database) = match family {
            DriverFamily::Legacy => match address.split_once('/') {
                Some((authority, db)) if !db.is_empty() => (authority, Some(db.to_string())),
                Some((authority, _)) => (authority, None),
                None => (address, None),
            },
            DriverFamily::Primary => (address, None),
        };
        let (host, port) = parse_authority(authority)?;

        let mut use_ssl = false;
        let mut params = Vec::new();
        for segment in segments.filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                Error::connection_build(format!("parameter '{}' has no value", segment))
            })?;

            match (family, key) {
                (DriverFamily::Primary, "databaseName") if database.is_none() => {
                    database = Some(value.to_string());
                }
                (DriverFamily::Primary, "encrypt") => {
                    use_ssl = value.eq_ignore_ascii_case("true");
                }
                (DriverFamily::Legacy, "ssl") => {
                    use_ssl = value.eq_ignore_ascii_case("require");
                }
                _ => params.push((key.to_string(), value.to_string())),
            }
        }

        Ok(Self {
            family,
            host,
            port,
            database,
            use_ssl,
            params,
        })
    }

    /// Value of the first parameter named `key`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_authority(authority: &str) -> Result<(String, u16)> {
    let (host, port) = authority.rsplit_once(':').ok_or_else(|| {
        Error::connection_build(format!("'{}' is missing a port", authority))
    })?;
    if host.is_empty() {
        return Err(Error::connection_build("host is empty"));
    }
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| Error::connection_build(format!("invalid port '{}'", port)))?;
    Ok((host.to_string(), port))
}
