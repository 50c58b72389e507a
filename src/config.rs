//! Source configuration: raw form data and its validated counterpart.

use crate::error::{Error, FieldViolation, Result, ValidationError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Default SQL Server listener port
pub const DEFAULT_PORT: u16 = 1433;

const REDACTED: &str = "***REDACTED***";

/// Unvalidated connection fields as supplied by the host's source form.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConnectionConfig {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_ssl: Option<bool>,
    pub extra_params: Option<String>,
}

impl RawConnectionConfig {
    /// Parse form data from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(format!("invalid TOML: {}", e)))
    }

    /// Read form data from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Overlay every field that is set in `other`
    pub fn merge(mut self, other: RawConnectionConfig) -> Self {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.use_ssl.is_some() {
            self.use_ssl = other.use_ssl;
        }
        if other.extra_params.is_some() {
            self.extra_params = other.extra_params;
        }
        self
    }
}

impl fmt::Debug for RawConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("use_ssl", &self.use_ssl)
            .field("extra_params", &self.extra_params)
            .finish()
    }
}

/// Validated, immutable description of how to reach one SQL Server instance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    username: String,
    #[serde(serialize_with = "serialize_redacted")]
    password: SecretString,
    use_ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_params: Option<String>,
}

fn serialize_redacted<S: Serializer>(
    _secret: &SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(REDACTED)
}

impl ConnectionConfig {
    /// Validate raw form data, reporting every offending field at once.
    ///
    /// Host and username are trimmed. Blank database and extra parameters
    /// are treated as absent; extra parameters are otherwise passed through
    /// untouched.
    pub fn validate(raw: RawConnectionConfig) -> Result<Self> {
        let mut errors = ValidationError::default();

        let host = required_trimmed(raw.host, "host", &mut errors);

        let port = match raw.port {
            None => DEFAULT_PORT,
            Some(p) => match u16::try_from(p) {
                Ok(p) if p != 0 => p,
                _ => {
                    errors.violations.push(FieldViolation::new(
                        "port",
                        format!("{} is not between 1 and 65535", p),
                    ));
                    DEFAULT_PORT
                }
            },
        };

        let username = required_trimmed(raw.username, "username", &mut errors);

        let password = match raw.password {
            Some(p) if !p.trim().is_empty() => Some(SecretString::from(p)),
            Some(_) => {
                errors
                    .violations
                    .push(FieldViolation::new("password", "must not be blank"));
                None
            }
            None => {
                errors
                    .violations
                    .push(FieldViolation::new("password", "is required"));
                None
            }
        };

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let database = raw
            .database
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let extra_params = raw.extra_params.filter(|p| !p.trim().is_empty());

        Ok(Self {
            host: host.unwrap_or_default(),
            port,
            database,
            username: username.unwrap_or_default(),
            password: password.unwrap_or_else(|| SecretString::from(String::new())),
            use_ssl: raw.use_ssl.unwrap_or(false),
            extra_params,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Cleartext password; hand it only to the connectivity layer.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn use_ssl(&self) -> bool {
        self.use_ssl
    }

    pub fn extra_params(&self) -> Option<&str> {
        self.extra_params.as_deref()
    }
}

fn required_trimmed(
    value: Option<String>,
    field: &'static str,
    errors: &mut ValidationError,
) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        Some(_) => {
            errors
                .violations
                .push(FieldViolation::new(field, "must not be blank"));
            None
        }
        None => {
            errors.violations.push(FieldViolation::new(field, "is required"));
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn raw(host: &str, database: Option<&str>, use_ssl: bool) -> RawConnectionConfig {
        RawConnectionConfig {
            host: Some(host.to_string()),
            port: Some(1433),
            database: database.map(str::to_string),
            username: Some("sa".to_string()),
            password: Some("s3cret!".to_string()),
            use_ssl: Some(use_ssl),
            extra_params: None,
        }
    }

    fn violated_fields(result: Result<ConnectionConfig>) -> Vec<&'static str> {
        match result {
            Err(Error::Validation(err)) => err.fields(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn applies_defaults() {
        let config = ConnectionConfig::validate(RawConnectionConfig {
            host: Some(" dbhost ".into()),
            username: Some("sa".into()),
            password: Some("pw".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.host(), "dbhost");
        assert_eq!(config.port(), 1433);
        assert_eq!(config.database(), None);
        assert!(!config.use_ssl());
        assert_eq!(config.extra_params(), None);
        assert_eq!(config.expose_password(), "pw");
    }

    #[test]
    fn reports_all_blank_fields() {
        let result = ConnectionConfig::validate(RawConnectionConfig {
            host: Some("  ".into()),
            username: Some(String::new()),
            password: Some(" ".into()),
            ..Default::default()
        });
        assert_eq!(violated_fields(result), vec!["host", "username", "password"]);
    }

    #[test]
    fn reports_missing_fields_and_bad_port_together() {
        let result = ConnectionConfig::validate(RawConnectionConfig {
            port: Some(70_000),
            ..Default::default()
        });
        assert_eq!(
            violated_fields(result),
            vec!["host", "port", "username", "password"]
        );
    }

    #[test]
    fn rejects_port_zero_and_negative() {
        for port in [0, -1] {
            let mut input = raw("dbhost", None, false);
            input.port = Some(port);
            assert_eq!(
                violated_fields(ConnectionConfig::validate(input)),
                vec!["port"]
            );
        }
    }

    #[test]
    fn blank_optional_fields_become_absent() {
        let mut input = raw("dbhost", Some("   "), false);
        input.extra_params = Some(String::new());
        let config = ConnectionConfig::validate(input).unwrap();
        assert_eq!(config.database(), None);
        assert_eq!(config.extra_params(), None);
    }

    #[test]
    fn password_is_never_printed_or_serialized() {
        let config = ConnectionConfig::validate(raw("dbhost", None, false)).unwrap();
        assert!(!format!("{:?}", config).contains("s3cret!"));

        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("s3cret!"));
        assert!(text.contains(REDACTED));

        assert!(!format!("{:?}", raw("dbhost", None, false)).contains("s3cret!"));
    }

    #[test]
    fn loads_camel_case_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
host = "legacy01"
port = 1533
database = "Sales"
username = "report"
password = "pw"
useSsl = true
extraParams = "loginTimeout=5"
"#
        )
        .unwrap();

        let raw = RawConnectionConfig::from_toml_file(file.path()).unwrap();
        let config = ConnectionConfig::validate(raw).unwrap();
        assert_eq!(config.port(), 1533);
        assert_eq!(config.database(), Some("Sales"));
        assert!(config.use_ssl());
        assert_eq!(config.extra_params(), Some("loginTimeout=5"));
    }

    #[test]
    fn merge_prefers_set_fields() {
        let base = raw("file-host", Some("Sales"), false);
        let merged = base.merge(RawConnectionConfig {
            host: Some("cli-host".into()),
            ..Default::default()
        });
        assert_eq!(merged.host.as_deref(), Some("cli-host"));
        assert_eq!(merged.database.as_deref(), Some("Sales"));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = RawConnectionConfig::from_toml_str("port = \"abc\"").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
