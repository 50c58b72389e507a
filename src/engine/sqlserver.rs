//! SQL Server connectivity through tiberius.

use super::ConnectionManager;
use crate::config::ConnectionConfig;
use crate::connection_string::{ConnectionString, DriverFamily, Endpoint, PRIMARY_PREFIX};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// A live TDS session
pub type SqlServerClient = Client<Compat<TcpStream>>;

/// Opens tiberius clients for one configured source.
pub struct SqlServerManager {
    config: Arc<ConnectionConfig>,
    endpoint: ConnectionString,
}

impl SqlServerManager {
    pub fn new(config: Arc<ConnectionConfig>, endpoint: ConnectionString) -> Self {
        Self { config, endpoint }
    }

    pub fn endpoint(&self) -> &ConnectionString {
        &self.endpoint
    }

    /// Driver configuration for the endpoint, with SQL Server login attached.
    pub fn tiberius_config(&self) -> Result<Config> {
        let mut config = match self.endpoint.family() {
            DriverFamily::Primary => primary_config(self.endpoint.as_str())?,
            DriverFamily::Legacy => legacy_config(&self.endpoint.parse()?),
        };
        config.authentication(AuthMethod::sql_server(
            self.config.username(),
            self.config.expose_password(),
        ));
        Ok(config)
    }
}

impl std::fmt::Debug for SqlServerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerManager")
            .field("endpoint", &self.endpoint)
            .field("username", &self.config.username())
            .finish()
    }
}

/// The primary family is JDBC syntax under another scheme; tiberius parses it.
fn primary_config(endpoint: &str) -> Result<Config> {
    // reject what our own parser rejects before handing it over
    Endpoint::parse(endpoint)?;
    let rest = endpoint
        .strip_prefix(PRIMARY_PREFIX)
        .ok_or_else(|| Error::connection_build("missing primary scheme"))?;
    Config::from_jdbc_string(&format!("jdbc:sqlserver://{}", rest))
        .map_err(|e| Error::connection_build(e.to_string()))
}

fn legacy_config(endpoint: &Endpoint) -> Config {
    let mut config = Config::new();
    config.host(&endpoint.host);
    config.port(endpoint.port);
    if let Some(database) = &endpoint.database {
        config.database(database);
    }
    if endpoint.use_ssl {
        config.encryption(EncryptionLevel::Required);
        config.trust_cert();
    } else {
        config.encryption(EncryptionLevel::Off);
    }
    for (key, value) in &endpoint.params {
        match key.to_ascii_lowercase().as_str() {
            "appname" => config.application_name(value),
            _ => debug!(param = %key, "legacy parameter not understood by driver, skipped"),
        }
    }
    config
}

#[async_trait]
impl ConnectionManager for SqlServerManager {
    type Connection = SqlServerClient;

    async fn connect(&self) -> Result<SqlServerClient> {
        let config = self.tiberius_config()?;
        let addr = config.get_addr();

        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::connectivity_with_source(format!("cannot reach {}", addr), e))?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!(error = %e, "could not set TCP_NODELAY");
        }

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| Error::connectivity_with_source(format!("login to {} failed", addr), e))?;
        debug!(%addr, user = self.config.username(), "connected to SQL Server");
        Ok(client)
    }

    async fn validate(&self, client: &mut SqlServerClient, query: &str) -> Result<()> {
        client
            .simple_query(query)
            .await
            .map_err(|e| Error::validation_query(e.to_string()))?
            .into_results()
            .await
            .map_err(|e| Error::validation_query(e.to_string()))?;
        Ok(())
    }
}
