//! Composition point handed to the host query engine.

use crate::config::{ConnectionConfig, RawConnectionConfig};
use crate::connection_string::{self, ConnectionString};
use crate::engine::factory::PooledConnectionFactory;
use crate::engine::pool::PoolPolicy;
use crate::engine::sqlserver::SqlServerManager;
use crate::engine::ConnectionManager;
use crate::error::Result;
use crate::util::dialects::mssql_legacy::DialectAdapter;
use std::sync::Arc;
use tracing::info;

/// Everything the host needs to query one legacy SQL Server source.
pub struct SourcePlugin<M: ConnectionManager = SqlServerManager> {
    config: Arc<ConnectionConfig>,
    connection_string: ConnectionString,
    dialect: Arc<DialectAdapter>,
    connection_factory: Arc<PooledConnectionFactory<M>>,
}

impl<M: ConnectionManager> SourcePlugin<M> {
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connection_string(&self) -> &ConnectionString {
        &self.connection_string
    }

    pub fn dialect(&self) -> &Arc<DialectAdapter> {
        &self.dialect
    }

    pub fn connection_factory(&self) -> &Arc<PooledConnectionFactory<M>> {
        &self.connection_factory
    }

    /// Source removed or reconfigured: release the pool
    pub fn close(&self) {
        self.connection_factory.close();
    }
}

/// Validate `raw` and assemble a plugin backed by tiberius.
pub fn assemble(raw: RawConnectionConfig) -> Result<SourcePlugin<SqlServerManager>> {
    assemble_with(raw, SqlServerManager::new)
}

/// Same as [`assemble`] with a caller-supplied connectivity layer.
///
/// `make_manager` runs when the first connection is requested, not here.
pub fn assemble_with<M, F>(raw: RawConnectionConfig, make_manager: F) -> Result<SourcePlugin<M>>
where
    M: ConnectionManager,
    F: Fn(Arc<ConnectionConfig>, ConnectionString) -> M + Send + Sync + 'static,
{
    let config = Arc::new(ConnectionConfig::validate(raw)?);
    let connection_string = connection_string::build(&config);
    let dialect = DialectAdapter::shared()?;

    let connection_factory = {
        let config = Arc::clone(&config);
        let endpoint = connection_string.clone();
        Arc::new(PooledConnectionFactory::with_manager(
            move || make_manager(Arc::clone(&config), endpoint.clone()),
            PoolPolicy::default(),
        ))
    };

    info!(
        host = config.host(),
        port = config.port(),
        family = connection_string::DRIVER_FAMILY.name(),
        "assembled legacy SQL Server source"
    );

    Ok(SourcePlugin {
        config,
        connection_string,
        dialect,
        connection_factory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::raw;
    use crate::engine::dialect::RuleSet;
    use crate::engine::testing::MockManager;
    use crate::error::Error;

    #[tokio::test]
    async fn assembles_all_parts() {
        let plugin = assemble_with(raw("dbhost", Some("Sales"), true), |_, _| {
            MockManager::default()
        })
        .unwrap();

        assert_eq!(
            plugin.connection_string().as_str(),
            connection_string::build(plugin.config()).as_str()
        );
        assert!(!plugin.dialect().supports_charset());
        assert_eq!(plugin.dialect().quote_string_literal("café", None), "N'café'");
        assert!(!plugin.connection_factory().is_initialized());

        let lease = plugin.connection_factory().acquire().await.unwrap();
        assert_eq!(lease.id, 0);
        drop(lease);

        plugin.close();
        plugin.close();
        assert!(matches!(
            plugin.connection_factory().acquire().await,
            Err(Error::PoolClosed)
        ));
    }

    #[test]
    fn manager_sees_validated_config_and_endpoint() {
        let plugin = assemble_with(raw(" dbhost ", None, false), |config, endpoint| {
            assert_eq!(config.host(), "dbhost");
            assert!(endpoint.as_str().contains("dbhost:1433"));
            MockManager::default()
        })
        .unwrap();
        plugin.connection_factory().pool().unwrap();
    }

    #[test]
    fn invalid_config_is_rejected_before_anything_is_built() {
        let result = assemble_with(RawConnectionConfig::default(), |_, _| -> MockManager {
            panic!("manager must not be built for an invalid config")
        });
        match result {
            Err(Error::Validation(err)) => {
                assert_eq!(err.fields(), vec!["host", "username", "password"])
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected a validation error"),
        }
    }

    #[test]
    fn plugins_share_one_dialect() {
        let a = assemble(raw("a", None, false)).unwrap();
        let b = assemble(raw("b", None, false)).unwrap();
        assert!(Arc::ptr_eq(a.dialect(), b.dialect()));
    }
}
