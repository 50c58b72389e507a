pub mod dialect;
pub mod factory;
pub mod pool;
pub mod sqlserver;
pub mod value;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Opens and checks physical connections on behalf of a pool
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a new physical connection
    async fn connect(&self) -> Result<Self::Connection>;

    /// Run `query` on `conn`; an error means the connection must be dropped
    async fn validate(&self, conn: &mut Self::Connection, query: &str) -> Result<()>;
}

#[async_trait]
impl<M: ConnectionManager> ConnectionManager for Arc<M> {
    type Connection = M::Connection;

    async fn connect(&self) -> Result<Self::Connection> {
        (**self).connect().await
    }

    async fn validate(&self, conn: &mut Self::Connection, query: &str) -> Result<()> {
        (**self).validate(conn, query).await
    }
}
