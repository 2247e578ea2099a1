//! Entry point tying a driver, the type registry and configuration together.

use std::sync::Arc;

use tracing::{debug, info};

use neogm_core::{OgmResult, TypeRegistry};

use crate::client::GraphClient;
use crate::config::{IndexStrategy, OgmConfig};
use crate::connection::{AccessMode, Driver};
use crate::schema::SchemaReconciler;
use crate::session::Session;

/// Owns the driver and the shared registry; hands out sessions and the
/// schema reconciler.
pub struct Ogm<D: Driver = GraphClient> {
    driver: D,
    registry: Arc<TypeRegistry>,
    config: OgmConfig,
}

impl Ogm<GraphClient> {
    /// Connect to Neo4j with `config` and apply its index strategy.
    pub async fn connect(config: OgmConfig, registry: TypeRegistry) -> OgmResult<Self> {
        config.validate()?;
        let driver = GraphClient::connect(&config).await?;
        Self::with_driver(driver, config, registry).await
    }
}

impl<D: Driver> Ogm<D> {
    pub async fn with_driver(driver: D, config: OgmConfig, registry: TypeRegistry) -> OgmResult<Self> {
        config.validate()?;
        let ogm = Self {
            driver,
            registry: Arc::new(registry),
            config,
        };
        ogm.init().await?;
        Ok(ogm)
    }

    /// Bring the database schema in line with the configured index strategy.
    pub async fn init(&self) -> OgmResult<()> {
        let schema = self.schema();
        match self.config.index_strategy {
            IndexStrategy::Assert => {
                let dropped = schema.drop_all().await?;
                let created = schema.create_all().await?;
                info!(dropped, created, "Asserted schema");
            }
            IndexStrategy::Validate => schema.verify_all().await?,
            IndexStrategy::Ignore => debug!("Index strategy is ignore, leaving schema untouched"),
        }
        Ok(())
    }

    /// Open a session configured with this mapper's depth and load strategy.
    pub async fn new_session(&self, mode: AccessMode) -> OgmResult<Session<D::Conn>> {
        let conn = self.driver.open(mode).await?;
        let mut session = Session::new(conn, Arc::clone(&self.registry));
        session.default_depth = self.config.default_depth;
        session.load_strategy = self.config.load_strategy;
        Ok(session)
    }

    pub fn schema(&self) -> SchemaReconciler<'_, D> {
        SchemaReconciler::new(&self.driver, Arc::clone(&self.registry))
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OgmConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}
