use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::mailer::{ConfirmationMailer, build_mailer};

/// Everything a request handler or background job needs, built once at
/// startup and shared behind `Arc`s.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub mailer: Arc<dyn ConfirmationMailer>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let mailer = build_mailer(&config.mail);

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            mailer,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
