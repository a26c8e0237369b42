pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use crate::services::{session_service::SessionService, test_config_service::TestConfigService};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct AppState {
    pub session_service: SessionService,
    pub test_config_service: TestConfigService,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        let config = crate::config::get_config();

        let session_service = SessionService::new(store.clone())
            .with_scoring_policy(config.scoring_policy)
            .with_fill_policy(config.fill_policy);
        let test_config_service = TestConfigService::new(store);

        Self {
            session_service,
            test_config_service,
        }
    }
}
