pub mod ids;
pub mod auth;
pub mod errors;
pub mod config;
pub mod request;
pub mod response;
pub mod store;
pub mod payments;
pub mod logos;
pub mod types;
pub mod accounts;
pub mod team;
pub mod clients;
pub mod billing;
pub mod branding;
pub mod platforms;
pub mod connections;
pub mod files;
pub mod activity;
pub mod jobs;

use config::Config;
use logos::LogoStorage;
use payments::PaymentsProvider;
use std::sync::Arc;
use store::KeyValueStore;

/// Shared application state, built once per process.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KeyValueStore>,
    pub payments: Arc<dyn PaymentsProvider>,
    pub logos: Arc<dyn LogoStorage>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        payments: Arc<dyn PaymentsProvider>,
        logos: Arc<dyn LogoStorage>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            payments,
            logos,
        })
    }
}
