pub mod clients;
pub mod config;
pub mod loadviz;
pub mod models;
pub mod routes;

use std::sync::Arc;

use clients::poller::Poller;

#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<Poller>,
    pub config: Arc<config::Config>,
}
