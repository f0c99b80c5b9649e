use std::sync::Arc;

use crate::config::Config;

pub struct AppState {
    pub config: Config,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        let config = Config::load();

        Arc::new(Self { config })
    }
}
