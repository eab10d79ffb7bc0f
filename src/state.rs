use std::sync::Arc;

use crate::{config::Config, store::Store, utils::clock::Clock};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl FromRef<AppState> for Store {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
