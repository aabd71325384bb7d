use std::sync::Arc;

use crate::{database::DocumentStore, security::token::TokenService};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }
}
