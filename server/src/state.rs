//! Shared application state handed to every route.

use std::sync::Arc;

use dispatch_core::DispatchService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DispatchService>,
}

impl AppState {
    pub fn new(service: DispatchService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
