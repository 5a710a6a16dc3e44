use std::ops::Deref;
use std::sync::Arc;

use service::app::Managements;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    managements: Arc<Managements>,
}

impl AppState {
    pub fn new(managements: Managements) -> Self { Self { managements: Arc::new(managements) } }
}

impl Deref for AppState {
    type Target = Managements;

    fn deref(&self) -> &Managements { &self.managements }
}
