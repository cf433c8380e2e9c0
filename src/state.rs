//! Shared application state handed to every handler and middleware.

use std::sync::Arc;

use crate::{config::AuthConfig, db::DynService};

#[derive(Clone)]
pub struct AppState {
    /// Data access service, built once in `main`
    pub db: DynService,

    pub auth: Arc<AuthConfig>,

    /// Terminate the process when the health check finds the database down
    pub health_exit_on_down: bool,
}
