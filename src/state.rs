use std::sync::Arc;

use crate::directory::DirectoryStore;
use crate::registration::RegistrationService;
use crate::session::SessionService;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<RegistrationService>,
    pub sessions: Arc<SessionService>,
    pub directory: Arc<dyn DirectoryStore>,
}
