use std::sync::Arc;

use crate::downloads::DownloadManager;
use crate::library::LibraryClient;
use crate::search::SearchClient;

/// Shared handler state; cheap to clone, handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DownloadManager>,
    pub search: Arc<SearchClient>,
    pub library: Option<Arc<LibraryClient>>,
}

impl AppState {
    pub fn new(
        manager: Arc<DownloadManager>,
        search: Arc<SearchClient>,
        library: Option<Arc<LibraryClient>>,
    ) -> Self {
        Self {
            manager,
            search,
            library,
        }
    }
}
