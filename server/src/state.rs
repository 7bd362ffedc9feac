use std::sync::Arc;

use crate::services::{AnyNotifier, CatalogService, PurchaseService, RatingService, SearchService};
use crate::store::AnyStore;

/// Services shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService<AnyStore>>,
    pub purchases: Arc<PurchaseService<AnyStore, AnyNotifier>>,
    pub ratings: Arc<RatingService<AnyStore>>,
    pub search: Arc<SearchService<AnyStore>>,
}

impl AppState {
    pub fn new(store: AnyStore, notifier: AnyNotifier) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(store.clone())),
            purchases: Arc::new(PurchaseService::new(store.clone(), notifier)),
            ratings: Arc::new(RatingService::new(store.clone())),
            search: Arc::new(SearchService::new(store)),
        }
    }
}
