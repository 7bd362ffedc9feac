use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use super::{DeleteOutcome, EventFilter, TicketStore};
use crate::models::{Category, CommitOutcome, Event, EventSummary, Purchase, PurchaseDraft};
use crate::services::inventory;
use crate::utils::error::AppError;

#[derive(Default)]
struct Tables {
    categories: BTreeMap<i32, Category>,
    events: HashMap<Uuid, Event>,
    purchases: HashMap<Uuid, Purchase>,
}

impl Tables {
    fn sold(&self, event_id: Uuid) -> i64 {
        self.purchases
            .values()
            .filter(|p| p.event_id == event_id)
            .map(|p| i64::from(p.quantity))
            .sum()
    }

    fn summary(&self, event: &Event) -> EventSummary {
        inventory::summarize(event.clone(), self.sold(event.id))
    }
}

/// Process-local store for tests and database-less local runs.
///
/// Writers for one event are serialized by an async mutex keyed on the
/// event id; the table lock itself is never held across an await.
#[derive(Clone, Default)]
pub struct InMemoryTicketStore {
    tables: Arc<RwLock<Tables>>,
    event_locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

fn poisoned<T>(_: T) -> AppError {
    AppError::InternalServerError("in-memory store lock poisoned".to_string())
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.write() {
            for category in categories {
                tables.categories.insert(category.id, category);
            }
        }
        store
    }

    fn event_lock(&self, event_id: Uuid) -> Result<Arc<tokio::sync::Mutex<()>>, AppError> {
        let mut locks = self.event_locks.lock().map_err(poisoned)?;
        Ok(Arc::clone(locks.entry(event_id).or_default()))
    }

    /// Drops the lock entry of an event that no longer exists.
    fn forget_event_lock(&self, event_id: Uuid) -> Result<(), AppError> {
        self.event_locks.lock().map_err(poisoned)?.remove(&event_id);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.event_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

impl TicketStore for InMemoryTicketStore {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn category_exists(&self, id: i32) -> Result<bool, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.categories.contains_key(&id))
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.events.get(&id).cloned())
    }

    async fn event_summary(&self, id: Uuid) -> Result<Option<EventSummary>, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.events.get(&id).map(|event| tables.summary(event)))
    }

    async fn find_event_summaries(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<EventSummary>, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .events
            .values()
            .filter(|event| filter.matches(event))
            .map(|event| tables.summary(event))
            .collect())
    }

    async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<bool, AppError> {
        let lock = self.event_lock(event.id)?;
        let _guard = lock.lock().await;

        let updated = {
            let mut tables = self.tables.write().map_err(poisoned)?;
            match tables.events.get_mut(&event.id) {
                Some(existing) => {
                    *existing = event.clone();
                    true
                }
                None => false,
            }
        };
        if !updated {
            self.forget_event_lock(event.id)?;
        }
        Ok(updated)
    }

    async fn delete_event(&self, id: Uuid) -> Result<DeleteOutcome, AppError> {
        let lock = self.event_lock(id)?;
        let _guard = lock.lock().await;

        let mut tables = self.tables.write().map_err(poisoned)?;
        if !tables.events.contains_key(&id) {
            drop(tables);
            self.forget_event_lock(id)?;
            return Ok(DeleteOutcome::NotFound);
        }
        let referencing = tables.purchases.values().filter(|p| p.event_id == id).count() as i64;
        if referencing > 0 {
            return Ok(DeleteOutcome::HasPurchases(referencing));
        }
        tables.events.remove(&id);
        drop(tables);

        self.forget_event_lock(id)?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn commit_purchase(
        &self,
        draft: PurchaseDraft,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, AppError> {
        let lock = self.event_lock(draft.event_id)?;
        let _guard = lock.lock().await;

        let locked = {
            let tables = self.tables.read().map_err(poisoned)?;
            tables.events.get(&draft.event_id).map(|event| {
                let remaining = inventory::remaining(event.available_tickets, tables.sold(event.id));
                (event.price, remaining)
            })
        };
        let Some((price, remaining)) = locked else {
            self.forget_event_lock(draft.event_id)?;
            return Ok(CommitOutcome::EventMissing);
        };

        if i64::from(draft.quantity) > remaining {
            return Ok(CommitOutcome::Insufficient { remaining });
        }

        let purchase = draft.into_purchase(price, now);
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.purchases.insert(purchase.id, purchase.clone());
        Ok(CommitOutcome::Committed(purchase))
    }

    async fn find_purchase(&self, id: Uuid) -> Result<Option<Purchase>, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.purchases.get(&id).cloned())
    }

    async fn set_rating(&self, id: Uuid, rating: i16) -> Result<Option<Purchase>, AppError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        Ok(tables.purchases.get_mut(&id).map(|purchase| {
            purchase.rating = Some(rating);
            purchase.clone()
        }))
    }

    async fn purchases_for_attendee(&self, attendee_id: Uuid) -> Result<Vec<Purchase>, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut purchases: Vec<Purchase> = tables
            .purchases
            .values()
            .filter(|p| p.attendee_id == Some(attendee_id))
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(purchases)
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>, AppError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut purchases: Vec<Purchase> = tables.purchases.values().cloned().collect();
        purchases.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(purchases)
    }
}
