//! Durable storage for the catalog and purchases.
//!
//! Every implementation must make [`TicketStore::commit_purchase`] a single
//! serialization unit per event: the committed-quantity sum it reads and the
//! purchase it inserts cannot interleave with another commit for the same
//! event. Commits for different events are free to run in parallel.

use chrono::{DateTime, Utc};
use std::future::Future;
use uuid::Uuid;

use crate::models::{Category, CommitOutcome, Event, EventSummary, Purchase, PurchaseDraft};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryTicketStore;
pub use postgres::PgTicketStore;

/// The parts of a search that storage evaluates before inventory is known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    /// Lower-cased, trimmed, non-empty.
    pub text: Option<String>,
    pub category_id: Option<i32>,
    pub starts_from: Option<DateTime<Utc>>,
    pub starts_until: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(text) = &self.text {
            let in_title = event.title.to_lowercase().contains(text.as_str());
            let in_description = event
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(text.as_str()))
                .unwrap_or(false);
            if !in_title && !in_description {
                return false;
            }
        }
        if let Some(category_id) = self.category_id {
            if event.category_id != category_id {
                return false;
            }
        }
        if let Some(from) = self.starts_from {
            if event.start_at < from {
                return false;
            }
        }
        if let Some(until) = self.starts_until {
            if event.start_at > until {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    HasPurchases(i64),
}

pub trait TicketStore: Send + Sync + 'static {
    fn list_categories(&self) -> impl Future<Output = Result<Vec<Category>, AppError>> + Send;

    fn category_exists(&self, id: i32) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn find_event(&self, id: Uuid) -> impl Future<Output = Result<Option<Event>, AppError>> + Send;

    fn event_summary(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<EventSummary>, AppError>> + Send;

    /// Events matching `filter` with their sold counts, in no particular order.
    fn find_event_summaries(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<EventSummary>, AppError>> + Send;

    fn insert_event(&self, event: &Event) -> impl Future<Output = Result<(), AppError>> + Send;

    fn update_event(&self, event: &Event) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Deletes the event only when no purchase references it.
    fn delete_event(&self, id: Uuid) -> impl Future<Output = Result<DeleteOutcome, AppError>> + Send;

    /// Atomic check-and-insert against the event's remaining tickets.
    fn commit_purchase(
        &self,
        draft: PurchaseDraft,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<CommitOutcome, AppError>> + Send;

    fn find_purchase(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Purchase>, AppError>> + Send;

    fn set_rating(
        &self,
        id: Uuid,
        rating: i16,
    ) -> impl Future<Output = Result<Option<Purchase>, AppError>> + Send;

    /// Newest first.
    fn purchases_for_attendee(
        &self,
        attendee_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Purchase>, AppError>> + Send;

    /// Newest first.
    fn list_purchases(&self) -> impl Future<Output = Result<Vec<Purchase>, AppError>> + Send;
}

/// Backend chosen at startup from configuration.
#[derive(Clone)]
pub enum AnyStore {
    Postgres(PgTicketStore),
    Memory(InMemoryTicketStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStore::Postgres($store) => $call.await,
            AnyStore::Memory($store) => $call.await,
        }
    };
}

impl TicketStore for AnyStore {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        dispatch!(self, store => store.list_categories())
    }

    async fn category_exists(&self, id: i32) -> Result<bool, AppError> {
        dispatch!(self, store => store.category_exists(id))
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        dispatch!(self, store => store.find_event(id))
    }

    async fn event_summary(&self, id: Uuid) -> Result<Option<EventSummary>, AppError> {
        dispatch!(self, store => store.event_summary(id))
    }

    async fn find_event_summaries(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<EventSummary>, AppError> {
        dispatch!(self, store => store.find_event_summaries(filter))
    }

    async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        dispatch!(self, store => store.insert_event(event))
    }

    async fn update_event(&self, event: &Event) -> Result<bool, AppError> {
        dispatch!(self, store => store.update_event(event))
    }

    async fn delete_event(&self, id: Uuid) -> Result<DeleteOutcome, AppError> {
        dispatch!(self, store => store.delete_event(id))
    }

    async fn commit_purchase(
        &self,
        draft: PurchaseDraft,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, AppError> {
        dispatch!(self, store => store.commit_purchase(draft, now))
    }

    async fn find_purchase(&self, id: Uuid) -> Result<Option<Purchase>, AppError> {
        dispatch!(self, store => store.find_purchase(id))
    }

    async fn set_rating(&self, id: Uuid, rating: i16) -> Result<Option<Purchase>, AppError> {
        dispatch!(self, store => store.set_rating(id, rating))
    }

    async fn purchases_for_attendee(&self, attendee_id: Uuid) -> Result<Vec<Purchase>, AppError> {
        dispatch!(self, store => store.purchases_for_attendee(attendee_id))
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>, AppError> {
        dispatch!(self, store => store.list_purchases())
    }
}
