//! Purchase submission and the purchase read paths.
//!
//! [`PurchaseService::submit`] is the only code path that creates a
//! purchase. It validates and back-fills the request, then hands the
//! remaining-ticket check and the insert to the store as one atomic unit.

use chrono::{SubsecRound, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{Caller, CommitOutcome, Purchase, PurchaseDetails, PurchaseDraft, Role};
use crate::services::inventory;
use crate::services::notify::{self, Notifier};
use crate::store::TicketStore;
use crate::utils::error::AppError;
use crate::utils::validation::{is_valid_email, non_blank};

pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub quantity: i32,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
}

pub struct PurchaseService<S, N> {
    store: S,
    notifier: N,
    max_attempts: u32,
}

impl<S: TicketStore, N: Notifier> PurchaseService<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            max_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[instrument(skip(self, request, caller), fields(quantity = request.quantity))]
    pub async fn submit(
        &self,
        event_id: Uuid,
        request: PurchaseRequest,
        caller: &Caller,
    ) -> Result<Purchase, AppError> {
        let draft = build_draft(event_id, request, caller)?;

        let mut attempt = 1;
        let outcome = loop {
            let now = Utc::now().trunc_subsecs(6);
            match self.store.commit_purchase(draft.clone(), now).await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(%event_id, attempt, "Purchase commit conflicted, retrying");
                    attempt += 1;
                }
                result => break result?,
            }
        };

        match outcome {
            CommitOutcome::Committed(purchase) => {
                info!(
                    purchase_id = %purchase.id,
                    %event_id,
                    quantity = purchase.quantity,
                    total_cost = %purchase.total_cost,
                    "Purchase committed"
                );
                self.send_confirmation(&purchase).await;
                Ok(purchase)
            }
            CommitOutcome::Insufficient { remaining } => {
                warn!(
                    %event_id,
                    requested = draft.quantity,
                    remaining,
                    "Purchase exceeded remaining tickets"
                );
                Err(AppError::InsufficientInventory { remaining })
            }
            CommitOutcome::EventMissing => {
                Err(AppError::NotFound(format!("Event '{}' was not found", event_id)))
            }
        }
    }

    /// Best effort: the purchase is already committed.
    async fn send_confirmation(&self, purchase: &Purchase) {
        let event = match self.store.find_event(purchase.event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(err) => {
                warn!(purchase_id = %purchase.id, error = %err, "Could not load event for confirmation email");
                return;
            }
        };

        let (subject, body) = notify::purchase_confirmation(purchase, &event);
        if let Err(err) = self.notifier.send(&purchase.guest_email, &subject, &body).await {
            warn!(purchase_id = %purchase.id, error = %err, "Confirmation email failed");
        }
    }

    pub async fn get_purchase(&self, id: Uuid) -> Result<PurchaseDetails, AppError> {
        let purchase = self
            .store
            .find_purchase(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase '{}' was not found", id)))?;

        let event = self.store.find_event(purchase.event_id).await?.ok_or_else(|| {
            AppError::NotFound("Event not found for this purchase".to_string())
        })?;

        let can_rate = inventory::can_rate(&event, Utc::now());
        Ok(PurchaseDetails {
            purchase,
            event,
            can_rate,
        })
    }

    pub async fn purchases_for_caller(&self, caller: &Caller) -> Result<Vec<Purchase>, AppError> {
        let attendee_id = caller
            .subject_id()
            .ok_or_else(|| AppError::Forbidden("Sign in to view your tickets".to_string()))?;
        self.store.purchases_for_attendee(attendee_id).await
    }

    pub async fn list_purchases(&self, caller: &Caller) -> Result<Vec<Purchase>, AppError> {
        if !caller.has_role(Role::Admin) {
            return Err(AppError::Forbidden("Only admins can list all purchases".to_string()));
        }
        self.store.list_purchases().await
    }
}

/// Validates the request and fills blank guest fields from the caller's profile.
fn build_draft(
    event_id: Uuid,
    request: PurchaseRequest,
    caller: &Caller,
) -> Result<PurchaseDraft, AppError> {
    if request.quantity < 1 {
        return Err(AppError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let mut guest_name = non_blank(request.guest_name.as_deref()).map(str::to_string);
    let mut guest_email = non_blank(request.guest_email.as_deref()).map(str::to_string);

    let identity = caller.identity();
    if let Some(identity) = identity {
        let profile_email = non_blank(identity.email.as_deref());
        if guest_name.is_none() {
            guest_name = non_blank(identity.display_name.as_deref())
                .or(profile_email)
                .map(str::to_string);
        }
        if guest_email.is_none() {
            guest_email = profile_email.map(str::to_string);
        }
    }

    let guest_name =
        guest_name.ok_or_else(|| AppError::ValidationError("Full Name is required".to_string()))?;
    let guest_email =
        guest_email.ok_or_else(|| AppError::ValidationError("Email is required".to_string()))?;

    if !is_valid_email(&guest_email) {
        return Err(AppError::ValidationError(
            "Please enter a valid email address".to_string(),
        ));
    }

    Ok(PurchaseDraft {
        event_id,
        quantity: request.quantity,
        guest_name,
        guest_email,
        attendee_id: identity.map(|identity| identity.subject_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Event, EventSummary, Identity};
    use crate::services::notify::LogNotifier;
    use crate::store::{DeleteOutcome, EventFilter, InMemoryTicketStore};
    use chrono::{DateTime, Duration};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn attendee(email: Option<&str>, name: Option<&str>) -> Caller {
        Caller::User(Identity {
            subject_id: Uuid::new_v4(),
            roles: vec![Role::Attendee],
            display_name: name.map(str::to_string),
            email: email.map(str::to_string),
        })
    }

    fn request(quantity: i32, name: Option<&str>, email: Option<&str>) -> PurchaseRequest {
        PurchaseRequest {
            quantity,
            guest_name: name.map(str::to_string),
            guest_email: email.map(str::to_string),
        }
    }

    async fn store_with_event(available_tickets: i32, price: Decimal) -> (InMemoryTicketStore, Uuid) {
        let store = InMemoryTicketStore::new();
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            title: "Toronto Startup Night".to_string(),
            description: None,
            start_at: now + Duration::days(7),
            price,
            available_tickets,
            address: "Event Hall".to_string(),
            image_path: None,
            category_id: 3,
            organizer_id: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_event(&event).await.unwrap();
        (store, event.id)
    }

    #[test]
    fn test_blank_guest_email_is_backfilled_from_profile() {
        let caller = attendee(Some("a@x.com"), Some("Ada"));
        let draft = build_draft(Uuid::new_v4(), request(1, None, Some("  ")), &caller).unwrap();

        assert_eq!(draft.guest_email, "a@x.com");
        assert_eq!(draft.guest_name, "Ada");
        assert_eq!(draft.attendee_id, caller.subject_id());
    }

    #[test]
    fn test_explicit_guest_fields_are_kept() {
        let caller = attendee(Some("a@x.com"), Some("Ada"));
        let draft = build_draft(
            Uuid::new_v4(),
            request(1, Some("Bob"), Some("b@y.com")),
            &caller,
        )
        .unwrap();

        assert_eq!(draft.guest_email, "b@y.com");
        assert_eq!(draft.guest_name, "Bob");
    }

    #[test]
    fn test_name_falls_back_to_profile_email() {
        let caller = attendee(Some("a@x.com"), None);
        let draft = build_draft(Uuid::new_v4(), request(1, None, None), &caller).unwrap();
        assert_eq!(draft.guest_name, "a@x.com");
    }

    #[test]
    fn test_guest_purchase_requires_valid_fields() {
        let id = Uuid::new_v4();
        let anonymous = Caller::Anonymous;

        assert!(matches!(
            build_draft(id, request(1, None, Some("g@x.com")), &anonymous),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            build_draft(id, request(1, Some("Guest"), Some("not-an-email")), &anonymous),
            Err(AppError::ValidationError(_))
        ));

        let draft = build_draft(id, request(1, Some("Guest"), Some("g@x.com")), &anonymous).unwrap();
        assert_eq!(draft.attendee_id, None);
    }

    #[test]
    fn test_quantity_must_be_positive() {
        for quantity in [0, -1] {
            assert!(matches!(
                build_draft(Uuid::new_v4(), request(quantity, Some("G"), Some("g@x.com")), &Caller::Anonymous),
                Err(AppError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_submit_computes_total_and_reports_remaining() {
        let (store, event_id) = store_with_event(5, Decimal::new(1500, 2)).await;
        let service = PurchaseService::new(store.clone(), LogNotifier);

        let purchase = service
            .submit(event_id, request(3, Some("Guest"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .unwrap();
        assert_eq!(purchase.total_cost, Decimal::new(4500, 2));
        assert_eq!(purchase.rating, None);

        let err = service
            .submit(event_id, request(3, Some("Guest"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientInventory { remaining: 2 }));
    }

    #[tokio::test]
    async fn test_submit_unknown_event_is_not_found() {
        let service = PurchaseService::new(InMemoryTicketStore::new(), LogNotifier);
        let err = service
            .submit(Uuid::new_v4(), request(1, Some("G"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_last_ticket_goes_to_exactly_one_buyer() {
        let (store, event_id) = store_with_event(1, Decimal::new(2500, 2)).await;
        let service = Arc::new(PurchaseService::new(store, LogNotifier));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .submit(event_id, request(1, Some("G"), Some("g@x.com")), &Caller::Anonymous)
                        .await
                })
            })
            .collect();

        let mut committed = Vec::new();
        let mut rejected = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(purchase) => committed.push(purchase),
                Err(err) => rejected.push(err),
            }
        }

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].total_cost, Decimal::new(2500, 2));
        assert_eq!(rejected.len(), 1);
        assert!(matches!(rejected[0], AppError::InsufficientInventory { remaining: 0 }));
    }

    /// Reports a serialization conflict for the first `conflicts` commits.
    #[derive(Clone)]
    struct ContendedStore {
        inner: InMemoryTicketStore,
        conflicts: u32,
        attempts: Arc<AtomicU32>,
    }

    impl ContendedStore {
        fn new(inner: InMemoryTicketStore, conflicts: u32) -> Self {
            Self {
                inner,
                conflicts,
                attempts: Arc::new(AtomicU32::new(0)),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl TicketStore for ContendedStore {
        async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
            self.inner.list_categories().await
        }

        async fn category_exists(&self, id: i32) -> Result<bool, AppError> {
            self.inner.category_exists(id).await
        }

        async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
            self.inner.find_event(id).await
        }

        async fn event_summary(&self, id: Uuid) -> Result<Option<EventSummary>, AppError> {
            self.inner.event_summary(id).await
        }

        async fn find_event_summaries(
            &self,
            filter: &EventFilter,
        ) -> Result<Vec<EventSummary>, AppError> {
            self.inner.find_event_summaries(filter).await
        }

        async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
            self.inner.insert_event(event).await
        }

        async fn update_event(&self, event: &Event) -> Result<bool, AppError> {
            self.inner.update_event(event).await
        }

        async fn delete_event(&self, id: Uuid) -> Result<DeleteOutcome, AppError> {
            self.inner.delete_event(id).await
        }

        async fn commit_purchase(
            &self,
            draft: PurchaseDraft,
            now: DateTime<Utc>,
        ) -> Result<CommitOutcome, AppError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.conflicts {
                return Err(AppError::Conflict("could not serialize access".to_string()));
            }
            self.inner.commit_purchase(draft, now).await
        }

        async fn find_purchase(&self, id: Uuid) -> Result<Option<Purchase>, AppError> {
            self.inner.find_purchase(id).await
        }

        async fn set_rating(&self, id: Uuid, rating: i16) -> Result<Option<Purchase>, AppError> {
            self.inner.set_rating(id, rating).await
        }

        async fn purchases_for_attendee(&self, attendee_id: Uuid) -> Result<Vec<Purchase>, AppError> {
            self.inner.purchases_for_attendee(attendee_id).await
        }

        async fn list_purchases(&self) -> Result<Vec<Purchase>, AppError> {
            self.inner.list_purchases().await
        }
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_until_commit() {
        let (inner, event_id) = store_with_event(5, Decimal::ONE).await;
        let store = ContendedStore::new(inner.clone(), 2);
        let service = PurchaseService::new(store.clone(), LogNotifier);

        let purchase = service
            .submit(event_id, request(1, Some("G"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .unwrap();

        assert_eq!(store.attempts(), DEFAULT_COMMIT_ATTEMPTS);
        assert_eq!(inner.find_purchase(purchase.id).await.unwrap(), Some(purchase));
    }

    #[tokio::test]
    async fn test_conflict_surfaces_after_last_attempt() {
        let (inner, event_id) = store_with_event(5, Decimal::ONE).await;
        let store = ContendedStore::new(inner.clone(), 3);
        let service = PurchaseService::new(store.clone(), LogNotifier);

        let err = service
            .submit(event_id, request(1, Some("G"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.attempts(), DEFAULT_COMMIT_ATTEMPTS);
        assert!(inner.list_purchases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_max_attempts_is_configurable() {
        let (inner, event_id) = store_with_event(5, Decimal::ONE).await;

        let single = ContendedStore::new(inner.clone(), 1);
        let service = PurchaseService::new(single.clone(), LogNotifier).with_max_attempts(1);
        let err = service
            .submit(event_id, request(1, Some("G"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(single.attempts(), 1);

        let patient = ContendedStore::new(inner, 4);
        let service = PurchaseService::new(patient.clone(), LogNotifier).with_max_attempts(5);
        assert!(service
            .submit(event_id, request(1, Some("G"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .is_ok());
        assert_eq!(patient.attempts(), 5);
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), AppError> {
            Err(AppError::ExternalServiceError("smtp down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_purchase() {
        let (store, event_id) = store_with_event(2, Decimal::ONE).await;
        let service = PurchaseService::new(store.clone(), FailingNotifier);

        let purchase = service
            .submit(event_id, request(1, Some("G"), Some("g@x.com")), &Caller::Anonymous)
            .await
            .unwrap();

        assert_eq!(store.find_purchase(purchase.id).await.unwrap(), Some(purchase));
    }

    #[tokio::test]
    async fn test_listing_purchases_requires_admin() {
        let service = PurchaseService::new(InMemoryTicketStore::new(), LogNotifier);
        let err = service.list_purchases(&attendee(None, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service.purchases_for_caller(&Caller::Anonymous).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
