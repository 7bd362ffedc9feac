use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Caller, Purchase};
use crate::services::inventory;
use crate::store::TicketStore;
use crate::utils::error::AppError;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub struct RatingService<S> {
    store: S,
}

impl<S: TicketStore> RatingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Sets the satisfaction rating on the caller's own purchase.
    ///
    /// Only the purchasing attendee may rate, and only once the event has
    /// started. Re-rating overwrites the previous value.
    pub async fn rate(
        &self,
        purchase_id: Uuid,
        rating: i32,
        caller: &Caller,
    ) -> Result<Purchase, AppError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(AppError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let purchase = self
            .store
            .find_purchase(purchase_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase '{}' was not found", purchase_id)))?;

        let is_owner = purchase.attendee_id.is_some() && purchase.attendee_id == caller.subject_id();
        if !is_owner {
            warn!(%purchase_id, "Unauthorized rating attempt");
            return Err(AppError::Forbidden(
                "Only the attendee who made this purchase can rate it".to_string(),
            ));
        }

        let event = self
            .store
            .find_event(purchase.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found for this purchase".to_string()))?;
        if !inventory::can_rate(&event, Utc::now()) {
            return Err(AppError::ValidationError(
                "Ratings open once the event has started".to_string(),
            ));
        }

        let rated = self
            .store
            .set_rating(purchase_id, rating as i16)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase '{}' was not found", purchase_id)))?;

        info!(%purchase_id, rating, "Purchase rated");
        Ok(rated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, Identity, PurchaseDraft, Role};
    use crate::store::InMemoryTicketStore;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn user(id: Uuid) -> Caller {
        Caller::User(Identity {
            subject_id: id,
            roles: vec![Role::Attendee],
            display_name: None,
            email: None,
        })
    }

    async fn purchase(store: &InMemoryTicketStore, starts_in: Duration, attendee_id: Option<Uuid>) -> Purchase {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            title: "Morning Boost".to_string(),
            description: None,
            start_at: now + starts_in,
            price: Decimal::ZERO,
            available_tickets: 120,
            address: "Cafeteria".to_string(),
            image_path: None,
            category_id: 5,
            organizer_id: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_event(&event).await.unwrap();

        let draft = PurchaseDraft {
            event_id: event.id,
            quantity: 1,
            guest_name: "A".to_string(),
            guest_email: "a@x.com".to_string(),
            attendee_id,
        };
        match store.commit_purchase(draft, now).await.unwrap() {
            crate::models::CommitOutcome::Committed(purchase) => purchase,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_owner_can_rate_and_rerate() {
        let store = InMemoryTicketStore::new();
        let owner = Uuid::new_v4();
        let bought = purchase(&store, -Duration::hours(2), Some(owner)).await;
        let service = RatingService::new(store.clone());

        assert_eq!(service.rate(bought.id, 4, &user(owner)).await.unwrap().rating, Some(4));
        assert_eq!(service.rate(bought.id, 2, &user(owner)).await.unwrap().rating, Some(2));
    }

    #[tokio::test]
    async fn test_other_callers_are_forbidden_and_rating_unchanged() {
        let store = InMemoryTicketStore::new();
        let owner = Uuid::new_v4();
        let bought = purchase(&store, -Duration::hours(2), Some(owner)).await;
        let service = RatingService::new(store.clone());

        for caller in [user(Uuid::new_v4()), Caller::Anonymous] {
            let err = service.rate(bought.id, 5, &caller).await.unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }
        assert_eq!(store.find_purchase(bought.id).await.unwrap().unwrap().rating, None);
    }

    #[tokio::test]
    async fn test_guest_purchases_cannot_be_rated() {
        let store = InMemoryTicketStore::new();
        let bought = purchase(&store, -Duration::hours(2), None).await;
        let service = RatingService::new(store);

        let err = service.rate(bought.id, 3, &user(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_rating_range_and_existence() {
        let store = InMemoryTicketStore::new();
        let owner = Uuid::new_v4();
        let bought = purchase(&store, -Duration::hours(2), Some(owner)).await;
        let service = RatingService::new(store);

        for bad in [0, 6, -3] {
            let err = service.rate(bought.id, bad, &user(owner)).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
        }
        let err = service.rate(Uuid::new_v4(), 3, &user(owner)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rating_waits_for_event_start() {
        let store = InMemoryTicketStore::new();
        let owner = Uuid::new_v4();
        let bought = purchase(&store, Duration::days(3), Some(owner)).await;
        let service = RatingService::new(store);

        let err = service.rate(bought.id, 5, &user(owner)).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
