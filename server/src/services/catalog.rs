use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::models::{Caller, Category, Event, EventInput, EventSummary, Role};
use crate::services::search::{refine, Availability, SortKey};
use crate::store::{DeleteOutcome, EventFilter, TicketStore};
use crate::utils::error::AppError;

/// Prices are stored as `NUMERIC(10, 2)`.
const PRICE_SCALE: u32 = 2;

pub fn max_price() -> Decimal {
    Decimal::new(9_999_999_999, PRICE_SCALE)
}

/// Event and category management with admin / owning-organizer checks.
pub struct CatalogService<S> {
    store: S,
}

impl<S: TicketStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        self.store.list_categories().await
    }

    /// All events, soonest first.
    pub async fn list_events(&self) -> Result<Vec<EventSummary>, AppError> {
        let summaries = self.store.find_event_summaries(&EventFilter::default()).await?;
        Ok(refine(summaries, Availability::Any, SortKey::Date))
    }

    pub async fn get_event(&self, id: Uuid) -> Result<EventSummary, AppError> {
        self.store
            .event_summary(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn create_event(&self, input: EventInput, caller: &Caller) -> Result<Event, AppError> {
        let Some(caller_id) = caller.subject_id() else {
            return Err(AppError::Forbidden("Sign in to create events".to_string()));
        };
        let owner = if caller.has_role(Role::Admin) {
            input.organizer_id.or(Some(caller_id))
        } else if caller.has_role(Role::Organizer) {
            Some(caller_id)
        } else {
            return Err(AppError::Forbidden(
                "Only organizers and admins can create events".to_string(),
            ));
        };

        self.validate(&input).await?;

        let event = Event::from_input(input, owner, Utc::now().trunc_subsecs(6));
        self.store.insert_event(&event).await?;

        info!(event_id = %event.id, organizer_id = ?event.organizer_id, "Event created");
        Ok(event)
    }

    pub async fn update_event(
        &self,
        id: Uuid,
        input: EventInput,
        caller: &Caller,
    ) -> Result<Event, AppError> {
        let mut event = self.store.find_event(id).await?.ok_or_else(|| not_found(id))?;
        ensure_can_manage(&event, caller)?;

        self.validate(&input).await?;

        event.apply(input, Utc::now().trunc_subsecs(6));
        if !self.store.update_event(&event).await? {
            return Err(not_found(id));
        }

        info!(event_id = %id, "Event updated");
        Ok(event)
    }

    /// Refuses to delete events that already have purchases.
    pub async fn delete_event(&self, id: Uuid, caller: &Caller) -> Result<(), AppError> {
        let event = self.store.find_event(id).await?.ok_or_else(|| not_found(id))?;
        ensure_can_manage(&event, caller)?;

        match self.store.delete_event(id).await? {
            DeleteOutcome::Deleted => {
                info!(event_id = %id, "Event deleted");
                Ok(())
            }
            DeleteOutcome::NotFound => Err(not_found(id)),
            DeleteOutcome::HasPurchases(count) => Err(AppError::Conflict(format!(
                "Event has {} purchase(s) and cannot be deleted",
                count
            ))),
        }
    }

    async fn validate(&self, input: &EventInput) -> Result<(), AppError> {
        if input.title.trim().is_empty() {
            return Err(AppError::ValidationError("Title is required".to_string()));
        }
        if input.address.trim().is_empty() {
            return Err(AppError::ValidationError("Address is required".to_string()));
        }
        if input.price < Decimal::ZERO {
            return Err(AppError::ValidationError("Price cannot be negative".to_string()));
        }
        if input.price > max_price() {
            return Err(AppError::ValidationError(format!(
                "Price cannot exceed {}",
                max_price()
            )));
        }
        if input.price.normalize().scale() > PRICE_SCALE {
            return Err(AppError::ValidationError(
                "Price cannot have more than 2 decimal places".to_string(),
            ));
        }
        if input.available_tickets < 0 {
            return Err(AppError::ValidationError(
                "Available tickets cannot be negative".to_string(),
            ));
        }
        if !self.store.category_exists(input.category_id).await? {
            return Err(AppError::ValidationError(format!(
                "Category {} does not exist",
                input.category_id
            )));
        }
        Ok(())
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Event '{}' was not found", id))
}

fn ensure_can_manage(event: &Event, caller: &Caller) -> Result<(), AppError> {
    if caller.can_manage_event(event.organizer_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not allowed to manage this event".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, PurchaseDraft};
    use crate::store::InMemoryTicketStore;
    use chrono::{DateTime, Duration};

    fn caller(roles: Vec<Role>) -> Caller {
        Caller::User(Identity {
            subject_id: Uuid::new_v4(),
            roles,
            display_name: None,
            email: None,
        })
    }

    fn input(start_at: DateTime<Utc>) -> EventInput {
        EventInput {
            title: "  Autumn Arts Festival ".to_string(),
            description: Some("Live painting".to_string()),
            start_at,
            price: Decimal::new(1000, 2),
            available_tickets: 400,
            address: "Waterfront Campus".to_string(),
            image_path: None,
            category_id: 6,
            organizer_id: None,
        }
    }

    fn service() -> (CatalogService<InMemoryTicketStore>, InMemoryTicketStore) {
        let store = InMemoryTicketStore::with_categories([Category {
            id: 6,
            name: "Arts & Culture".to_string(),
            description: None,
        }]);
        (CatalogService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_organizer_owns_created_event() {
        let (service, _) = service();
        let organizer = caller(vec![Role::Organizer]);

        let event = service
            .create_event(input(Utc::now() + Duration::days(10)), &organizer)
            .await
            .unwrap();

        assert_eq!(event.title, "Autumn Arts Festival");
        assert_eq!(event.organizer_id, organizer.subject_id());
    }

    #[tokio::test]
    async fn test_attendees_and_anonymous_cannot_create() {
        let (service, _) = service();
        for who in [caller(vec![Role::Attendee]), Caller::Anonymous] {
            let err = service.create_event(input(Utc::now()), &who).await.unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let (service, _) = service();
        let admin = caller(vec![Role::Admin]);

        let mut bad_price = input(Utc::now());
        bad_price.price = Decimal::new(-1, 0);
        assert!(matches!(
            service.create_event(bad_price, &admin).await,
            Err(AppError::ValidationError(_))
        ));

        let mut too_expensive = input(Utc::now());
        too_expensive.price = max_price() + Decimal::new(1, 2);
        assert!(matches!(
            service.create_event(too_expensive, &admin).await,
            Err(AppError::ValidationError(_))
        ));

        let mut fractional_cents = input(Utc::now());
        fractional_cents.price = Decimal::new(10005, 3);
        assert!(matches!(
            service.create_event(fractional_cents, &admin).await,
            Err(AppError::ValidationError(_))
        ));

        let mut trailing_zero = input(Utc::now());
        trailing_zero.price = Decimal::new(10500, 3);
        assert!(service.create_event(trailing_zero, &admin).await.is_ok());

        let mut bad_category = input(Utc::now());
        bad_category.category_id = 99;
        assert!(matches!(
            service.create_event(bad_category, &admin).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_can_edit() {
        let (service, _) = service();
        let owner = caller(vec![Role::Organizer]);
        let event = service.create_event(input(Utc::now()), &owner).await.unwrap();

        let stranger = caller(vec![Role::Organizer]);
        let err = service
            .update_event(event.id, input(Utc::now()), &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let mut edit = input(Utc::now());
        edit.available_tickets = 10;
        let updated = service
            .update_event(event.id, edit, &caller(vec![Role::Admin]))
            .await
            .unwrap();
        assert_eq!(updated.available_tickets, 10);
        assert_eq!(updated.organizer_id, owner.subject_id());
    }

    #[tokio::test]
    async fn test_delete_is_blocked_by_purchases() {
        let (service, store) = service();
        let owner = caller(vec![Role::Organizer]);
        let event = service.create_event(input(Utc::now()), &owner).await.unwrap();

        let draft = PurchaseDraft {
            event_id: event.id,
            quantity: 1,
            guest_name: "G".to_string(),
            guest_email: "g@x.com".to_string(),
            attendee_id: None,
        };
        store.commit_purchase(draft, Utc::now()).await.unwrap();

        let err = service.delete_event(event.id, &owner).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(service.get_event(event.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_unsold_event() {
        let (service, _) = service();
        let owner = caller(vec![Role::Organizer]);
        let event = service.create_event(input(Utc::now()), &owner).await.unwrap();

        service.delete_event(event.id, &owner).await.unwrap();
        assert!(matches!(service.get_event(event.id).await, Err(AppError::NotFound(_))));
    }
}
