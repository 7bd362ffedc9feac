use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::event::Event;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    /// Quantity times the event price at commit time. Never recomputed.
    pub total_cost: Decimal,
    pub purchased_at: DateTime<Utc>,
    pub guest_name: String,
    pub guest_email: String,
    pub attendee_id: Option<Uuid>,
    pub rating: Option<i16>,
}

/// A validated purchase request, ready to be checked against inventory.
///
/// The store fills in `id`, `total_cost` and `purchased_at` inside the
/// same atomic unit that checks the remaining tickets.
#[derive(Debug, Clone)]
pub struct PurchaseDraft {
    pub event_id: Uuid,
    pub quantity: i32,
    pub guest_name: String,
    pub guest_email: String,
    pub attendee_id: Option<Uuid>,
}

impl PurchaseDraft {
    pub fn into_purchase(self, price: Decimal, purchased_at: DateTime<Utc>) -> Purchase {
        Purchase {
            id: Uuid::new_v4(),
            event_id: self.event_id,
            quantity: self.quantity,
            total_cost: Decimal::from(self.quantity) * price,
            purchased_at,
            guest_name: self.guest_name,
            guest_email: self.guest_email,
            attendee_id: self.attendee_id,
            rating: None,
        }
    }
}

/// Outcome of the atomic check-and-insert.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed(Purchase),
    Insufficient { remaining: i64 },
    EventMissing,
}

/// Purchase joined with its event, for confirmation pages.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDetails {
    pub purchase: Purchase,
    pub event: Event,
    pub can_rate: bool,
}
