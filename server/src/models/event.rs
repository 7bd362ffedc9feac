use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub price: Decimal,
    /// Total allocation. Sold tickets are never subtracted from this column.
    pub available_tickets: i32,
    pub address: String,
    pub image_path: Option<String>,
    pub category_id: i32,
    pub organizer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an organizer or admin may set when creating or editing an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub price: Decimal,
    pub available_tickets: i32,
    pub address: String,
    pub image_path: Option<String>,
    pub category_id: i32,
    /// Only honoured for admin callers on create.
    #[serde(default)]
    pub organizer_id: Option<Uuid>,
}

impl Event {
    pub fn from_input(input: EventInput, organizer_id: Option<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: input.description,
            start_at: input.start_at,
            price: input.price,
            available_tickets: input.available_tickets,
            address: input.address.trim().to_string(),
            image_path: input.image_path,
            category_id: input.category_id,
            organizer_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an edit while keeping identity, owner and creation time.
    pub fn apply(&mut self, input: EventInput, now: DateTime<Utc>) {
        self.title = input.title.trim().to_string();
        self.description = input.description;
        self.start_at = input.start_at;
        self.price = input.price;
        self.available_tickets = input.available_tickets;
        self.address = input.address.trim().to_string();
        self.image_path = input.image_path;
        self.category_id = input.category_id;
        self.updated_at = now;
    }
}

/// Read model handed to listings, search results and detail views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: Event,
    pub tickets_sold: i64,
    pub remaining_tickets: i64,
}
