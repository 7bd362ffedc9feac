use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{DeleteOutcome, EventFilter, TicketStore};
use crate::models::{Category, CommitOutcome, Event, EventSummary, Purchase, PurchaseDraft};
use crate::services::inventory;
use crate::utils::error::AppError;

const EVENT_COLUMNS: &str = "e.id, e.title, e.description, e.start_at, e.price, \
     e.available_tickets, e.address, e.image_path, e.category_id, e.organizer_id, \
     e.created_at, e.updated_at";

const PURCHASE_COLUMNS: &str = "id, event_id, quantity, total_cost, purchased_at, \
     guest_name, guest_email, attendee_id, rating";

#[derive(FromRow)]
struct EventSummaryRow {
    #[sqlx(flatten)]
    event: Event,
    tickets_sold: i64,
}

impl From<EventSummaryRow> for EventSummary {
    fn from(row: EventSummaryRow) -> Self {
        inventory::summarize(row.event, row.tickets_sold)
    }
}

/// PostgreSQL-backed store.
///
/// Purchases lock the event row (`SELECT ... FOR UPDATE`) for the duration
/// of the sum-and-insert transaction, so concurrent buyers of one event
/// queue on that row while other events are unaffected.
#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("migration failed: {}", e)))
    }

    fn summary_query(filter: &EventFilter) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new(format!(
            "SELECT {}, COALESCE(SUM(p.quantity), 0)::BIGINT AS tickets_sold \
             FROM events e LEFT JOIN purchases p ON p.event_id = e.id WHERE TRUE",
            EVENT_COLUMNS
        ));

        if let Some(text) = &filter.text {
            let pattern = format!("%{}%", escape_like(text));
            query
                .push(" AND (LOWER(e.title) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(e.description, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category_id) = filter.category_id {
            query.push(" AND e.category_id = ").push_bind(category_id);
        }
        if let Some(from) = filter.starts_from {
            query.push(" AND e.start_at >= ").push_bind(from);
        }
        if let Some(until) = filter.starts_until {
            query.push(" AND e.start_at <= ").push_bind(until);
        }

        query.push(" GROUP BY e.id");
        query
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl TicketStore for PgTicketStore {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn category_exists(&self, id: i32) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events e WHERE e.id = $1",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn event_summary(&self, id: Uuid) -> Result<Option<EventSummary>, AppError> {
        let row = sqlx::query_as::<_, EventSummaryRow>(&format!(
            "SELECT {}, COALESCE(SUM(p.quantity), 0)::BIGINT AS tickets_sold \
             FROM events e LEFT JOIN purchases p ON p.event_id = e.id \
             WHERE e.id = $1 GROUP BY e.id",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EventSummary::from))
    }

    async fn find_event_summaries(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<EventSummary>, AppError> {
        let rows = Self::summary_query(filter)
            .build_query_as::<EventSummaryRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(EventSummary::from).collect())
    }

    async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO events (id, title, description, start_at, price, available_tickets, \
             address, image_path, category_id, organizer_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_at)
        .bind(event.price)
        .bind(event.available_tickets)
        .bind(&event.address)
        .bind(&event.image_path)
        .bind(event.category_id)
        .bind(event.organizer_id)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE events SET title = $2, description = $3, start_at = $4, price = $5, \
             available_tickets = $6, address = $7, image_path = $8, category_id = $9, \
             updated_at = $10 WHERE id = $1",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_at)
        .bind(event.price)
        .bind(event.available_tickets)
        .bind(&event.address)
        .bind(&event.image_path)
        .bind(event.category_id)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_event(&self, id: Uuid) -> Result<DeleteOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Ok(DeleteOutcome::NotFound);
        }

        let referencing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases WHERE event_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if referencing > 0 {
            tx.rollback().await?;
            return Ok(DeleteOutcome::HasPurchases(referencing));
        }

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn commit_purchase(
        &self,
        draft: PurchaseDraft,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, AppError> {
        // Dropping `tx` on any early return or cancelled future rolls back.
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Decimal, i32)> = sqlx::query_as(
            "SELECT price, available_tickets FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(draft.event_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((price, available_tickets)) = locked else {
            tx.rollback().await?;
            return Ok(CommitOutcome::EventMissing);
        };

        let sold: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM purchases WHERE event_id = $1",
        )
        .bind(draft.event_id)
        .fetch_one(&mut *tx)
        .await?;

        let remaining = inventory::remaining(available_tickets, sold);
        if i64::from(draft.quantity) > remaining {
            tx.rollback().await?;
            return Ok(CommitOutcome::Insufficient { remaining });
        }

        let purchase = draft.into_purchase(price, now);
        sqlx::query(
            "INSERT INTO purchases (id, event_id, quantity, total_cost, purchased_at, \
             guest_name, guest_email, attendee_id, rating) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)",
        )
        .bind(purchase.id)
        .bind(purchase.event_id)
        .bind(purchase.quantity)
        .bind(purchase.total_cost)
        .bind(purchase.purchased_at)
        .bind(&purchase.guest_name)
        .bind(&purchase.guest_email)
        .bind(purchase.attendee_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CommitOutcome::Committed(purchase))
    }

    async fn find_purchase(&self, id: Uuid) -> Result<Option<Purchase>, AppError> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {} FROM purchases WHERE id = $1",
            PURCHASE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    async fn set_rating(&self, id: Uuid, rating: i16) -> Result<Option<Purchase>, AppError> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "UPDATE purchases SET rating = $2 WHERE id = $1 RETURNING {}",
            PURCHASE_COLUMNS
        ))
        .bind(id)
        .bind(rating)
        .fetch_optional(&self.pool)
        .await?;
        Ok(purchase)
    }

    async fn purchases_for_attendee(&self, attendee_id: Uuid) -> Result<Vec<Purchase>, AppError> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {} FROM purchases WHERE attendee_id = $1 ORDER BY purchased_at DESC",
            PURCHASE_COLUMNS
        ))
        .bind(attendee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(purchases)
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>, AppError> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {} FROM purchases ORDER BY purchased_at DESC",
            PURCHASE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(purchases)
    }
}
