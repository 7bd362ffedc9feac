//! Remaining-ticket accounting.
//!
//! Remaining tickets are always derived from the committed purchases at read
//! time. Nothing here caches a count between requests.

use chrono::{DateTime, Utc};

use crate::models::{Event, EventSummary};

/// Allocation minus committed quantity.
///
/// Negative when an organizer lowers the allocation below what has already
/// been sold; callers treat that as sold out.
pub fn remaining(available_tickets: i32, sold: i64) -> i64 {
    i64::from(available_tickets) - sold
}

pub fn summarize(event: Event, sold: i64) -> EventSummary {
    let remaining_tickets = remaining(event.available_tickets, sold);
    EventSummary {
        event,
        tickets_sold: sold,
        remaining_tickets,
    }
}

pub fn is_sold_out(summary: &EventSummary) -> bool {
    summary.remaining_tickets <= 0
}

/// Ratings open once the event has started.
pub fn can_rate(event: &Event, now: DateTime<Utc>) -> bool {
    event.start_at <= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn event(available_tickets: i32, start_at: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Career Connect".to_string(),
            description: None,
            start_at,
            price: Decimal::ZERO,
            available_tickets,
            address: "Learning Commons".to_string(),
            image_path: None,
            category_id: 4,
            organizer_id: None,
            created_at: start_at,
            updated_at: start_at,
        }
    }

    #[test]
    fn test_remaining_subtracts_sold_quantity() {
        assert_eq!(remaining(500, 0), 500);
        assert_eq!(remaining(500, 499), 1);
        assert_eq!(remaining(500, 500), 0);
    }

    #[test]
    fn test_lowered_allocation_goes_negative_and_reads_sold_out() {
        let summary = summarize(event(2, Utc::now()), 5);
        assert_eq!(summary.remaining_tickets, -3);
        assert!(is_sold_out(&summary));
    }

    #[test]
    fn test_can_rate_only_after_start() {
        let now = Utc::now();
        assert!(can_rate(&event(1, now - Duration::hours(1)), now));
        assert!(can_rate(&event(1, now), now));
        assert!(!can_rate(&event(1, now + Duration::minutes(1)), now));
    }
}
