//! Catalog search: text, category, date range, availability and sort.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::debug;

use crate::models::EventSummary;
use crate::services::inventory;
use crate::store::{EventFilter, TicketStore};
use crate::utils::error::AppError;

/// Result cap for the type-ahead search.
pub const LIVE_RESULT_LIMIT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Any,
    Available,
    SoldOut,
}

impl Availability {
    /// Unrecognised values mean no filtering.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("available") => Availability::Available,
            Some("soldout") => Availability::SoldOut,
            _ => Availability::Any,
        }
    }

    fn admits(self, summary: &EventSummary) -> bool {
        match self {
            Availability::Any => true,
            Availability::Available => !inventory::is_sold_out(summary),
            Availability::SoldOut => inventory::is_sold_out(summary),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Title,
    TitleDesc,
    #[default]
    Date,
    DateDesc,
    Price,
    PriceDesc,
}

impl SortKey {
    /// Unrecognised keys sort by start time, ascending.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("title") => SortKey::Title,
            Some("title_desc") => SortKey::TitleDesc,
            Some("date_desc") => SortKey::DateDesc,
            Some("price") => SortKey::Price,
            Some("price_desc") => SortKey::PriceDesc,
            _ => SortKey::Date,
        }
    }

    fn compare(self, a: &EventSummary, b: &EventSummary) -> Ordering {
        let (a, b) = (&a.event, &b.event);
        match self {
            SortKey::Title => compare_titles(&a.title, &b.title),
            SortKey::TitleDesc => compare_titles(&b.title, &a.title),
            SortKey::Date => a.start_at.cmp(&b.start_at),
            SortKey::DateDesc => b.start_at.cmp(&a.start_at),
            SortKey::Price => a.price.cmp(&b.price),
            SortKey::PriceDesc => b.price.cmp(&a.price),
        }
    }
}

/// Case-insensitive, with the raw title as tiebreak so the order stays total.
fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Raw query-string parameters of the search page.
///
/// Every field stays textual: the search form submits empty values
/// (`category_id=&start_date=`) for filters the user left unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub category_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub availability: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub filter: EventFilter,
    pub availability: Availability,
    pub sort: SortKey,
}

impl TryFrom<SearchParams> for SearchCriteria {
    type Error = AppError;

    fn try_from(params: SearchParams) -> Result<Self, Self::Error> {
        let category_id = parse_field::<i32>("category_id", params.category_id.as_deref())?;
        let start_date = parse_date("start_date", params.start_date.as_deref())?;
        let end_date = parse_date("end_date", params.end_date.as_deref())?;

        Ok(SearchCriteria {
            filter: EventFilter {
                text: normalize_text(params.q.as_deref()),
                category_id: category_id.filter(|id| *id > 0),
                starts_from: start_date.map(start_of_day),
                starts_until: end_date.map(end_of_day),
            },
            availability: Availability::parse(params.availability.as_deref()),
            sort: SortKey::parse(params.sort_by.as_deref()),
        })
    }
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_field<T: FromStr>(name: &str, value: Option<&str>) -> Result<Option<T>, AppError> {
    blank_to_none(value)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                AppError::ValidationError(format!("Invalid value '{}' for {}", raw, name))
            })
        })
        .transpose()
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    blank_to_none(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::ValidationError(format!("{} must be a date in YYYY-MM-DD format", name))
            })
        })
        .transpose()
}

fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Last instant of the day at the store's microsecond precision.
fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = chrono::NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(chrono::NaiveTime::MIN);
    date.and_time(last).and_utc()
}

/// Applies the availability filter and the sort to rows already narrowed by storage.
pub fn refine(
    mut summaries: Vec<EventSummary>,
    availability: Availability,
    sort: SortKey,
) -> Vec<EventSummary> {
    summaries.retain(|summary| availability.admits(summary));
    summaries.sort_by(|a, b| sort.compare(a, b));
    summaries
}

pub struct SearchService<S> {
    store: S,
}

impl<S: TicketStore> SearchService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn search(&self, criteria: SearchCriteria) -> Result<Vec<EventSummary>, AppError> {
        let candidates = self.store.find_event_summaries(&criteria.filter).await?;
        let results = refine(candidates, criteria.availability, criteria.sort);
        debug!(results = results.len(), "Search completed");
        Ok(results)
    }

    /// Text-only search for interactive type-ahead.
    pub async fn live_search(&self, text: Option<&str>) -> Result<Vec<EventSummary>, AppError> {
        let filter = EventFilter {
            text: normalize_text(text),
            ..EventFilter::default()
        };
        let mut results = refine(
            self.store.find_event_summaries(&filter).await?,
            Availability::Any,
            SortKey::Date,
        );
        results.truncate(LIVE_RESULT_LIMIT);
        Ok(results)
    }
}
