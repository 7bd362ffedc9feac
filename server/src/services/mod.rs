pub mod catalog;
pub mod inventory;
pub mod notify;
pub mod purchases;
pub mod ratings;
pub mod search;

pub use catalog::CatalogService;
pub use notify::{AnyNotifier, LogNotifier, Notifier, SmtpNotifier};
pub use purchases::{PurchaseRequest, PurchaseService};
pub use ratings::RatingService;
pub use search::{SearchCriteria, SearchParams, SearchService};
