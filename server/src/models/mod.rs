pub mod category;
pub mod event;
pub mod purchase;
pub mod user;

pub use category::Category;
pub use event::{Event, EventInput, EventSummary};
pub use purchase::{CommitOutcome, Purchase, PurchaseDetails, PurchaseDraft};
pub use user::{Caller, Identity, Role};
